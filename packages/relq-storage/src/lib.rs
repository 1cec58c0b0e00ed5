pub mod catalog;
pub mod configurations;
pub mod db;
pub mod executions;
pub mod judgements;
pub mod models;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
