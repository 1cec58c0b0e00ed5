use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use relq_providers::FieldFilter;
use relq_service::{ExecutionEvent, RelqService};
use relq_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = relq_cli::VERSION,
	rename_all = "kebab",
	styles = relq_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
#[command(rename_all = "kebab")]
pub enum Command {
	/// Evaluate a search configuration against its judgements and store the execution.
	Run {
		#[arg(long, value_name = "UUID")]
		search_configuration: Uuid,
		/// Log each phrase as it completes.
		#[arg(long)]
		progress: bool,
	},
	/// Show the latest stored execution of a search configuration.
	Current {
		#[arg(long, value_name = "UUID")]
		search_configuration: Uuid,
	},
	/// Compare two stored executions (deltas are B minus A).
	Compare {
		#[arg(long, value_name = "UUID")]
		execution_a: Uuid,
		#[arg(long, value_name = "UUID")]
		execution_b: Uuid,
	},
	/// Check that a search endpoint is reachable.
	Probe {
		#[arg(long, value_name = "UUID")]
		endpoint: Uuid,
	},
	/// List the fields of a search endpoint.
	Fields {
		#[arg(long, value_name = "UUID")]
		endpoint: Uuid,
		#[arg(long = "type", value_name = "TYPE")]
		types: Vec<String>,
		#[arg(long)]
		aggregatable: bool,
	},
	/// List distinct values of a field, optionally by prefix.
	Values {
		#[arg(long, value_name = "UUID")]
		endpoint: Uuid,
		#[arg(long, value_name = "FIELD")]
		field: String,
		#[arg(long, value_name = "PREFIX")]
		prefix: Option<String>,
	},
	/// Fetch stored documents by id.
	Docs {
		#[arg(long, value_name = "UUID")]
		endpoint: Uuid,
		#[arg(long = "id", value_name = "ID", num_args = 1.., required = true)]
		ids: Vec<String>,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = relq_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let service = RelqService::new(config, db)?;

	match args.command {
		Command::Run { search_configuration, progress } => {
			let watcher = progress.then(|| tokio::spawn(log_progress(service.subscribe())));
			let execution = service.run_execution(search_configuration).await;

			if let Some(watcher) = watcher {
				watcher.abort();
			}

			print_json(&execution?)
		},
		Command::Current { search_configuration } => {
			let Some(execution) = service.current_execution(search_configuration).await? else {
				return Err(eyre::eyre!(
					"Search configuration {search_configuration} has no executions."
				));
			};

			print_json(&execution)
		},
		Command::Compare { execution_a, execution_b } =>
			print_json(&service.compare(execution_a, execution_b).await?),
		Command::Probe { endpoint } => {
			let status = service.test_endpoint(endpoint).await?;

			print_json(&status)?;

			if status.success {
				Ok(())
			} else {
				Err(eyre::eyre!("Search endpoint {endpoint} is not reachable."))
			}
		},
		Command::Fields { endpoint, types, aggregatable } => {
			let filter = FieldFilter { types, aggregatable_only: aggregatable };

			print_json(&service.endpoint_fields(endpoint, Some(&filter)).await?)
		},
		Command::Values { endpoint, field, prefix } => print_json(
			&service.endpoint_field_values(endpoint, &field, prefix.as_deref()).await?,
		),
		Command::Docs { endpoint, ids } =>
			print_json(&service.documents_by_id(endpoint, &ids).await?),
	}
}

async fn log_progress(mut events: broadcast::Receiver<ExecutionEvent>) {
	loop {
		match events.recv().await {
			Ok(ExecutionEvent::PhraseCompleted { phrase, combined_score, error, .. }) =>
				tracing::info!(phrase, ?combined_score, ?error, "Phrase completed."),
			Ok(_) => {},
			Err(RecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Progress output fell behind.");
			},
			Err(RecvError::Closed) => break,
		}
	}
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	let json = serde_json::to_string_pretty(value)?;

	println!("{json}");

	Ok(())
}
