//! Endpoint inspection: connectivity, schema fields, field values, and stored documents.

use std::sync::Arc;

use uuid::Uuid;

use relq_providers::{ConnectionStatus, Document, FieldFilter, QueryInterface};

use crate::{Error, RelqService, Result};

impl RelqService {
	pub async fn test_endpoint(&self, search_endpoint_id: Uuid) -> Result<ConnectionStatus> {
		let interface = self.endpoint_interface(search_endpoint_id).await?;
		let status = interface.test_connection().await;

		tracing::info!(
			%search_endpoint_id,
			success = status.success,
			message = status.message.as_str(),
			"Endpoint connectivity tested."
		);

		Ok(status)
	}

	pub async fn endpoint_fields(
		&self,
		search_endpoint_id: Uuid,
		filter: Option<&FieldFilter>,
	) -> Result<Vec<String>> {
		let interface = self.endpoint_interface(search_endpoint_id).await?;

		Ok(interface.fields(filter).await?)
	}

	pub async fn endpoint_field_values(
		&self,
		search_endpoint_id: Uuid,
		field: &str,
		prefix: Option<&str>,
	) -> Result<Vec<String>> {
		if field.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "field must be non-empty.".to_string() });
		}

		let interface = self.endpoint_interface(search_endpoint_id).await?;

		Ok(interface.field_values(field, prefix).await?)
	}

	pub async fn documents_by_id(
		&self,
		search_endpoint_id: Uuid,
		ids: &[String],
	) -> Result<Vec<Document>> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let interface = self.endpoint_interface(search_endpoint_id).await?;

		Ok(interface.documents_by_id(ids).await?)
	}

	async fn endpoint_interface(
		&self,
		search_endpoint_id: Uuid,
	) -> Result<Arc<dyn QueryInterface>> {
		let endpoint =
			self.store.search_endpoint_by_id(search_endpoint_id).await?.ok_or_else(|| {
				Error::NotFound {
					message: format!("Search endpoint {search_endpoint_id} does not exist."),
				}
			})?;
		let backend = endpoint.backend_type()?;

		Ok(self.backends.interface(&endpoint, backend)?)
	}
}
