use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::tenant::{SchemaVersion, TenantId};
use crate::traits::{SchemaDefinitionRecord, SchemaReader, SchemaWriter, StorageError};

type Versions = Vec<(SchemaVersion, Vec<SchemaDefinitionRecord>)>;

/// Schema store kept entirely in process memory.
///
/// Versions are held per tenant in write order; the head is the latest write.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaStore {
    tenants: Arc<Mutex<HashMap<TenantId, Versions>>>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<TenantId, Versions>>, StorageError> {
        self.tenants
            .lock()
            .map_err(|e| StorageError::Internal(format!("schema store lock poisoned: {e}")))
    }
}

impl SchemaWriter for InMemorySchemaStore {
    async fn write_schema(
        &self,
        tenant: &TenantId,
        version: &SchemaVersion,
        definitions: Vec<SchemaDefinitionRecord>,
    ) -> Result<(), StorageError> {
        let mut tenants = self.lock()?;
        let versions = tenants.entry(tenant.clone()).or_default();

        tracing::debug!(
            tenant = %tenant,
            version = %version,
            definitions = definitions.len(),
            "storing schema version"
        );

        match versions.iter_mut().find(|(v, _)| v == version) {
            Some((_, records)) => records.extend(definitions),
            None => versions.push((version.clone(), definitions)),
        }
        Ok(())
    }
}

impl SchemaReader for InMemorySchemaStore {
    async fn read_schema(
        &self,
        tenant: &TenantId,
        version: &SchemaVersion,
    ) -> Result<Vec<SchemaDefinitionRecord>, StorageError> {
        let tenants = self.lock()?;

        tenants
            .get(tenant)
            .and_then(|versions| versions.iter().find(|(v, _)| v == version))
            .map(|(_, records)| records.clone())
            .filter(|records| !records.is_empty())
            .ok_or_else(|| StorageError::SchemaNotFound {
                tenant: tenant.to_string(),
                version: version.to_string(),
            })
    }

    async fn head_version(&self, tenant: &TenantId) -> Result<SchemaVersion, StorageError> {
        let tenants = self.lock()?;

        tenants
            .get(tenant)
            .and_then(|versions| versions.last())
            .map(|(version, _)| version.clone())
            .ok_or_else(|| StorageError::NoSchemaVersion(tenant.to_string()))
    }
}
