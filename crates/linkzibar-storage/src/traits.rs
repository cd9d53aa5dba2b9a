use crate::tenant::{SchemaVersion, TenantId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("schema not found for tenant {tenant} at version {version}")]
    SchemaNotFound { tenant: String, version: String },
    #[error("no schema written for tenant {0}")]
    NoSchemaVersion(String),
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Canonical DSL text of one top-level entity or rule statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinitionRecord {
    pub name: String,
    pub serialized_definition: String,
}

impl SchemaDefinitionRecord {
    pub fn new(name: impl Into<String>, serialized_definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serialized_definition: serialized_definition.into(),
        }
    }
}

pub trait SchemaWriter: Send + Sync {
    fn write_schema(
        &self,
        tenant: &TenantId,
        version: &SchemaVersion,
        definitions: Vec<SchemaDefinitionRecord>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait SchemaReader: Send + Sync {
    /// Records of `version` in the order they were written.
    fn read_schema(
        &self,
        tenant: &TenantId,
        version: &SchemaVersion,
    ) -> impl Future<Output = Result<Vec<SchemaDefinitionRecord>, StorageError>> + Send;

    /// Most recently written version for `tenant`.
    fn head_version(
        &self,
        tenant: &TenantId,
    ) -> impl Future<Output = Result<SchemaVersion, StorageError>> + Send;
}
