use std::sync::Arc;

use linkzibar_core::graph::{Entrance, LinkedEntrance, LinkedSchemaGraph};
use linkzibar_core::schema::types::SchemaDefinition;
use linkzibar_core::schema::{
    SchemaError, SchemaLimits, compile, compile_schema, parse_schema, validate_schema_limits,
};
use linkzibar_storage::{
    SchemaDefinitionRecord, SchemaReader, SchemaVersion, SchemaWriter, TenantId,
};

use crate::audit::{audit_schema_rejected, audit_schema_write};
use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct SchemaServiceConfig {
    pub validate_references: bool,
    pub limits: SchemaLimits,
}

impl Default for SchemaServiceConfig {
    fn default() -> Self {
        Self {
            validate_references: true,
            limits: SchemaLimits::default(),
        }
    }
}

/// A stored schema, compiled and ready for resolver queries.
#[derive(Debug)]
pub struct LoadedSchema {
    pub version: SchemaVersion,
    pub definition: SchemaDefinition,
}

pub struct SchemaService<S> {
    store: Arc<S>,
    config: SchemaServiceConfig,
}

impl<S> SchemaService<S>
where
    S: SchemaWriter + SchemaReader,
{
    pub fn new(store: Arc<S>, config: SchemaServiceConfig) -> Self {
        Self { store, config }
    }

    /// Compiles `text`, checks it against the configured limits and stores one
    /// record per top-level statement under a fresh version.
    pub async fn write_schema(
        &self,
        tenant_id: &TenantId,
        text: &str,
    ) -> Result<SchemaVersion, ServiceError> {
        let records = match self.prepare_records(text) {
            Ok(records) => records,
            Err(err) => {
                audit_schema_rejected(tenant_id, &err.to_string());
                return Err(err);
            }
        };

        let version = SchemaVersion::generate();
        let count = records.len();
        self.store.write_schema(tenant_id, &version, records).await?;

        audit_schema_write(tenant_id, &version, count);
        Ok(version)
    }

    /// Loads `version`, or the tenant's latest version when `None`.
    pub async fn read_schema(
        &self,
        tenant_id: &TenantId,
        version: Option<&SchemaVersion>,
    ) -> Result<LoadedSchema, ServiceError> {
        let version = match version {
            Some(version) => version.clone(),
            None => self.store.head_version(tenant_id).await?,
        };

        let records = self.store.read_schema(tenant_id, &version).await?;
        let text = records
            .iter()
            .map(|record| record.serialized_definition.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let definition = compile_schema(&text, self.config.validate_references)?;

        Ok(LoadedSchema {
            version,
            definition,
        })
    }

    /// Resolves linked entrances against the tenant's latest schema.
    pub async fn linked_entrances(
        &self,
        tenant_id: &TenantId,
        target: &Entrance,
        source: &Entrance,
    ) -> Result<Vec<LinkedEntrance>, ServiceError> {
        let loaded = self.read_schema(tenant_id, None).await?;
        let graph = LinkedSchemaGraph::new(&loaded.definition);

        graph.linked_entrances(target, source).map_err(|err| {
            tracing::warn!(
                tenant_id = %tenant_id,
                target = %target,
                source = %source,
                error = %err,
                "linked entrance resolution failed"
            );
            ServiceError::from(err)
        })
    }

    fn prepare_records(&self, text: &str) -> Result<Vec<SchemaDefinitionRecord>, ServiceError> {
        let ast = parse_schema(text).map_err(SchemaError::from)?;
        let compiled =
            compile(&ast, self.config.validate_references).map_err(SchemaError::from)?;
        let definition = SchemaDefinition::from_definitions(compiled.entities, compiled.rules);

        validate_schema_limits(&definition, &self.config.limits)
            .map_err(ServiceError::Validation)?;

        Ok(ast
            .statements
            .iter()
            .map(|statement| SchemaDefinitionRecord::new(statement.name(), statement.to_string()))
            .collect())
    }
}
