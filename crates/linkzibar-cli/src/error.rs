use linkzibar_core::graph::GraphError;
use linkzibar_core::schema::{SchemaError, ValidationError};
use linkzibar_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("resolver error: {0}")]
    Graph(#[from] GraphError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("schema validation errors: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("failed to read schema file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkzibar_core::schema::compile_schema;

    #[test]
    fn service_error_from_schema_error() {
        let schema_err = compile_schema("entity user {} entity user {}", true).unwrap_err();
        let err: ServiceError = schema_err.into();

        assert!(
            err.to_string().contains("duplication found for user"),
            "expected duplicate message, got: {err}"
        );
    }

    #[test]
    fn service_error_from_graph_error() {
        let err: ServiceError = GraphError::EntityDefinitionNotFound.into();

        assert_eq!(
            err.to_string(),
            "resolver error: entity definition not found"
        );
    }

    #[test]
    fn service_error_from_storage_error() {
        let err: ServiceError = StorageError::Internal("boom".to_string()).into();

        assert!(
            err.to_string().contains("boom"),
            "expected 'boom' in error message, got: {err}"
        );
    }

    #[test]
    fn validation_formats_multiple_errors() {
        let errors = vec![
            ValidationError::TooManyEntities {
                count: 60,
                limit: 50,
            },
            ValidationError::TooManyRelations {
                entity: "doc".to_string(),
                count: 40,
                limit: 30,
            },
        ];
        let msg = ServiceError::Validation(errors).to_string();

        assert!(msg.contains("60"), "should contain count 60: {msg}");
        assert!(msg.contains("doc"), "should contain entity name: {msg}");
    }
}
