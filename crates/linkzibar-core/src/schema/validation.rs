use super::types::SchemaDefinition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLimits {
    pub max_entities: usize,
    pub max_relations_per_entity: usize,
    pub max_permissions_per_entity: usize,
    pub max_attributes_per_entity: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_entities: 50,
            max_relations_per_entity: 30,
            max_permissions_per_entity: 30,
            max_attributes_per_entity: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("too many entities: {count} exceeds limit of {limit}")]
    TooManyEntities { count: usize, limit: usize },
    #[error("too many relations in entity '{entity}': {count} exceeds limit of {limit}")]
    TooManyRelations {
        entity: String,
        count: usize,
        limit: usize,
    },
    #[error("too many permissions in entity '{entity}': {count} exceeds limit of {limit}")]
    TooManyPermissions {
        entity: String,
        count: usize,
        limit: usize,
    },
    #[error("too many attributes in entity '{entity}': {count} exceeds limit of {limit}")]
    TooManyAttributes {
        entity: String,
        count: usize,
        limit: usize,
    },
}

pub fn validate_schema_limits(
    schema: &SchemaDefinition,
    limits: &SchemaLimits,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let entity_count = schema.entity_definitions.len();
    if entity_count > limits.max_entities {
        errors.push(ValidationError::TooManyEntities {
            count: entity_count,
            limit: limits.max_entities,
        });
    }

    for entity in schema.entity_definitions.values() {
        if entity.relations.len() > limits.max_relations_per_entity {
            errors.push(ValidationError::TooManyRelations {
                entity: entity.name.clone(),
                count: entity.relations.len(),
                limit: limits.max_relations_per_entity,
            });
        }
        if entity.permissions.len() > limits.max_permissions_per_entity {
            errors.push(ValidationError::TooManyPermissions {
                entity: entity.name.clone(),
                count: entity.permissions.len(),
                limit: limits.max_permissions_per_entity,
            });
        }
        if entity.attributes.len() > limits.max_attributes_per_entity {
            errors.push(ValidationError::TooManyAttributes {
                entity: entity.name.clone(),
                count: entity.attributes.len(),
                limit: limits.max_attributes_per_entity,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
