use super::compiler::{CompileError, compile};
use super::parser::{ParseErrors, parse_schema};
use super::types::{
    EntityDefinition, EntityReference, RuleDefinition, SchemaDefinition, SchemaReference,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{0}")]
    Parse(#[from] ParseErrors),
    #[error("{0}")]
    Compile(#[from] CompileError),
}

impl SchemaDefinition {
    /// Aggregates compiled definitions without further validation.
    ///
    /// Entity reference indexes are rebuilt from the definition maps, so
    /// hand-assembled definitions get the same lookup behavior as compiled ones.
    pub fn from_definitions(entities: Vec<EntityDefinition>, rules: Vec<RuleDefinition>) -> Self {
        let mut schema = SchemaDefinition::default();

        for mut entity in entities {
            index_entity_references(&mut entity);
            schema
                .references
                .insert(entity.name.clone(), SchemaReference::Entity);
            schema
                .entity_definitions
                .insert(entity.name.clone(), entity);
        }

        for rule in rules {
            schema
                .references
                .insert(rule.name.clone(), SchemaReference::Rule);
            schema.rule_definitions.insert(rule.name.clone(), rule);
        }

        schema
    }
}

fn index_entity_references(entity: &mut EntityDefinition) {
    let relations = entity.relations.keys().map(|k| (k, EntityReference::Relation));
    let permissions = entity
        .permissions
        .keys()
        .map(|k| (k, EntityReference::Permission));
    let attributes = entity
        .attributes
        .keys()
        .map(|k| (k, EntityReference::Attribute));

    let missing: Vec<(String, EntityReference)> = relations
        .chain(permissions)
        .chain(attributes)
        .filter(|(name, _)| !entity.references.contains_key(name.as_str()))
        .map(|(name, kind)| (name.clone(), kind))
        .collect();

    entity.references.extend(missing);
}

/// Parses, compiles and assembles schema text in one step.
pub fn compile_schema(input: &str, validate: bool) -> Result<SchemaDefinition, SchemaError> {
    let ast = parse_schema(input)?;
    let compiled = compile(&ast, validate)?;
    let schema = SchemaDefinition::from_definitions(compiled.entities, compiled.rules);

    tracing::debug!(
        entities = schema.entity_definitions.len(),
        rules = schema.rule_definitions.len(),
        "schema compiled"
    );

    Ok(schema)
}
