use std::collections::HashMap;

use indexmap::IndexMap;

use super::ast::{
    Call, EntityStatement, Expression, Identifier, InfixOperator, Position, RelationTypeStatement,
    RuleStatement, Schema, Statement,
};
use super::types::{
    AttributeDefinition, Child, ComputedAttribute, EntityDefinition, Leaf, LeafKind,
    PermissionDefinition, RelationDefinition, RelationReference, Rewrite, RewriteOperation,
    RuleDefinition,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{position}: {kind}")]
pub struct CompileError {
    pub position: Position,
    pub kind: CompileErrorKind,
}

impl CompileError {
    fn new(position: Position, kind: CompileErrorKind) -> Self {
        Self { position, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CompileErrorKind {
    #[error("undefined relation reference")]
    UndefinedRelationReference,
    #[error("not supported relation walk")]
    UnsupportedRelationWalk,
    #[error("invalid rule reference")]
    InvalidRuleReference,
    #[error("missing argument")]
    MissingArgument,
    #[error("invalid argument")]
    InvalidArgument,
}

/// Compiler output, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledSchema {
    pub entities: Vec<EntityDefinition>,
    pub rules: Vec<RuleDefinition>,
}

/// Lowers a parsed schema into entity and rule definitions.
///
/// With `validate` set, every relation type, identifier and rule call must
/// resolve against the declarations in `schema`. Identifiers with more than
/// two segments are rejected either way.
pub fn compile(schema: &Schema, validate: bool) -> Result<CompiledSchema, CompileError> {
    let compiler = Compiler::new(schema, validate);
    let mut compiled = CompiledSchema::default();

    for statement in &schema.statements {
        match statement {
            Statement::Entity(entity) => compiled.entities.push(compiler.compile_entity(entity)?),
            Statement::Rule(rule) => compiled.rules.push(compile_rule(rule)),
        }
    }

    Ok(compiled)
}

struct Compiler<'a> {
    entities: HashMap<&'a str, &'a EntityStatement>,
    rules: HashMap<&'a str, &'a RuleStatement>,
    validate: bool,
}

impl<'a> Compiler<'a> {
    fn new(schema: &'a Schema, validate: bool) -> Self {
        Self {
            entities: schema.entities().map(|e| (e.name.as_str(), e)).collect(),
            rules: schema.rules().map(|r| (r.name.as_str(), r)).collect(),
            validate,
        }
    }

    fn compile_entity(&self, entity: &EntityStatement) -> Result<EntityDefinition, CompileError> {
        let mut definition = EntityDefinition::new(&entity.name);
        definition.options = parse_option_pairs(&entity.options);

        for relation in &entity.relations {
            let mut references = Vec::with_capacity(relation.relation_types.len());
            for relation_type in &relation.relation_types {
                if self.validate {
                    self.validate_relation_type(relation_type)?;
                }
                references.push(RelationReference::new(
                    &relation_type.entity_type,
                    relation_type.relation.clone().unwrap_or_default(),
                ));
            }
            let mut relation_definition = RelationDefinition::new(&relation.name, references);
            relation_definition.options = parse_option_pairs(&relation.options);
            definition.add_relation(relation_definition);
        }

        for attribute in &entity.attributes {
            definition.add_attribute(AttributeDefinition {
                name: attribute.name.clone(),
                attribute_type: attribute.attribute_type,
            });
        }

        for permission in &entity.permissions {
            let child = self.compile_expression(entity, &permission.expression)?;
            definition.add_permission(PermissionDefinition {
                name: permission.name.clone(),
                child,
            });
        }

        Ok(definition)
    }

    fn validate_relation_type(
        &self,
        relation_type: &RelationTypeStatement,
    ) -> Result<(), CompileError> {
        let target = self
            .entities
            .get(relation_type.entity_type.as_str())
            .ok_or_else(|| undefined_reference(relation_type.position))?;

        if let Some(relation) = &relation_type.relation
            && !target.has_relational_member(relation)
        {
            return Err(undefined_reference(relation_type.position));
        }
        Ok(())
    }

    fn compile_expression(
        &self,
        entity: &EntityStatement,
        expression: &Expression,
    ) -> Result<Child, CompileError> {
        match expression {
            Expression::Identifier(identifier) => self.compile_identifier(entity, identifier),
            Expression::Call(call) => self.compile_call(entity, call),
            Expression::Prefix { operand, .. } => {
                let mut child = self.compile_expression(entity, operand)?;
                child.set_exclusion(true);
                Ok(child)
            }
            Expression::Infix {
                operator,
                left,
                right,
            } => {
                let operation = match operator {
                    InfixOperator::And => RewriteOperation::Intersection,
                    InfixOperator::Or => RewriteOperation::Union,
                };
                Ok(Child::Rewrite(Rewrite {
                    operation,
                    children: vec![
                        self.compile_expression(entity, left)?,
                        self.compile_expression(entity, right)?,
                    ],
                    exclusion: false,
                }))
            }
        }
    }

    fn compile_identifier(
        &self,
        entity: &EntityStatement,
        identifier: &Identifier,
    ) -> Result<Child, CompileError> {
        match identifier.segments.as_slice() {
            [name] => {
                if entity.get_attribute(name).is_some() {
                    return Ok(leaf(LeafKind::ComputedAttribute(ComputedAttribute::new(
                        name,
                    ))));
                }
                if self.validate && !entity.has_relational_member(name) {
                    return Err(undefined_reference(identifier.position));
                }
                Ok(leaf(LeafKind::ComputedUserSet {
                    relation: name.clone(),
                }))
            }
            [tuple_set, computed] => {
                if self.validate {
                    self.validate_tuple_to_user_set(entity, tuple_set, computed, identifier.position)?;
                }
                Ok(leaf(LeafKind::TupleToUserSet {
                    tuple_set: tuple_set.clone(),
                    computed: computed.clone(),
                }))
            }
            _ => Err(CompileError::new(
                identifier.position,
                CompileErrorKind::UnsupportedRelationWalk,
            )),
        }
    }

    /// `tuple_set` must be a relation here, and every type it points at must
    /// declare `computed`.
    fn validate_tuple_to_user_set(
        &self,
        entity: &EntityStatement,
        tuple_set: &str,
        computed: &str,
        position: Position,
    ) -> Result<(), CompileError> {
        let relation = entity
            .get_relation(tuple_set)
            .ok_or_else(|| undefined_reference(position))?;

        for relation_type in &relation.relation_types {
            let target = self
                .entities
                .get(relation_type.entity_type.as_str())
                .ok_or_else(|| undefined_reference(position))?;
            if !target.has_relational_member(computed) {
                return Err(undefined_reference(position));
            }
        }
        Ok(())
    }

    fn compile_call(&self, entity: &EntityStatement, call: &Call) -> Result<Child, CompileError> {
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            let [name] = argument.segments.as_slice() else {
                return Err(CompileError::new(
                    argument.position,
                    CompileErrorKind::InvalidRuleReference,
                ));
            };
            arguments.push(ComputedAttribute::new(name));
        }

        if self.validate {
            self.validate_call(entity, call)?;
        }

        Ok(leaf(LeafKind::Call {
            rule_name: call.name.clone(),
            arguments,
        }))
    }

    fn validate_call(&self, entity: &EntityStatement, call: &Call) -> Result<(), CompileError> {
        let rule = self
            .rules
            .get(call.name.as_str())
            .ok_or_else(|| CompileError::new(call.position, CompileErrorKind::InvalidRuleReference))?;

        if call.arguments.len() < rule.arguments.len() {
            return Err(CompileError::new(
                call.position,
                CompileErrorKind::MissingArgument,
            ));
        }
        if call.arguments.len() > rule.arguments.len() {
            return Err(CompileError::new(
                call.position,
                CompileErrorKind::InvalidArgument,
            ));
        }

        for (argument, parameter) in call.arguments.iter().zip(&rule.arguments) {
            let attribute = entity
                .get_attribute(&argument.to_string())
                .ok_or_else(|| {
                    CompileError::new(argument.position, CompileErrorKind::InvalidRuleReference)
                })?;
            if attribute.attribute_type != parameter.attribute_type {
                return Err(CompileError::new(
                    argument.position,
                    CompileErrorKind::InvalidArgument,
                ));
            }
        }
        Ok(())
    }
}

fn compile_rule(rule: &RuleStatement) -> RuleDefinition {
    RuleDefinition {
        name: rule.name.clone(),
        arguments: rule
            .arguments
            .iter()
            .map(|a| (a.name.clone(), a.attribute_type))
            .collect(),
        expression: rule.body.clone(),
    }
}

fn leaf(kind: LeafKind) -> Child {
    Child::Leaf(Leaf::new(kind))
}

fn undefined_reference(position: Position) -> CompileError {
    CompileError::new(position, CompileErrorKind::UndefinedRelationReference)
}

/// Keeps `key:value` pairs and drops anything malformed.
fn parse_option_pairs(options: &[String]) -> IndexMap<String, String> {
    options
        .iter()
        .filter_map(|option| {
            let mut parts = option.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;
    use crate::schema::types::{AttributeType, BaseAttributeType, EntityReference};

    fn compile_str(input: &str, validate: bool) -> Result<CompiledSchema, CompileError> {
        compile(&parse_schema(input).unwrap(), validate)
    }

    fn entity<'a>(compiled: &'a CompiledSchema, name: &str) -> &'a EntityDefinition {
        compiled.entities.iter().find(|e| e.name == name).unwrap()
    }

    fn user_set(relation: &str) -> Child {
        leaf(LeafKind::ComputedUserSet {
            relation: relation.to_string(),
        })
    }

    #[test]
    fn relations_keep_type_and_suffix() {
        let compiled = compile_str(
            "entity user {} entity group { relation member @user @group#member }",
            true,
        )
        .unwrap();

        let member = entity(&compiled, "group").get_relation("member").unwrap();
        assert_eq!(
            member.relation_references,
            vec![
                RelationReference::new("user", ""),
                RelationReference::new("group", "member"),
            ]
        );
        assert_eq!(
            entity(&compiled, "group").reference("member"),
            Some(EntityReference::Relation)
        );
    }

    #[test]
    fn infix_lowers_to_nested_binary_rewrites() {
        let compiled = compile_str(
            "entity user {} entity doc { relation viewer @user relation editor @user relation owner @user permission view = viewer or editor and owner }",
            true,
        )
        .unwrap();

        let view = entity(&compiled, "doc").get_permission("view").unwrap();
        assert_eq!(
            view.child,
            Child::Rewrite(Rewrite {
                operation: RewriteOperation::Intersection,
                children: vec![
                    Child::Rewrite(Rewrite {
                        operation: RewriteOperation::Union,
                        children: vec![user_set("viewer"), user_set("editor")],
                        exclusion: false,
                    }),
                    user_set("owner"),
                ],
                exclusion: false,
            })
        );
    }

    #[test]
    fn two_segment_identifier_lowers_to_tuple_to_user_set() {
        let compiled = compile_str(
            "entity user {} entity folder { relation viewer @user } entity doc { relation parent @folder permission view = parent.viewer }",
            true,
        )
        .unwrap();

        let view = entity(&compiled, "doc").get_permission("view").unwrap();
        assert_eq!(
            view.child,
            leaf(LeafKind::TupleToUserSet {
                tuple_set: "parent".to_string(),
                computed: "viewer".to_string(),
            })
        );
    }

    #[test]
    fn attribute_identifier_lowers_to_computed_attribute() {
        let compiled = compile_str(
            "entity doc { attribute public boolean permission view = public }",
            true,
        )
        .unwrap();

        let doc = entity(&compiled, "doc");
        assert_eq!(
            doc.get_permission("view").unwrap().child,
            leaf(LeafKind::ComputedAttribute(ComputedAttribute::new("public")))
        );
        assert_eq!(doc.reference("public"), Some(EntityReference::Attribute));
        assert_eq!(
            doc.get_attribute("public").unwrap().attribute_type,
            AttributeType::scalar(BaseAttributeType::Boolean)
        );
    }

    #[test]
    fn not_sets_exclusion_on_the_child() {
        let compiled = compile_str(
            "entity user {} entity doc { relation owner @user relation banned @user permission view = owner and not banned }",
            true,
        )
        .unwrap();

        let Child::Rewrite(rewrite) = &entity(&compiled, "doc").get_permission("view").unwrap().child
        else {
            panic!("expected rewrite");
        };
        assert!(!rewrite.children[0].exclusion());
        assert!(rewrite.children[1].exclusion());
    }

    #[test]
    fn call_records_attribute_arguments() {
        let compiled = compile_str(
            "entity account { attribute balance integer permission withdraw = check_balance(balance) } rule check_balance(balance integer) { balance > 0 }",
            true,
        )
        .unwrap();

        assert_eq!(
            entity(&compiled, "account")
                .get_permission("withdraw")
                .unwrap()
                .child,
            leaf(LeafKind::Call {
                rule_name: "check_balance".to_string(),
                arguments: vec![ComputedAttribute::new("balance")],
            })
        );
        assert_eq!(compiled.rules[0].name, "check_balance");
        assert_eq!(compiled.rules[0].expression, "balance > 0");
        assert_eq!(
            compiled.rules[0].arguments.get("balance"),
            Some(&AttributeType::scalar(BaseAttributeType::Integer))
        );
    }

    #[test]
    fn options_are_split_into_pairs() {
        let compiled = compile_str(
            "entity user {} entity doc |ttl:30|broken { relation owner @user |weight:2 }",
            true,
        )
        .unwrap();

        let doc = entity(&compiled, "doc");
        assert_eq!(doc.options.get("ttl").map(String::as_str), Some("30"));
        assert_eq!(doc.options.len(), 1);
        assert_eq!(
            doc.get_relation("owner")
                .unwrap()
                .options
                .get("weight")
                .map(String::as_str),
            Some("2")
        );
    }

    #[test]
    fn undefined_identifier_is_rejected_with_position() {
        let input = "entity user {}\nentity doc {\n    relation owner @user\n    permission view = owner or editor\n}";
        let err = compile_str(input, true).unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::UndefinedRelationReference);
        assert_eq!(err.to_string(), "4:32: undefined relation reference");
    }

    #[test]
    fn undefined_relation_type_is_rejected() {
        let err = compile_str("entity doc { relation owner @user }", true).unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::UndefinedRelationReference);
    }

    #[test]
    fn undefined_subject_relation_suffix_is_rejected() {
        let err = compile_str(
            "entity user {} entity group { relation member @user } entity doc { relation viewer @group#admin }",
            true,
        )
        .unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::UndefinedRelationReference);
    }

    #[test]
    fn tuple_set_computed_must_exist_on_every_referenced_type() {
        let err = compile_str(
            "entity user {} entity org { relation admin @user } entity team { relation lead @user } entity doc { relation parent @org @team permission manage = parent.admin }",
            true,
        )
        .unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::UndefinedRelationReference);
    }

    #[test]
    fn validation_can_be_skipped() {
        let compiled =
            compile_str("entity doc { relation owner @user permission view = editor or parent.view }", false)
                .unwrap();

        assert!(entity(&compiled, "doc").get_permission("view").is_some());
    }

    #[test]
    fn three_segment_walk_is_rejected() {
        let input = r#"entity user {}

entity organization {
    relation admin @user
}

entity container {
    relation parent @organization
    relation admin @user
}

entity document {
    relation parent @container
    relation admin @user

    action update = parent.parent.admin or admin
}"#;

        let err = compile_str(input, true).unwrap_err();
        assert_eq!(err.to_string(), "16:21: not supported relation walk");

        let err = compile_str(input, false).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnsupportedRelationWalk);
    }

    #[test]
    fn unknown_rule_is_invalid_rule_reference() {
        let err = compile_str(
            "entity account { attribute balance integer permission withdraw = missing(balance) }",
            true,
        )
        .unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::InvalidRuleReference);
    }

    #[test]
    fn non_attribute_argument_is_invalid_rule_reference() {
        let err = compile_str(
            "entity user {} entity account { relation owner @user permission withdraw = check(owner) } rule check(x boolean) { x }",
            true,
        )
        .unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::InvalidRuleReference);
    }

    #[test]
    fn short_call_is_missing_argument() {
        let err = compile_str(
            "entity account { attribute balance integer permission withdraw = check(balance) } rule check(balance integer, limit integer) { balance < limit }",
            true,
        )
        .unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::MissingArgument);
    }

    #[test]
    fn mismatched_argument_type_is_invalid_argument() {
        let err = compile_str(
            "entity account { attribute balance string permission withdraw = check(balance) } rule check(balance integer) { balance > 0 }",
            true,
        )
        .unwrap_err();

        assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
    }
}
