use std::collections::{HashMap, HashSet};

use crate::schema::types::{
    Child, EntityDefinition, EntityReference, Leaf, LeafKind, RelationDefinition,
    RelationReference, SchemaDefinition,
};

use super::{Entrance, GraphError, LinkedEntrance};

/// Read-only view of a schema used to answer linkage queries.
///
/// Each query owns its search state, so one graph can serve any number of
/// concurrent callers.
#[derive(Debug, Clone, Copy)]
pub struct LinkedSchemaGraph<'a> {
    schema: &'a SchemaDefinition,
}

/// State for a single resolution call.
#[derive(Debug, Default)]
struct Walk {
    visited: HashSet<String>,
    chains: HashMap<(String, String), Vec<RelationReference>>,
}

impl<'a> LinkedSchemaGraph<'a> {
    pub fn new(schema: &'a SchemaDefinition) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'a SchemaDefinition {
        self.schema
    }

    /// Every entrance through which `source` can affect `target`, in the
    /// order the target's expression tree declares them.
    pub fn linked_entrances(
        &self,
        target: &Entrance,
        source: &Entrance,
    ) -> Result<Vec<LinkedEntrance>, GraphError> {
        let mut walk = Walk::default();
        self.find_entrance(target, source, &mut walk)
    }

    /// Resolves each target independently and returns one list per target,
    /// in target order. The first failing target aborts the batch.
    pub fn linked_entrances_for_targets(
        &self,
        targets: &[Entrance],
        source: &Entrance,
    ) -> Result<Vec<Vec<LinkedEntrance>>, GraphError> {
        targets
            .iter()
            .map(|target| self.linked_entrances(target, source))
            .collect()
    }

    pub(super) fn entity(&self, name: &str) -> Result<&'a EntityDefinition, GraphError> {
        self.schema
            .entity(name)
            .ok_or(GraphError::EntityDefinitionNotFound)
    }

    fn find_entrance(
        &self,
        target: &Entrance,
        source: &Entrance,
        walk: &mut Walk,
    ) -> Result<Vec<LinkedEntrance>, GraphError> {
        if !walk.visited.insert(target.key()) {
            return Ok(Vec::new());
        }

        let entity = self.entity(&target.entity_type)?;

        match entity.reference(&target.value) {
            Some(EntityReference::Relation) => self.find_relation_entrance(target, source, walk),
            Some(EntityReference::Permission) => {
                let permission = entity
                    .get_permission(&target.value)
                    .ok_or(GraphError::PermissionNotFound)?;
                self.find_child_entrance(target, source, &permission.child, walk)
            }
            Some(EntityReference::Attribute) => {
                let attribute = entity
                    .get_attribute(&target.value)
                    .ok_or(GraphError::AttributeNotFound)?;
                Ok(vec![LinkedEntrance::attribute(Entrance::new(
                    &target.entity_type,
                    &attribute.name,
                ))])
            }
            None => Err(GraphError::Unimplemented),
        }
    }

    fn find_relation_entrance(
        &self,
        target: &Entrance,
        source: &Entrance,
        walk: &mut Walk,
    ) -> Result<Vec<LinkedEntrance>, GraphError> {
        let entity = self.entity(&target.entity_type)?;
        let relation = entity
            .get_relation(&target.value)
            .ok_or(GraphError::RelationDefinitionNotFound)?;

        let mut entrances = Vec::new();
        if is_directly_related(relation, source) {
            entrances.push(LinkedEntrance::relation(target.clone()));
        }

        for reference in relation
            .relation_references
            .iter()
            .filter(|r| r.is_subject_set())
        {
            let nested = Entrance::new(&reference.entity_type, &reference.relation);
            entrances.extend(self.find_entrance(&nested, source, walk)?);
        }

        Ok(entrances)
    }

    fn find_child_entrance(
        &self,
        target: &Entrance,
        source: &Entrance,
        child: &Child,
        walk: &mut Walk,
    ) -> Result<Vec<LinkedEntrance>, GraphError> {
        match child {
            Child::Rewrite(rewrite) => {
                let mut entrances = Vec::new();
                for child in &rewrite.children {
                    entrances.extend(self.find_child_entrance(target, source, child, walk)?);
                }
                Ok(entrances)
            }
            Child::Leaf(leaf) => self.find_leaf_entrance(target, source, leaf, walk),
        }
    }

    fn find_leaf_entrance(
        &self,
        target: &Entrance,
        source: &Entrance,
        leaf: &Leaf,
        walk: &mut Walk,
    ) -> Result<Vec<LinkedEntrance>, GraphError> {
        match &leaf.kind {
            LeafKind::ComputedUserSet { relation } => {
                let mut entrances = Vec::new();
                if target.entity_type == source.entity_type && *relation == source.value {
                    entrances.push(LinkedEntrance::computed_user_set(target.clone()));
                }
                let computed = Entrance::new(&target.entity_type, relation);
                entrances.extend(self.find_entrance(&computed, source, walk)?);
                Ok(entrances)
            }
            LeafKind::TupleToUserSet {
                tuple_set,
                computed,
            } => self.find_tuple_to_user_set_entrance(target, source, tuple_set, computed, walk),
            LeafKind::ComputedAttribute(attribute) => Ok(vec![LinkedEntrance::attribute(
                Entrance::new(&target.entity_type, &attribute.name),
            )]),
            LeafKind::Call { arguments, .. } => Ok(arguments
                .iter()
                .map(|argument| {
                    LinkedEntrance::attribute(Entrance::new(&target.entity_type, &argument.name))
                })
                .collect()),
        }
    }

    fn find_tuple_to_user_set_entrance(
        &self,
        target: &Entrance,
        source: &Entrance,
        tuple_set: &str,
        computed: &str,
        walk: &mut Walk,
    ) -> Result<Vec<LinkedEntrance>, GraphError> {
        let entity = self.entity(&target.entity_type)?;
        let relation = entity
            .get_relation(tuple_set)
            .ok_or(GraphError::RelationDefinitionNotFound)?;

        let mut entrances = Vec::new();
        for reference in &relation.relation_references {
            if reference.entity_type == source.entity_type && source.value == computed {
                entrances.push(LinkedEntrance::tuple_to_user_set(target.clone(), tuple_set));
            }

            let nested = Entrance::new(&reference.entity_type, computed);
            let mut chained = Vec::new();
            let mut passed = Vec::new();
            for entrance in self.find_entrance(&nested, source, walk)? {
                if entrance.is_attribute_access()
                    && entrance.target_entrance.entity_type != target.entity_type
                {
                    chained.push(self.chain_through(target, tuple_set, reference, entrance, walk)?);
                } else {
                    passed.push(entrance);
                }
            }
            entrances.append(&mut chained);
            entrances.append(&mut passed);
        }

        Ok(entrances)
    }

    /// Prefixes an attribute reached through `tuple_set` with the hop that
    /// leads to it.
    fn chain_through(
        &self,
        target: &Entrance,
        tuple_set: &str,
        reference: &RelationReference,
        entrance: LinkedEntrance,
        walk: &mut Walk,
    ) -> Result<LinkedEntrance, GraphError> {
        let hop = RelationReference::new(&target.entity_type, tuple_set);
        let attribute_type = &entrance.target_entrance.entity_type;

        let path_chain = if !entrance.path_chain.is_empty() {
            std::iter::once(hop)
                .chain(entrance.path_chain.iter().cloned())
                .collect()
        } else if *attribute_type == reference.entity_type {
            vec![hop]
        } else {
            self.cached_path_chain(&target.entity_type, attribute_type, walk)?
        };

        Ok(LinkedEntrance::path_chain(
            entrance.target_entrance,
            path_chain,
        ))
    }

    fn cached_path_chain(
        &self,
        source_type: &str,
        target_type: &str,
        walk: &mut Walk,
    ) -> Result<Vec<RelationReference>, GraphError> {
        let key = (source_type.to_string(), target_type.to_string());
        if let Some(chain) = walk.chains.get(&key) {
            return Ok(chain.clone());
        }

        tracing::debug!(
            from = source_type,
            to = target_type,
            "building attribute path chain from relation graph"
        );
        let chain = self.build_relation_path_chain(source_type, target_type)?;
        walk.chains.insert(key, chain.clone());
        Ok(chain)
    }
}

/// True when `source` can be stored directly on `relation`: the type matches
/// and, for a source with a relation, the reference carries that same relation.
fn is_directly_related(relation: &RelationDefinition, source: &Entrance) -> bool {
    relation.relation_references.iter().any(|reference| {
        reference.entity_type == source.entity_type
            && (source.value.is_empty() || reference.relation == source.value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compile_schema;
    use crate::schema::types::{AttributeDefinition, AttributeType, BaseAttributeType};

    fn schema(input: &str) -> SchemaDefinition {
        compile_schema(input, true).unwrap()
    }

    fn user() -> Entrance {
        Entrance::new("user", "")
    }

    #[test]
    fn direct_relation_yields_relation_entrance() {
        let schema = schema("entity user {} entity document { relation viewer @user }");
        let graph = LinkedSchemaGraph::new(&schema);

        let entrances = graph
            .linked_entrances(&Entrance::new("document", "viewer"), &user())
            .unwrap();

        assert_eq!(
            entrances,
            vec![LinkedEntrance::relation(Entrance::new("document", "viewer"))]
        );
    }

    #[test]
    fn subject_relation_must_match_reference_suffix() {
        let schema = schema(
            "entity user {} entity group { relation member @user relation admin @user } entity document { relation viewer @group#admin }",
        );
        let graph = LinkedSchemaGraph::new(&schema);

        let entrances = graph
            .linked_entrances(
                &Entrance::new("document", "viewer"),
                &Entrance::new("group", "member"),
            )
            .unwrap();

        assert!(entrances.is_empty());
    }

    #[test]
    fn self_recursive_permission_terminates() {
        let schema = schema(
            "entity user {} entity resource { relation parent @resource relation owner @user permission view = parent.view or owner }",
        );
        let graph = LinkedSchemaGraph::new(&schema);

        let entrances = graph
            .linked_entrances(&Entrance::new("resource", "view"), &user())
            .unwrap();

        assert_eq!(
            entrances,
            vec![LinkedEntrance::relation(Entrance::new("resource", "owner"))]
        );
    }

    #[test]
    fn tuple_to_user_set_entrance_when_source_relation_is_computed() {
        let schema = schema(
            "entity user {} entity folder { relation viewer @user } entity document { relation parent @folder permission view = parent.viewer }",
        );
        let graph = LinkedSchemaGraph::new(&schema);

        let entrances = graph
            .linked_entrances(
                &Entrance::new("document", "view"),
                &Entrance::new("folder", "viewer"),
            )
            .unwrap();

        assert_eq!(
            entrances,
            vec![LinkedEntrance::tuple_to_user_set(
                Entrance::new("document", "view"),
                "parent"
            )]
        );
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let schema = schema("entity user {}");
        let graph = LinkedSchemaGraph::new(&schema);

        let err = graph
            .linked_entrances(&Entrance::new("document", "view"), &user())
            .unwrap_err();

        assert_eq!(err, GraphError::EntityDefinitionNotFound);
    }

    #[test]
    fn unknown_reference_is_unimplemented() {
        let schema = schema("entity user {} entity document { relation viewer @user }");
        let graph = LinkedSchemaGraph::new(&schema);

        let err = graph
            .linked_entrances(&Entrance::new("document", "edit"), &user())
            .unwrap_err();

        assert_eq!(err.to_string(), "unimplemented");
    }

    #[test]
    fn attribute_reference_is_terminal() {
        let mut schema = schema("entity user {} entity document { relation viewer @user }");
        let document = schema.entity_definitions.get_mut("document").unwrap();
        document.add_attribute(AttributeDefinition {
            name: "public".to_string(),
            attribute_type: AttributeType::scalar(BaseAttributeType::Boolean),
        });
        let graph = LinkedSchemaGraph::new(&schema);

        let entrances = graph
            .linked_entrances(&Entrance::new("document", "public"), &user())
            .unwrap();

        assert_eq!(
            entrances,
            vec![LinkedEntrance::attribute(Entrance::new("document", "public"))]
        );
    }

    #[test]
    fn dangling_references_report_missing_definitions() {
        let mut schema = schema("entity user {} entity document { relation viewer @user }");
        let document = schema.entity_definitions.get_mut("document").unwrap();
        document
            .references
            .insert("public".to_string(), EntityReference::Attribute);
        document
            .references
            .insert("edit".to_string(), EntityReference::Permission);
        document
            .references
            .insert("owner".to_string(), EntityReference::Relation);
        let graph = LinkedSchemaGraph::new(&schema);

        let attribute = graph.linked_entrances(&Entrance::new("document", "public"), &user());
        let permission = graph.linked_entrances(&Entrance::new("document", "edit"), &user());
        let relation = graph.linked_entrances(&Entrance::new("document", "owner"), &user());

        assert_eq!(attribute, Err(GraphError::AttributeNotFound));
        assert_eq!(permission, Err(GraphError::PermissionNotFound));
        assert_eq!(relation, Err(GraphError::RelationDefinitionNotFound));
    }

    #[test]
    fn batch_resolution_keeps_target_order_and_private_state() {
        let schema = schema(
            "entity user {} entity document { relation viewer @user relation owner @user permission view = viewer or owner permission edit = owner }",
        );
        let graph = LinkedSchemaGraph::new(&schema);

        let results = graph
            .linked_entrances_for_targets(
                &[
                    Entrance::new("document", "view"),
                    Entrance::new("document", "edit"),
                ],
                &user(),
            )
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].len(), 2);
        assert_eq!(
            results[1],
            vec![LinkedEntrance::relation(Entrance::new("document", "owner"))]
        );
    }

    #[test]
    fn batch_resolution_stops_at_first_error() {
        let schema = schema("entity user {} entity document { relation viewer @user }");
        let graph = LinkedSchemaGraph::new(&schema);

        let err = graph
            .linked_entrances_for_targets(
                &[
                    Entrance::new("document", "viewer"),
                    Entrance::new("folder", "viewer"),
                ],
                &user(),
            )
            .unwrap_err();

        assert_eq!(err, GraphError::EntityDefinitionNotFound);
    }
}
