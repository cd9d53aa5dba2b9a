//! Structural queries over the relation graph.
//!
//! These ignore permission expressions entirely: nodes are entity types and
//! edges are declared relation references.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::schema::types::{Child, EntityDefinition, LeafKind, RelationReference};

use super::{GraphError, LinkedSchemaGraph};

impl<'a> LinkedSchemaGraph<'a> {
    /// First relation of `source_type`, in declaration order, that references
    /// `target_type`.
    pub fn inverse_relation(&self, source_type: &str, target_type: &str) -> Option<&'a str> {
        let entity = self.schema().entity(source_type)?;
        entity
            .relations
            .values()
            .find(|relation| relation.references_type(target_type))
            .map(|relation| relation.name.as_str())
    }

    /// Shortest sequence of `{type, relation}` hops leading from
    /// `source_type` to `target_type`.
    pub fn build_relation_path_chain(
        &self,
        source_type: &str,
        target_type: &str,
    ) -> Result<Vec<RelationReference>, GraphError> {
        if let Some(relation) = self.inverse_relation(source_type, target_type) {
            return Ok(vec![RelationReference::new(source_type, relation)]);
        }

        let mut queue = VecDeque::from([source_type]);
        let mut visited = HashSet::from([source_type]);
        let mut reached_by: HashMap<&str, (&str, &str)> = HashMap::new();

        while let Some(current) = queue.pop_front() {
            let Some(entity) = self.schema().entity(current) else {
                continue;
            };
            for relation in entity.relations.values() {
                for reference in &relation.relation_references {
                    let next = reference.entity_type.as_str();
                    if !visited.insert(next) {
                        continue;
                    }
                    reached_by.insert(next, (current, relation.name.as_str()));
                    if next == target_type {
                        return Ok(unwind(&reached_by, source_type, target_type));
                    }
                    queue.push_back(next);
                }
            }
        }

        Err(GraphError::NoPathFound)
    }

    /// Subject relation required when walking `relation_name` of `left_type`
    /// into `right_type`, or `""` when none applies.
    pub fn subject_relation_for_path_walk(
        &self,
        left_type: &str,
        relation_name: &str,
        right_type: &str,
    ) -> &'a str {
        self.schema()
            .entity(left_type)
            .and_then(|entity| entity.get_relation(relation_name))
            .and_then(|relation| {
                relation
                    .relation_references
                    .iter()
                    .find(|reference| reference.entity_type == right_type)
            })
            .map(|reference| reference.relation.as_str())
            .unwrap_or("")
    }

    /// Tuple-set relations through which `permission` on `entity_type` calls
    /// itself on another entity of the same type. Cycles that pass through
    /// other types are not reported.
    pub fn self_cycle_relations_for_permission(
        &self,
        entity_type: &str,
        permission: &str,
    ) -> Vec<String> {
        let Some(entity) = self.schema().entity(entity_type) else {
            return Vec::new();
        };
        let Some(definition) = entity.get_permission(permission) else {
            return Vec::new();
        };

        let mut relations = Vec::new();
        collect_self_cycles(entity, &definition.child, permission, &mut relations);
        relations
    }
}

fn unwind<'s>(
    reached_by: &HashMap<&'s str, (&'s str, &'s str)>,
    source_type: &'s str,
    target_type: &'s str,
) -> Vec<RelationReference> {
    let mut hops = Vec::new();
    let mut current = target_type;
    while current != source_type {
        let Some(&(previous, relation)) = reached_by.get(current) else {
            break;
        };
        hops.push(RelationReference::new(previous, relation));
        current = previous;
    }
    hops.reverse();
    hops
}

fn collect_self_cycles(
    entity: &EntityDefinition,
    child: &Child,
    permission: &str,
    out: &mut Vec<String>,
) {
    match child {
        Child::Rewrite(rewrite) => {
            for child in &rewrite.children {
                collect_self_cycles(entity, child, permission, out);
            }
        }
        Child::Leaf(leaf) => {
            let LeafKind::TupleToUserSet {
                tuple_set,
                computed,
            } = &leaf.kind
            else {
                return;
            };
            let recursive = computed == permission
                && entity
                    .get_relation(tuple_set)
                    .is_some_and(|relation| relation.references_type(&entity.name));
            if recursive && !out.contains(tuple_set) {
                out.push(tuple_set.clone());
            }
        }
    }
}
