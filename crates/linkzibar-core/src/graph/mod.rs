//! Linkage resolution over a compiled [`SchemaDefinition`].
//!
//! Given a target (an entity type plus one of its relation, permission or
//! attribute names) and a source subject, [`LinkedSchemaGraph`] enumerates
//! every place where a relationship tuple or an attribute value can decide the
//! target's outcome for that subject.
//!
//! [`SchemaDefinition`]: crate::schema::types::SchemaDefinition

mod linked;
mod path;

use std::fmt;

use crate::schema::types::RelationReference;

pub use linked::LinkedSchemaGraph;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("entity definition not found")]
    EntityDefinitionNotFound,
    #[error("relation definition not found")]
    RelationDefinitionNotFound,
    #[error("permission not found")]
    PermissionNotFound,
    #[error("attribute not found")]
    AttributeNotFound,
    #[error("unimplemented")]
    Unimplemented,
    #[error("no path found between entity types")]
    NoPathFound,
}

/// An entity type paired with a relation, permission or attribute name.
///
/// For a source subject the value is the subject relation, and may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Entrance {
    pub entity_type: String,
    pub value: String,
}

impl Entrance {
    pub fn new(entity_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            value: value.into(),
        }
    }

    pub(crate) fn key(&self) -> String {
        format!("{}#{}", self.entity_type, self.value)
    }
}

impl fmt::Display for Entrance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}", self.entity_type)
        } else {
            write!(f, "{}#{}", self.entity_type, self.value)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkedEntranceKind {
    Relation,
    ComputedUserSet,
    TupleToUserSet,
    Attribute,
    PathChain,
}

impl LinkedEntranceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relation => "relation",
            Self::ComputedUserSet => "computed_user_set",
            Self::TupleToUserSet => "tuple_to_user_set",
            Self::Attribute => "attribute",
            Self::PathChain => "path_chain",
        }
    }
}

impl fmt::Display for LinkedEntranceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEntrance {
    pub kind: LinkedEntranceKind,
    pub target_entrance: Entrance,
    /// Set only for [`LinkedEntranceKind::TupleToUserSet`].
    pub tuple_set_relation: String,
    /// Hops from the queried entity type to the attribute's entity type; set
    /// only for [`LinkedEntranceKind::PathChain`].
    pub path_chain: Vec<RelationReference>,
}

impl LinkedEntrance {
    fn plain(kind: LinkedEntranceKind, target: Entrance) -> Self {
        Self {
            kind,
            target_entrance: target,
            tuple_set_relation: String::new(),
            path_chain: Vec::new(),
        }
    }

    pub fn relation(target: Entrance) -> Self {
        Self::plain(LinkedEntranceKind::Relation, target)
    }

    pub fn computed_user_set(target: Entrance) -> Self {
        Self::plain(LinkedEntranceKind::ComputedUserSet, target)
    }

    pub fn attribute(target: Entrance) -> Self {
        Self::plain(LinkedEntranceKind::Attribute, target)
    }

    pub fn tuple_to_user_set(target: Entrance, tuple_set_relation: impl Into<String>) -> Self {
        Self {
            tuple_set_relation: tuple_set_relation.into(),
            ..Self::plain(LinkedEntranceKind::TupleToUserSet, target)
        }
    }

    pub fn path_chain(target: Entrance, path_chain: Vec<RelationReference>) -> Self {
        Self {
            path_chain,
            ..Self::plain(LinkedEntranceKind::PathChain, target)
        }
    }

    fn is_attribute_access(&self) -> bool {
        matches!(
            self.kind,
            LinkedEntranceKind::Attribute | LinkedEntranceKind::PathChain
        )
    }
}

impl fmt::Display for LinkedEntrance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.target_entrance)?;
        if !self.tuple_set_relation.is_empty() {
            write!(f, " via {}", self.tuple_set_relation)?;
        }
        if !self.path_chain.is_empty() {
            let hops: Vec<String> = self
                .path_chain
                .iter()
                .map(|hop| format!("{}.{}", hop.entity_type, hop.relation))
                .collect();
            write!(f, " [{}]", hops.join(" -> "))?;
        }
        Ok(())
    }
}
