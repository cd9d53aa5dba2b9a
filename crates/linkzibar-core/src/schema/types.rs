use std::fmt;

use indexmap::IndexMap;

/// The compiled, read-only authorization model.
///
/// Every map preserves declaration order, so lookups that scan a map (such as
/// finding the inverse of a relation) are deterministic for a given schema
/// text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub entity_definitions: IndexMap<String, EntityDefinition>,
    pub rule_definitions: IndexMap<String, RuleDefinition>,
    pub references: IndexMap<String, SchemaReference>,
}

impl SchemaDefinition {
    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entity_definitions.get(name)
    }

    pub fn rule(&self, name: &str) -> Option<&RuleDefinition> {
        self.rule_definitions.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaReference {
    Entity,
    Rule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDefinition {
    pub name: String,
    pub relations: IndexMap<String, RelationDefinition>,
    pub permissions: IndexMap<String, PermissionDefinition>,
    pub attributes: IndexMap<String, AttributeDefinition>,
    pub references: IndexMap<String, EntityReference>,
    pub options: IndexMap<String, String>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.get(name)
    }

    pub fn get_permission(&self, name: &str) -> Option<&PermissionDefinition> {
        self.permissions.get(name)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    pub fn reference(&self, name: &str) -> Option<EntityReference> {
        self.references.get(name).copied()
    }

    pub fn add_relation(&mut self, relation: RelationDefinition) {
        self.references
            .insert(relation.name.clone(), EntityReference::Relation);
        self.relations.insert(relation.name.clone(), relation);
    }

    pub fn add_permission(&mut self, permission: PermissionDefinition) {
        self.references
            .insert(permission.name.clone(), EntityReference::Permission);
        self.permissions.insert(permission.name.clone(), permission);
    }

    pub fn add_attribute(&mut self, attribute: AttributeDefinition) {
        self.references
            .insert(attribute.name.clone(), EntityReference::Attribute);
        self.attributes.insert(attribute.name.clone(), attribute);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityReference {
    Relation,
    Permission,
    Attribute,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationDefinition {
    pub name: String,
    pub relation_references: Vec<RelationReference>,
    pub options: IndexMap<String, String>,
}

impl RelationDefinition {
    pub fn new(name: impl Into<String>, relation_references: Vec<RelationReference>) -> Self {
        Self {
            name: name.into(),
            relation_references,
            options: IndexMap::new(),
        }
    }

    pub fn references_type(&self, entity_type: &str) -> bool {
        self.relation_references
            .iter()
            .any(|r| r.entity_type == entity_type)
    }
}

/// A `{type, relation}` pair. An empty relation means "any subject of the type";
/// a non-empty one means "subjects holding that relation on an entity of the type".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RelationReference {
    pub entity_type: String,
    pub relation: String,
}

impl RelationReference {
    pub fn new(entity_type: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            relation: relation.into(),
        }
    }

    pub fn is_subject_set(&self) -> bool {
        !self.relation.is_empty()
    }
}

impl fmt::Display for RelationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relation.is_empty() {
            write!(f, "{}", self.entity_type)
        } else {
            write!(f, "{}#{}", self.entity_type, self.relation)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDefinition {
    pub name: String,
    pub child: Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    pub name: String,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefinition {
    pub name: String,
    pub arguments: IndexMap<String, AttributeType>,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseAttributeType {
    Boolean,
    String,
    Integer,
    Double,
}

impl BaseAttributeType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(Self::Boolean),
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeType {
    pub base: BaseAttributeType,
    pub is_array: bool,
}

impl AttributeType {
    pub fn scalar(base: BaseAttributeType) -> Self {
        Self {
            base,
            is_array: false,
        }
    }

    pub fn array(base: BaseAttributeType) -> Self {
        Self {
            base,
            is_array: true,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.name())?;
        if self.is_array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// A node of a permission's expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Rewrite(Rewrite),
    Leaf(Leaf),
}

impl Child {
    pub fn exclusion(&self) -> bool {
        match self {
            Child::Rewrite(rewrite) => rewrite.exclusion,
            Child::Leaf(leaf) => leaf.exclusion,
        }
    }

    pub fn set_exclusion(&mut self, exclusion: bool) {
        match self {
            Child::Rewrite(rewrite) => rewrite.exclusion = exclusion,
            Child::Leaf(leaf) => leaf.exclusion = exclusion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOperation {
    Union,
    Intersection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub operation: RewriteOperation,
    pub children: Vec<Child>,
    pub exclusion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub kind: LeafKind,
    pub exclusion: bool,
}

impl Leaf {
    pub fn new(kind: LeafKind) -> Self {
        Self {
            kind,
            exclusion: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafKind {
    ComputedUserSet {
        relation: String,
    },
    TupleToUserSet {
        tuple_set: String,
        computed: String,
    },
    ComputedAttribute(ComputedAttribute),
    Call {
        rule_name: String,
        arguments: Vec<ComputedAttribute>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedAttribute {
    pub name: String,
}

impl ComputedAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
