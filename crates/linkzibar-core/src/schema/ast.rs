//! Syntax tree produced by the parser.
//!
//! Each node keeps the position of its name token so the compiler can anchor
//! errors. `Display` renders canonical DSL text that parses back to an
//! equivalent tree.

use std::fmt;

use super::types::AttributeType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub statements: Vec<Statement>,
}

impl Schema {
    pub fn entities(&self) -> impl Iterator<Item = &EntityStatement> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Entity(entity) => Some(entity),
            Statement::Rule(_) => None,
        })
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleStatement> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Rule(rule) => Some(rule),
            Statement::Entity(_) => None,
        })
    }

    pub fn get_entity(&self, name: &str) -> Option<&EntityStatement> {
        self.entities().find(|e| e.name == name)
    }

    pub fn get_rule(&self, name: &str) -> Option<&RuleStatement> {
        self.rules().find(|r| r.name == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Entity(EntityStatement),
    Rule(RuleStatement),
}

impl Statement {
    pub fn name(&self) -> &str {
        match self {
            Statement::Entity(entity) => &entity.name,
            Statement::Rule(rule) => &rule.name,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Entity(entity) => entity.fmt(f),
            Statement::Rule(rule) => rule.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStatement {
    pub name: String,
    pub position: Position,
    pub relations: Vec<RelationStatement>,
    pub attributes: Vec<AttributeStatement>,
    pub permissions: Vec<PermissionStatement>,
    pub options: Vec<String>,
}

impl EntityStatement {
    pub fn get_relation(&self, name: &str) -> Option<&RelationStatement> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeStatement> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn get_permission(&self, name: &str) -> Option<&PermissionStatement> {
        self.permissions.iter().find(|p| p.name == name)
    }

    /// True when `name` is a relation or a permission of this entity.
    pub fn has_relational_member(&self, name: &str) -> bool {
        self.get_relation(name).is_some() || self.get_permission(name).is_some()
    }
}

impl fmt::Display for EntityStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {}", self.name)?;
        write_options(f, &self.options)?;
        if self.relations.is_empty() && self.attributes.is_empty() && self.permissions.is_empty()
        {
            return f.write_str(" {}");
        }
        f.write_str(" {\n")?;
        for relation in &self.relations {
            writeln!(f, "    {relation}")?;
        }
        for attribute in &self.attributes {
            writeln!(f, "    {attribute}")?;
        }
        for permission in &self.permissions {
            writeln!(f, "    {permission}")?;
        }
        f.write_str("}")
    }
}

fn write_options(f: &mut fmt::Formatter<'_>, options: &[String]) -> fmt::Result {
    for option in options {
        write!(f, " |{option}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationStatement {
    pub name: String,
    pub position: Position,
    pub relation_types: Vec<RelationTypeStatement>,
    pub options: Vec<String>,
}

impl fmt::Display for RelationStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relation {}", self.name)?;
        for relation_type in &self.relation_types {
            write!(f, " {relation_type}")?;
        }
        write_options(f, &self.options)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTypeStatement {
    pub entity_type: String,
    pub relation: Option<String>,
    pub position: Position,
}

impl fmt::Display for RelationTypeStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "@{}#{}", self.entity_type, relation),
            None => write!(f, "@{}", self.entity_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeStatement {
    pub name: String,
    pub position: Position,
    pub attribute_type: AttributeType,
}

impl fmt::Display for AttributeStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attribute {} {}", self.name, self.attribute_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Permission,
    /// Legacy spelling of `permission`.
    Action,
}

impl PermissionKind {
    fn keyword(&self) -> &'static str {
        match self {
            PermissionKind::Permission => "permission",
            PermissionKind::Action => "action",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatement {
    pub name: String,
    pub position: Position,
    pub kind: PermissionKind,
    pub expression: Expression,
}

impl fmt::Display for PermissionStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} = {}",
            self.kind.keyword(),
            self.name,
            self.expression
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStatement {
    pub name: String,
    pub position: Position,
    pub arguments: Vec<RuleArgument>,
    pub body: String,
}

impl fmt::Display for RuleStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {}(", self.name)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", argument.name, argument.attribute_type)?;
        }
        write!(f, ") {{\n    {}\n}}", self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleArgument {
    pub name: String,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    And,
    Or,
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfixOperator::And => f.write_str("and"),
            InfixOperator::Or => f.write_str("or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Identifier(Identifier),
    Call(Call),
    Prefix {
        position: Position,
        operand: Box<Expression>,
    },
    Infix {
        operator: InfixOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn position(&self) -> Position {
        match self {
            Expression::Identifier(identifier) => identifier.position,
            Expression::Call(call) => call.position,
            Expression::Prefix { position, .. } => *position,
            Expression::Infix { left, .. } => left.position(),
        }
    }

    fn is_infix(&self) -> bool {
        matches!(self, Expression::Infix { .. })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(identifier) => identifier.fmt(f),
            Expression::Call(call) => call.fmt(f),
            Expression::Prefix { operand, .. } => {
                if operand.is_infix() {
                    write!(f, "not ({operand})")
                } else {
                    write!(f, "not {operand}")
                }
            }
            // Operators share one left-associative level, so only a nested
            // infix on the right needs parentheses.
            Expression::Infix {
                operator,
                left,
                right,
            } => {
                if right.is_infix() {
                    write!(f, "{left} {operator} ({right})")
                } else {
                    write!(f, "{left} {operator} {right}")
                }
            }
        }
    }
}

/// A dotted name such as `owner` or `parent.admin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub segments: Vec<String>,
    pub position: Position,
}

impl Identifier {
    pub fn parse(path: &str, position: Position) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
            position,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub position: Position,
    pub arguments: Vec<Identifier>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            argument.fmt(f)?;
        }
        f.write_str(")")
    }
}
