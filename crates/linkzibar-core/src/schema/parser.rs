use std::collections::HashSet;
use std::sync::LazyLock;

use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use super::ast::{
    AttributeStatement, Call, EntityStatement, Expression, Identifier, InfixOperator,
    PermissionKind, PermissionStatement, Position, RelationStatement, RelationTypeStatement,
    RuleArgument, RuleStatement, Schema, Statement,
};
use super::types::{AttributeType, BaseAttributeType};

#[derive(Parser)]
#[grammar = "schema/grammar.pest"]
struct SchemaParser;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::and_op, Assoc::Left) | Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{position}: {kind}")]
pub struct ParseError {
    pub position: Position,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(position: Position, kind: ParseErrorKind) -> Self {
        Self { position, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("{0}")]
    Syntax(String),
    #[error("duplication found for {0}")]
    Duplicate(String),
    #[error("unsupported attribute type {0}")]
    UnsupportedAttributeType(String),
    #[error("missing token: {0}")]
    MissingToken(&'static str),
    #[error("unexpected rule: {0}")]
    UnexpectedRule(String),
}

/// Every problem found in one parse, in document order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", format_parse_errors(.0))]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn errors(&self) -> &[ParseError] {
        &self.0
    }
}

impl From<ParseError> for ParseErrors {
    fn from(error: ParseError) -> Self {
        Self(vec![error])
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_schema(input: &str) -> Result<Schema, ParseErrors> {
    let pairs = SchemaParser::parse(Rule::schema, input).map_err(syntax_error)?;

    let mut statements = Vec::new();
    let mut errors = Vec::new();
    let mut seen_names = HashSet::new();

    for pair in pairs {
        if pair.as_rule() != Rule::schema {
            continue;
        }
        for inner in pair.into_inner() {
            let statement = match inner.as_rule() {
                Rule::entity_def => Statement::Entity(parse_entity_def(inner, &mut errors)?),
                Rule::rule_def => Statement::Rule(parse_rule_def(inner, &mut errors)?),
                Rule::EOI => continue,
                other => return Err(unexpected_rule(position_of(&inner), other).into()),
            };
            if !seen_names.insert(statement.name().to_string()) {
                let position = match &statement {
                    Statement::Entity(entity) => entity.position,
                    Statement::Rule(rule) => rule.position,
                };
                errors.push(duplicate(position, statement.name().to_string()));
                continue;
            }
            statements.push(statement);
        }
    }

    if errors.is_empty() {
        Ok(Schema { statements })
    } else {
        Err(ParseErrors(errors))
    }
}

fn syntax_error(error: pest::error::Error<Rule>) -> ParseErrors {
    let error = error.renamed_rules(rule_label);
    let (line, column) = match error.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    ParseError::new(
        Position::new(line, column),
        ParseErrorKind::Syntax(error.variant.message().into_owned()),
    )
    .into()
}

fn rule_label(rule: &Rule) -> String {
    match rule {
        Rule::identifier | Rule::path => "identifier".to_string(),
        Rule::entity_kw | Rule::entity_def => "`entity`".to_string(),
        Rule::rule_kw | Rule::rule_def => "`rule`".to_string(),
        Rule::relation_kw | Rule::relation_def => "`relation`".to_string(),
        Rule::permission_kw | Rule::permission_def => "`permission`".to_string(),
        Rule::attribute_kw | Rule::attribute_def => "`attribute`".to_string(),
        Rule::relation_type => "`@type`".to_string(),
        Rule::and_op => "`and`".to_string(),
        Rule::or_op => "`or`".to_string(),
        Rule::not_op => "`not`".to_string(),
        Rule::EOI => "end of input".to_string(),
        other => format!("{other:?}"),
    }
}

fn position_of(pair: &Pair<'_, Rule>) -> Position {
    let (line, column) = pair.line_col();
    Position::new(line, column)
}

fn unexpected_rule(position: Position, rule: Rule) -> ParseError {
    ParseError::new(position, ParseErrorKind::UnexpectedRule(format!("{rule:?}")))
}

fn missing_token(position: Position, context: &'static str) -> ParseError {
    ParseError::new(position, ParseErrorKind::MissingToken(context))
}

fn duplicate(position: Position, qualified_name: String) -> ParseError {
    ParseError::new(position, ParseErrorKind::Duplicate(qualified_name))
}

fn next_pair<'a>(
    inner: &mut Pairs<'a, Rule>,
    position: Position,
    context: &'static str,
) -> Result<Pair<'a, Rule>, ParseError> {
    inner.next().ok_or_else(|| missing_token(position, context))
}

fn parse_entity_def(
    pair: Pair<'_, Rule>,
    errors: &mut Vec<ParseError>,
) -> Result<EntityStatement, ParseError> {
    let outer = position_of(&pair);
    let mut inner = pair.into_inner();
    next_pair(&mut inner, outer, "entity keyword")?;
    let name_pair = next_pair(&mut inner, outer, "entity name")?;

    let mut entity = EntityStatement {
        name: name_pair.as_str().to_string(),
        position: position_of(&name_pair),
        relations: Vec::new(),
        attributes: Vec::new(),
        permissions: Vec::new(),
        options: Vec::new(),
    };
    let mut seen_members = HashSet::new();

    for item in inner {
        match item.as_rule() {
            Rule::options => entity.options = parse_options(item),
            Rule::relation_def => {
                let relation = parse_relation_def(item)?;
                if !seen_members.insert(relation.name.clone()) {
                    errors.push(duplicate(
                        relation.position,
                        format!("{}#{}", entity.name, relation.name),
                    ));
                    continue;
                }
                entity.relations.push(relation);
            }
            Rule::attribute_def => {
                let Some(attribute) = parse_attribute_def(item, errors)? else {
                    continue;
                };
                if !seen_members.insert(attribute.name.clone()) {
                    errors.push(duplicate(
                        attribute.position,
                        format!("{}#{}", entity.name, attribute.name),
                    ));
                    continue;
                }
                entity.attributes.push(attribute);
            }
            Rule::permission_def => {
                let permission = parse_permission_def(item)?;
                if !seen_members.insert(permission.name.clone()) {
                    errors.push(duplicate(
                        permission.position,
                        format!("{}#{}", entity.name, permission.name),
                    ));
                    continue;
                }
                entity.permissions.push(permission);
            }
            other => return Err(unexpected_rule(position_of(&item), other)),
        }
    }

    Ok(entity)
}

fn parse_options(pair: Pair<'_, Rule>) -> Vec<String> {
    pair.into_inner().map(|p| p.as_str().to_string()).collect()
}

fn parse_relation_def(pair: Pair<'_, Rule>) -> Result<RelationStatement, ParseError> {
    let outer = position_of(&pair);
    let mut inner = pair.into_inner();
    next_pair(&mut inner, outer, "relation keyword")?;
    let name_pair = next_pair(&mut inner, outer, "relation name")?;

    let mut relation = RelationStatement {
        name: name_pair.as_str().to_string(),
        position: position_of(&name_pair),
        relation_types: Vec::new(),
        options: Vec::new(),
    };

    for item in inner {
        match item.as_rule() {
            Rule::relation_type => relation.relation_types.push(parse_relation_type(item)?),
            Rule::options => relation.options = parse_options(item),
            other => return Err(unexpected_rule(position_of(&item), other)),
        }
    }

    Ok(relation)
}

fn parse_relation_type(pair: Pair<'_, Rule>) -> Result<RelationTypeStatement, ParseError> {
    let position = position_of(&pair);
    let mut inner = pair.into_inner();
    let entity_type = next_pair(&mut inner, position, "relation type name")?
        .as_str()
        .to_string();
    let relation = inner.next().map(|p| p.as_str().to_string());

    Ok(RelationTypeStatement {
        entity_type,
        relation,
        position,
    })
}

fn parse_attribute_def(
    pair: Pair<'_, Rule>,
    errors: &mut Vec<ParseError>,
) -> Result<Option<AttributeStatement>, ParseError> {
    let outer = position_of(&pair);
    let mut inner = pair.into_inner();
    next_pair(&mut inner, outer, "attribute keyword")?;
    let name_pair = next_pair(&mut inner, outer, "attribute name")?;
    let type_pair = next_pair(&mut inner, outer, "attribute type")?;

    match parse_attribute_type(type_pair)? {
        Ok(attribute_type) => Ok(Some(AttributeStatement {
            name: name_pair.as_str().to_string(),
            position: position_of(&name_pair),
            attribute_type,
        })),
        Err(unsupported) => {
            errors.push(unsupported);
            Ok(None)
        }
    }
}

/// The outer error is structural; the inner one is an unknown type name that
/// the caller records and moves past.
fn parse_attribute_type(
    pair: Pair<'_, Rule>,
) -> Result<Result<AttributeType, ParseError>, ParseError> {
    let position = position_of(&pair);
    let mut inner = pair.into_inner();
    let base_name = next_pair(&mut inner, position, "attribute base type")?.as_str();
    let is_array = inner.next().is_some();

    Ok(match BaseAttributeType::from_name(base_name) {
        Some(base) => Ok(AttributeType { base, is_array }),
        None => Err(ParseError::new(
            position,
            ParseErrorKind::UnsupportedAttributeType(base_name.to_string()),
        )),
    })
}

fn parse_permission_def(pair: Pair<'_, Rule>) -> Result<PermissionStatement, ParseError> {
    let outer = position_of(&pair);
    let mut inner = pair.into_inner();
    let kind = match next_pair(&mut inner, outer, "permission keyword")?.as_str() {
        "action" => PermissionKind::Action,
        _ => PermissionKind::Permission,
    };
    let name_pair = next_pair(&mut inner, outer, "permission name")?;
    let expression = parse_expression(next_pair(&mut inner, outer, "permission expression")?)?;

    Ok(PermissionStatement {
        name: name_pair.as_str().to_string(),
        position: position_of(&name_pair),
        kind,
        expression,
    })
}

fn parse_expression(pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
    PRATT
        .map_primary(parse_primary)
        .map_prefix(|op, operand| {
            Ok(Expression::Prefix {
                position: position_of(&op),
                operand: Box::new(operand?),
            })
        })
        .map_infix(|left, op, right| {
            let operator = match op.as_rule() {
                Rule::and_op => InfixOperator::And,
                Rule::or_op => InfixOperator::Or,
                other => return Err(unexpected_rule(position_of(&op), other)),
            };
            Ok(Expression::Infix {
                operator,
                left: Box::new(left?),
                right: Box::new(right?),
            })
        })
        .parse(pair.into_inner())
}

fn parse_primary(pair: Pair<'_, Rule>) -> Result<Expression, ParseError> {
    match pair.as_rule() {
        Rule::path => Ok(Expression::Identifier(Identifier::parse(
            pair.as_str(),
            position_of(&pair),
        ))),
        Rule::call => parse_call(pair).map(Expression::Call),
        Rule::expression => parse_expression(pair),
        other => Err(unexpected_rule(position_of(&pair), other)),
    }
}

fn parse_call(pair: Pair<'_, Rule>) -> Result<Call, ParseError> {
    let position = position_of(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, position, "rule name")?
        .as_str()
        .to_string();
    let arguments = inner
        .map(|p| Identifier::parse(p.as_str(), position_of(&p)))
        .collect();

    Ok(Call {
        name,
        position,
        arguments,
    })
}

fn parse_rule_def(
    pair: Pair<'_, Rule>,
    errors: &mut Vec<ParseError>,
) -> Result<RuleStatement, ParseError> {
    let outer = position_of(&pair);
    let mut inner = pair.into_inner();
    next_pair(&mut inner, outer, "rule keyword")?;
    let name_pair = next_pair(&mut inner, outer, "rule name")?;
    let name = name_pair.as_str().to_string();

    let mut arguments = Vec::new();
    let mut seen_arguments = HashSet::new();
    let mut body = None;

    for item in inner {
        match item.as_rule() {
            Rule::rule_param => {
                let param_position = position_of(&item);
                let mut parts = item.into_inner();
                let arg_name = next_pair(&mut parts, param_position, "rule parameter name")?
                    .as_str()
                    .to_string();
                let type_pair = next_pair(&mut parts, param_position, "rule parameter type")?;
                let attribute_type = match parse_attribute_type(type_pair)? {
                    Ok(t) => t,
                    Err(unsupported) => {
                        errors.push(unsupported);
                        continue;
                    }
                };
                if !seen_arguments.insert(arg_name.clone()) {
                    errors.push(duplicate(param_position, format!("{name}#{arg_name}")));
                    continue;
                }
                arguments.push(RuleArgument {
                    name: arg_name,
                    attribute_type,
                });
            }
            Rule::rule_body => {
                let text = item
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().trim().to_string())
                    .unwrap_or_default();
                body = Some(text);
            }
            other => return Err(unexpected_rule(position_of(&item), other)),
        }
    }

    Ok(RuleStatement {
        name,
        position: position_of(&name_pair),
        arguments,
        body: body.ok_or_else(|| missing_token(outer, "rule body"))?,
    })
}
