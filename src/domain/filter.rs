//! Filter expression trees with deferred time-bucket resolution.
//!
//! A tree built from a client payload keeps symbolic placeholders (the
//! current-time-bucket token) unresolved, so it can be echoed back to the
//! client exactly as supplied. Execution works on a resolved structural
//! copy produced by [`FilterNode::resolved`].

use serde_json::{Value as Json, json};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::clock;

/// Wire token of the current-time-bucket placeholder. Kept verbatim,
/// including its historical spelling, for compatibility with existing
/// clients.
pub const BUCKET_TOKEN: &str = "@nowHourQuater()";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("filter node must be a JSON object")]
    NotAnObject,
    #[error("filter node needs either `Attribute` or `Children`")]
    UnknownShape,
    #[error("`Attribute` must be a string")]
    AttributeNotText,
    #[error("unsupported comparison operator `{operator}`")]
    UnknownCompareOperator { operator: String },
    #[error("unsupported group operator `{operator}`")]
    UnknownGroupOperator { operator: String },
    #[error("`Children` of a group must be an array")]
    ChildrenNotArray,
    #[error("comparison on `{attribute}` needs a value")]
    MissingValue { attribute: String },
    #[error("value of `{attribute}` must be a string, number, or boolean")]
    UnsupportedValue { attribute: String },
    #[error("sort rules must be an array of objects")]
    SortNotArray,
    #[error("sort rule needs an `Attribute` string")]
    SortMissingAttribute,
    #[error("unsupported sort mode `{mode}`")]
    UnknownSortMode { mode: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Equals => "Equals",
            CompareOp::NotEquals => "NotEquals",
            CompareOp::LessThan => "LessThan",
            CompareOp::LessOrEqual => "LessOrEqual",
            CompareOp::Greater => "Greater",
            CompareOp::GreaterOrEqual => "GreaterOrEqual",
            CompareOp::Contains => "Contains",
            CompareOp::StartsWith => "StartsWith",
            CompareOp::EndsWith => "EndsWith",
            CompareOp::IsNull => "IsNull",
            CompareOp::IsNotNull => "IsNotNull",
            CompareOp::IsEmpty => "IsEmpty",
            CompareOp::IsNotEmpty => "IsNotEmpty",
        }
    }

    /// Whether the operator compares against a value. The null/empty
    /// probes carry none.
    pub fn requires_value(self) -> bool {
        !matches!(
            self,
            CompareOp::IsNull | CompareOp::IsNotNull | CompareOp::IsEmpty | CompareOp::IsNotEmpty
        )
    }
}

impl TryFrom<&str> for CompareOp {
    type Error = ();

    /// Accepts the long-form aliases older clients send for the ordered
    /// comparisons.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Equals" => Ok(CompareOp::Equals),
            "NotEquals" => Ok(CompareOp::NotEquals),
            "LessThan" => Ok(CompareOp::LessThan),
            "LessOrEqual" | "LessThanOrEquals" => Ok(CompareOp::LessOrEqual),
            "Greater" => Ok(CompareOp::Greater),
            "GreaterOrEqual" | "GreaterOrEquals" => Ok(CompareOp::GreaterOrEqual),
            "Contains" => Ok(CompareOp::Contains),
            "StartsWith" => Ok(CompareOp::StartsWith),
            "EndsWith" => Ok(CompareOp::EndsWith),
            "IsNull" => Ok(CompareOp::IsNull),
            "IsNotNull" => Ok(CompareOp::IsNotNull),
            "IsEmpty" => Ok(CompareOp::IsEmpty),
            "IsNotEmpty" => Ok(CompareOp::IsNotEmpty),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOp {
    And,
    Or,
}

impl GroupOp {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupOp::And => "And",
            GroupOp::Or => "Or",
        }
    }
}

impl TryFrom<&str> for GroupOp {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "And" => Ok(GroupOp::And),
            "Or" => Ok(GroupOp::Or),
            _ => Err(()),
        }
    }
}

/// Symbolic values substituted at query-resolution time rather than at
/// tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    CurrentTimeBucket,
}

impl Placeholder {
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::CurrentTimeBucket => BUCKET_TOKEN,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        (token == BUCKET_TOKEN).then_some(Placeholder::CurrentTimeBucket)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Time(OffsetDateTime),
    Placeholder(Placeholder),
}

impl FilterValue {
    pub fn text(value: impl Into<String>) -> Self {
        FilterValue::Text(value.into())
    }

    pub fn bucket() -> Self {
        FilterValue::Placeholder(Placeholder::CurrentTimeBucket)
    }

    /// Client values arrive as JSON scalars. A string matching a
    /// registered placeholder token becomes symbolic; an RFC 3339 string
    /// becomes a timestamp; everything else (including unregistered
    /// `@name()` shapes, kept for forward compatibility) stays text.
    fn from_json(attribute: &str, value: &Json) -> Result<Self, FilterParseError> {
        match value {
            Json::String(text) => {
                if let Some(placeholder) = Placeholder::from_token(text) {
                    Ok(FilterValue::Placeholder(placeholder))
                } else if let Ok(timestamp) = OffsetDateTime::parse(text, &Rfc3339) {
                    Ok(FilterValue::Time(timestamp))
                } else {
                    Ok(FilterValue::Text(text.clone()))
                }
            }
            Json::Number(number) => Ok(FilterValue::Text(number.to_string())),
            Json::Bool(flag) => Ok(FilterValue::Text(flag.to_string())),
            _ => Err(FilterParseError::UnsupportedValue {
                attribute: attribute.to_owned(),
            }),
        }
    }

    fn to_client_json(&self) -> Json {
        match self {
            FilterValue::Text(text) => Json::String(text.clone()),
            FilterValue::Time(timestamp) => Json::String(clock::rfc3339(*timestamp)),
            FilterValue::Placeholder(placeholder) => Json::String(placeholder.token().to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Leaf {
        attribute: String,
        operator: CompareOp,
        value: Option<FilterValue>,
    },
    Group {
        operator: GroupOp,
        children: Vec<FilterNode>,
    },
}

impl FilterNode {
    pub fn leaf(attribute: impl Into<String>, operator: CompareOp, value: Option<FilterValue>) -> Self {
        FilterNode::Leaf {
            attribute: attribute.into(),
            operator,
            value,
        }
    }

    pub fn equals(attribute: impl Into<String>, value: FilterValue) -> Self {
        Self::leaf(attribute, CompareOp::Equals, Some(value))
    }

    pub fn is_null(attribute: impl Into<String>) -> Self {
        Self::leaf(attribute, CompareOp::IsNull, None)
    }

    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Group {
            operator: GroupOp::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Group {
            operator: GroupOp::Or,
            children,
        }
    }

    /// Parses a client filter payload. A node with `Children` is a group
    /// (operator defaults to `And`); a node with `Attribute` is a leaf
    /// (operator defaults to `Equals`).
    pub fn from_json(payload: &Json) -> Result<FilterNode, FilterParseError> {
        let object = payload.as_object().ok_or(FilterParseError::NotAnObject)?;

        if let Some(children_json) = object.get("Children") {
            let operator = match object.get("Operator").and_then(Json::as_str) {
                None => GroupOp::And,
                Some(name) => {
                    GroupOp::try_from(name).map_err(|_| FilterParseError::UnknownGroupOperator {
                        operator: name.to_owned(),
                    })?
                }
            };
            let children = children_json
                .as_array()
                .ok_or(FilterParseError::ChildrenNotArray)?
                .iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(FilterNode::Group { operator, children });
        }

        if let Some(attribute_json) = object.get("Attribute") {
            let attribute = attribute_json
                .as_str()
                .ok_or(FilterParseError::AttributeNotText)?
                .to_owned();
            let operator = match object.get("Operator").and_then(Json::as_str) {
                None => CompareOp::Equals,
                Some(name) => {
                    CompareOp::try_from(name).map_err(|_| FilterParseError::UnknownCompareOperator {
                        operator: name.to_owned(),
                    })?
                }
            };
            let value = match object.get("Value") {
                None | Some(Json::Null) => None,
                Some(value_json) => Some(FilterValue::from_json(&attribute, value_json)?),
            };
            if operator.requires_value() && value.is_none() {
                return Err(FilterParseError::MissingValue { attribute });
            }
            return Ok(FilterNode::Leaf {
                attribute,
                operator,
                value,
            });
        }

        Err(FilterParseError::UnknownShape)
    }

    /// Structural copy with every placeholder substituted through
    /// `resolve`. The receiver is left untouched so the symbolic form
    /// survives for the client echo.
    pub fn resolved<F>(&self, resolve: F) -> FilterNode
    where
        F: Fn(Placeholder) -> FilterValue + Copy,
    {
        match self {
            FilterNode::Leaf {
                attribute,
                operator,
                value,
            } => FilterNode::Leaf {
                attribute: attribute.clone(),
                operator: *operator,
                value: value.as_ref().map(|value| match value {
                    FilterValue::Placeholder(placeholder) => resolve(*placeholder),
                    other => other.clone(),
                }),
            },
            FilterNode::Group { operator, children } => FilterNode::Group {
                operator: *operator,
                children: children.iter().map(|child| child.resolved(resolve)).collect(),
            },
        }
    }

    /// First direct-child leaf on `attribute` (name compared without
    /// case); a leaf root matches itself. Nested groups are not searched.
    pub fn direct_leaf(&self, attribute: &str) -> Option<&FilterNode> {
        let matches = |node: &FilterNode| match node {
            FilterNode::Leaf {
                attribute: name, ..
            } => name.eq_ignore_ascii_case(attribute),
            FilterNode::Group { .. } => false,
        };
        match self {
            FilterNode::Leaf { .. } if matches(self) => Some(self),
            FilterNode::Leaf { .. } => None,
            FilterNode::Group { children, .. } => children.iter().find(|child| matches(child)),
        }
    }

    /// Client-facing serialization in symbolic form. A free-text query is
    /// folded into the root object so the echo carries the whole listing
    /// expression.
    pub fn to_client_json(&self, query: Option<&str>) -> Json {
        let mut json = self.to_symbolic_json();
        if let (Json::Object(object), Some(query)) = (&mut json, query) {
            object.insert("Query".to_owned(), Json::String(query.to_owned()));
        }
        json
    }

    fn to_symbolic_json(&self) -> Json {
        match self {
            FilterNode::Leaf {
                attribute,
                operator,
                value,
            } => json!({
                "Attribute": attribute,
                "Operator": operator.as_str(),
                "Value": value.as_ref().map(FilterValue::to_client_json),
            }),
            FilterNode::Group { operator, children } => json!({
                "Operator": operator.as_str(),
                "Children": children
                    .iter()
                    .map(FilterNode::to_symbolic_json)
                    .collect::<Vec<_>>(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "Ascending",
            SortDirection::Descending => "Descending",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortRule {
    pub attribute: String,
    pub direction: SortDirection,
}

impl SortRule {
    pub fn ascending(attribute: impl Into<String>) -> Self {
        SortRule {
            attribute: attribute.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(attribute: impl Into<String>) -> Self {
        SortRule {
            attribute: attribute.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Parses a client sort payload: an array of `{Attribute, Mode}` objects,
/// `Mode` defaulting to ascending.
pub fn sort_from_json(payload: &Json) -> Result<Vec<SortRule>, FilterParseError> {
    let rules = payload.as_array().ok_or(FilterParseError::SortNotArray)?;
    rules
        .iter()
        .map(|rule| {
            let object = rule.as_object().ok_or(FilterParseError::SortNotArray)?;
            let attribute = object
                .get("Attribute")
                .and_then(Json::as_str)
                .ok_or(FilterParseError::SortMissingAttribute)?
                .to_owned();
            let direction = match object.get("Mode").and_then(Json::as_str) {
                None => SortDirection::Ascending,
                Some("Ascending") => SortDirection::Ascending,
                Some("Descending") => SortDirection::Descending,
                Some(mode) => {
                    return Err(FilterParseError::UnknownSortMode {
                        mode: mode.to_owned(),
                    });
                }
            };
            Ok(SortRule {
                attribute,
                direction,
            })
        })
        .collect()
}

pub fn sort_to_client_json(rules: &[SortRule]) -> Json {
    Json::Array(
        rules
            .iter()
            .map(|rule| {
                json!({
                    "Attribute": rule.attribute,
                    "Mode": rule.direction.as_str(),
                })
            })
            .collect(),
    )
}
