use serde_json::Value as Json;

use crate::node::{AttrRef, CompareOp, Node, Rhs, SpatialOp, Source};

/// A malformed node or unknown operator, caught at compile time (ACL
/// create/update, manifest apply) and surfaced as 400 — never silently
/// permitted (§4.1 "Determinism").
#[derive(Debug, Clone, PartialEq)]
pub enum DslError {
    UnknownOp(String),
    MissingField { op: &'static str, field: &'static str },
    WrongType { field: &'static str, expected: &'static str },
    EmptyConditions(&'static str),
}

impl std::fmt::Display for DslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DslError::UnknownOp(op) => write!(f, "unknown DSL operator: {op:?}"),
            DslError::MissingField { op, field } => {
                write!(f, "op {op:?} is missing required field {field:?}")
            }
            DslError::WrongType { field, expected } => {
                write!(f, "field {field:?} must be {expected}")
            }
            DslError::EmptyConditions(op) => write!(f, "op {op:?} requires a non-empty conditions array"),
        }
    }
}

impl std::error::Error for DslError {}

/// Parse a JSON condition tree into a [`Node`]. An absent or `Json::Null`
/// tree is not a parse error here — callers treat "no condition" as the
/// literal `TRUE` at compile time (§4.1 "Empty/missing condition tree").
pub fn parse(value: &Json) -> Result<Node, DslError> {
    let obj = value
        .as_object()
        .ok_or_else(|| DslError::WrongType { field: "condition", expected: "a JSON object" })?;

    let op = obj
        .get("op")
        .and_then(Json::as_str)
        .ok_or(DslError::MissingField { op: "<root>", field: "op" })?;

    match op {
        "and" | "or" => {
            let children = parse_children(obj, op)?;
            if op == "and" {
                Ok(Node::And(children))
            } else {
                Ok(Node::Or(children))
            }
        }
        "not" => {
            let mut children = parse_children(obj, op)?;
            if children.len() != 1 {
                return Err(DslError::EmptyConditions("not"));
            }
            Ok(Node::Not(Box::new(children.remove(0))))
        }
        _ if CompareOp::parse(op).is_some() => {
            let lhs = parse_attr_ref(obj, op)?;
            let val = field(obj, op, "val")?;
            Ok(Node::Compare {
                op: CompareOp::parse(op).unwrap(),
                lhs,
                rhs: Rhs::from_json(val),
            })
        }
        "in" | "not_in" | "all" => {
            let lhs = parse_attr_ref(obj, op)?;
            let val = field(obj, op, "val")?;
            let values = val
                .as_array()
                .ok_or(DslError::WrongType { field: "val", expected: "a JSON array" })?
                .clone();
            Ok(match op {
                "in" => Node::In { lhs, values },
                "not_in" => Node::NotIn { lhs, values },
                _ => Node::All { lhs, values },
            })
        }
        _ if SpatialOp::parse(op).is_some() => {
            let lhs = parse_attr_ref(obj, op)?;
            let val = field(obj, op, "val")?;
            let distance = match SpatialOp::parse(op).unwrap() {
                SpatialOp::Dwithin => Some(
                    obj.get("args")
                        .and_then(Json::as_f64)
                        .ok_or(DslError::MissingField { op: "st_dwithin", field: "args" })?,
                ),
                _ => None,
            };
            Ok(Node::Spatial {
                op: SpatialOp::parse(op).unwrap(),
                lhs,
                rhs: Rhs::from_json(val),
                distance,
            })
        }
        other => Err(DslError::UnknownOp(other.to_string())),
    }
}

fn field<'a>(
    obj: &'a serde_json::Map<String, Json>,
    op: &str,
    name: &'static str,
) -> Result<&'a Json, DslError> {
    obj.get(name).ok_or(DslError::MissingField { op: leak(op), field: name })
}

/// The `op` string borrowed from the input only needs to live for the
/// duration of building the error value below; a tiny leak here would be
/// wrong, so errors carry an owned String for the op instead where it
/// matters (`UnknownOp`). `MissingField` is only ever constructed with a
/// `&'static str` op name picked from the match arms, so this never
/// actually leaks at runtime for DSL input coming from callers.
fn leak(op: &str) -> &'static str {
    match op {
        "and" => "and",
        "or" => "or",
        "not" => "not",
        "=" => "=",
        "!=" => "!=",
        "<" => "<",
        ">" => ">",
        "<=" => "<=",
        ">=" => ">=",
        "in" => "in",
        "not_in" => "not_in",
        "all" => "all",
        "st_dwithin" => "st_dwithin",
        "st_contains" => "st_contains",
        "st_within" => "st_within",
        "st_intersects" => "st_intersects",
        "st_covers" => "st_covers",
        _ => "<op>",
    }
}

fn parse_children(
    obj: &serde_json::Map<String, Json>,
    op: &str,
) -> Result<Vec<Node>, DslError> {
    let conditions = obj
        .get("conditions")
        .and_then(Json::as_array)
        .ok_or(DslError::MissingField { op: leak(op), field: "conditions" })?;
    if conditions.is_empty() {
        return Err(DslError::EmptyConditions(leak(op)));
    }
    conditions.iter().map(parse).collect()
}

fn parse_attr_ref(obj: &serde_json::Map<String, Json>, op: &str) -> Result<AttrRef, DslError> {
    let attr = obj
        .get("attr")
        .and_then(Json::as_str)
        .ok_or(DslError::MissingField { op: leak(op), field: "attr" })?
        .to_string();
    let source = Source::parse(obj.get("source").and_then(Json::as_str));
    Ok(AttrRef { source, attr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_simple_comparison() {
        let node = parse(&json!({"op": "<=", "source": "resource", "attr": "security_level", "val": "$principal.level"})).unwrap();
        assert!(matches!(node, Node::Compare { op: CompareOp::Le, .. }));
    }

    #[test]
    fn parses_and_or_recursively() {
        let node = parse(&json!({
            "op": "and",
            "conditions": [
                {"op": "=", "attr": "status", "val": "active"},
                {"op": "not", "conditions": [{"op": "=", "attr": "archived", "val": true}]}
            ]
        }))
        .unwrap();
        match node {
            Node::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], Node::Not(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = parse(&json!({"op": "frobnicate", "attr": "x", "val": 1})).unwrap_err();
        assert_eq!(err, DslError::UnknownOp("frobnicate".to_string()));
    }

    #[test]
    fn not_requires_exactly_one_child() {
        let err = parse(&json!({"op": "not", "conditions": []})).unwrap_err();
        assert_eq!(err, DslError::EmptyConditions("not"));
    }

    #[test]
    fn in_requires_array_value() {
        let err = parse(&json!({"op": "in", "attr": "role", "val": "not-an-array"})).unwrap_err();
        assert_eq!(err, DslError::WrongType { field: "val", expected: "a JSON array" });
    }

    #[test]
    fn st_dwithin_requires_args() {
        let err = parse(&json!({"op": "st_dwithin", "attr": "geometry", "val": [0.0, 0.0]})).unwrap_err();
        assert_eq!(err, DslError::MissingField { op: "st_dwithin", field: "args" });
    }

    #[test]
    fn spatial_op_without_distance_parses() {
        let node = parse(&json!({"op": "st_contains", "attr": "geometry", "val": [0.0, 0.0]})).unwrap();
        assert!(matches!(node, Node::Spatial { op: SpatialOp::Contains, distance: None, .. }));
    }
}
