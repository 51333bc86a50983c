use serde_json::Value as Json;

use crate::node::{AttrRef, Node, Rhs, Source};

/// The fixed projected SRID every geometry is normalized to on ingest and
/// every spatial predicate is evaluated in (§4.1, §9 "Geospatial").
pub const SRID: u32 = 3857;

/// The name of the bound context parameter referenced by compiled SQL.
/// Both realizations (the PL/pgSQL trigger function and this in-process
/// compiler) use the same name so the two stay textually comparable.
pub const CTX_PARAM: &str = "p_ctx";

/// Lower a [`Node`] tree into a SQL boolean expression string. Total over
/// the `Node` variants — there is no "unsupported node" case left once
/// parsing has succeeded (§9 "the fold over the variant is total").
pub fn compile(node: &Node) -> String {
    compile_with_ctx(node, CTX_PARAM)
}

/// Same as [`compile`] but lets the caller pick the context parameter name,
/// used by [`crate::pg_function_sql`] to keep the stored-routine realization
/// textually parallel to this one.
pub fn compile_with_ctx(node: &Node, ctx: &str) -> String {
    match node {
        Node::And(children) => join(children, " AND ", ctx),
        Node::Or(children) => join(children, " OR ", ctx),
        Node::Not(child) => format!("(NOT {})", compile_with_ctx(child, ctx)),
        Node::Compare { op, lhs, rhs } => compile_compare(op.as_sql(), lhs, rhs, ctx),
        Node::In { lhs, values } => compile_in(lhs, values, ctx, false),
        Node::NotIn { lhs, values } => compile_in(lhs, values, ctx, true),
        Node::All { lhs, values } => compile_all(lhs, values, ctx),
        Node::Spatial { op, lhs, rhs, distance } => compile_spatial(*op, lhs, rhs, *distance, ctx),
    }
}

/// `compile(None) = "TRUE"` — an empty/missing condition tree grants
/// unconditionally (§4.1 "Composition").
pub fn compile_optional(node: Option<&Node>) -> String {
    match node {
        Some(node) => compile(node),
        None => "TRUE".to_string(),
    }
}

fn join(children: &[Node], sep: &str, ctx: &str) -> String {
    let parts: Vec<String> = children.iter().map(|c| compile_with_ctx(c, ctx)).collect();
    format!("({})", parts.join(sep))
}

fn lhs_expr(attr: &AttrRef, ctx: &str) -> String {
    match attr.source {
        Source::Resource if attr.attr == "geometry" => "resource.geometry".to_string(),
        Source::Resource => format!("resource.attributes->>{}", quote_literal(&attr.attr)),
        Source::Principal => format!("{ctx}->'principal'->>{}", quote_literal(&attr.attr)),
        Source::Context => format!("{ctx}->'context'->>{}", quote_literal(&attr.attr)),
    }
}

/// JSON (not text) extract of `attr`, used where the value needs to retain
/// array/object structure (e.g. the `all` operator's LHS).
fn lhs_expr_jsonb(attr: &AttrRef, ctx: &str) -> String {
    match attr.source {
        Source::Resource => format!("resource.attributes->{}", quote_literal(&attr.attr)),
        Source::Principal => format!("{ctx}->'principal'->{}", quote_literal(&attr.attr)),
        Source::Context => format!("{ctx}->'context'->{}", quote_literal(&attr.attr)),
    }
}

fn rhs_expr(rhs: &Rhs, ctx: &str) -> String {
    match rhs {
        Rhs::Ref(attr) => lhs_expr(attr, ctx),
        Rhs::Literal(val) => quote_literal(&json_text(val)),
    }
}

/// The JSON type of a literal drives the cast applied to both sides of a
/// non-spatial comparison (§4.1 "Typing"). A `Ref` RHS has no literal type
/// of its own; it is compared as text, matching the reference compiler's
/// behavior of casting both sides identically off of `val`'s static type.
fn cast_suffix(rhs: &Rhs) -> &'static str {
    match rhs {
        Rhs::Literal(Json::Number(_)) => "::numeric",
        Rhs::Literal(Json::Bool(_)) => "::boolean",
        _ => "",
    }
}

fn compile_compare(op_sql: &str, lhs: &AttrRef, rhs: &Rhs, ctx: &str) -> String {
    let cast = cast_suffix(rhs);
    let lhs_sql = format!("({}){}", lhs_expr(lhs, ctx), cast);
    let rhs_sql = format!("({}){}", rhs_expr(rhs, ctx), cast);
    format!("{lhs_sql} {op_sql} {rhs_sql}")
}

/// `in`/`not_in` lower to `LHS = ANY(ARRAY(SELECT jsonb_array_elements_text(<literal array>)))`.
fn compile_in(lhs: &AttrRef, values: &[Json], ctx: &str, negate: bool) -> String {
    let lhs_sql = lhs_expr(lhs, ctx);
    let array_json = Json::Array(values.to_vec());
    let membership = format!(
        "({lhs_sql}) = ANY(ARRAY(SELECT jsonb_array_elements_text({}::jsonb)))",
        quote_literal(&array_json.to_string())
    );
    if negate {
        format!("(NOT {membership})")
    } else {
        membership
    }
}

/// `all` (subset containment): the literal array must be contained in the
/// JSON array stored at `lhs`. Decided here (§9 open question 3) as: the
/// left side is a JSON array, compared with jsonb's `@>` containment
/// operator rather than treated as a delimited string.
fn compile_all(lhs: &AttrRef, values: &[Json], ctx: &str) -> String {
    let lhs_sql = lhs_expr_jsonb(lhs, ctx);
    let array_json = Json::Array(values.to_vec());
    format!(
        "(({lhs_sql})::jsonb @> {}::jsonb)",
        quote_literal(&array_json.to_string())
    )
}

/// The RHS of a spatial predicate, in WKT text. A `Ref` (`$context.*` /
/// `$principal.*`) is assumed to already hold WKT/EWKT text at evaluation
/// time and is passed through as a JSON extract; a literal is converted
/// from its JSON shape (`[lng, lat]` pair or GeoJSON object) the same way
/// [`crate`]'s callers normalize geometry on ingest, since an ACL author
/// may embed a coordinate literal directly in the condition tree rather
/// than referencing the caller-supplied context.
fn spatial_rhs_expr(rhs: &Rhs, ctx: &str) -> String {
    match rhs {
        Rhs::Ref(attr) => lhs_expr(attr, ctx),
        Rhs::Literal(val) => quote_literal(&geometry_literal_to_wkt(val)),
    }
}

fn geometry_literal_to_wkt(val: &Json) -> String {
    if let Some(arr) = val.as_array() {
        if arr.len() == 2 && arr[0].is_number() && arr[1].is_number() {
            return format!("POINT({} {})", arr[0], arr[1]);
        }
    }
    if let Some(s) = val.as_str() {
        return s.to_string();
    }
    if let Some(obj) = val.as_object() {
        if obj.get("type").and_then(Json::as_str) == Some("Point") {
            if let Some(c) = obj.get("coordinates").and_then(Json::as_array) {
                if c.len() == 2 {
                    return format!("POINT({} {})", c[0], c[1]);
                }
            }
        }
    }
    json_text(val)
}

fn compile_spatial(
    op: crate::node::SpatialOp,
    lhs: &AttrRef,
    rhs: &Rhs,
    distance: Option<f64>,
    ctx: &str,
) -> String {
    let lhs_raw = lhs_expr(lhs, ctx);
    let lhs_sql = if lhs_raw == "resource.geometry" {
        lhs_raw
    } else {
        format!("ST_GeomFromText({lhs_raw}, {SRID})")
    };
    let rhs_sql = format!("ST_GeomFromText({}, {SRID})", spatial_rhs_expr(rhs, ctx));

    match op {
        crate::node::SpatialOp::Dwithin => {
            let distance = distance.unwrap_or(0.0);
            format!("ST_DWithin({lhs_sql}, {rhs_sql}, {distance})")
        }
        other => format!("{}({lhs_sql}, {rhs_sql})", other.as_sql_fn()),
    }
}

/// Escape a JSON value down to its raw text representation the way
/// `jsonb #>> '{}'` does: strings unwrap their quotes, everything else
/// renders as its JSON text form.
fn json_text(val: &Json) -> String {
    match val {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SQL string-literal quoting (doubles embedded single quotes). Used for
/// every identifier and literal the compiler emits — there is no
/// identifier-quoting path because JSON key names are always passed through
/// the `->>`/`->` operators as string literals, never as SQL identifiers.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use serde_json::json;

    fn compile_json(value: Json) -> String {
        compile(&parse(&value).unwrap())
    }

    #[test]
    fn and_or_not_composition_laws() {
        let and = compile_json(json!({"op": "and", "conditions": [
            {"op": "=", "attr": "a", "val": 1},
            {"op": "=", "attr": "b", "val": 2},
        ]}));
        assert!(and.starts_with('(') && and.contains(" AND ") && and.ends_with(')'));

        let or = compile_json(json!({"op": "or", "conditions": [
            {"op": "=", "attr": "a", "val": 1},
            {"op": "=", "attr": "b", "val": 2},
        ]}));
        assert!(or.contains(" OR "));

        let not = compile_json(json!({"op": "not", "conditions": [{"op": "=", "attr": "a", "val": 1}]}));
        assert!(not.starts_with("(NOT ") && not.ends_with(')'));
    }

    #[test]
    fn resource_attr_uses_text_extract() {
        let sql = compile_json(json!({"op": "=", "attr": "status", "val": "active"}));
        assert!(sql.contains("resource.attributes->>'status'"));
        assert!(sql.contains("'active'"));
    }

    #[test]
    fn geometry_attr_is_bare_column() {
        let sql = compile_json(json!({"op": "st_contains", "attr": "geometry", "val": [0.0, 0.0]}));
        assert!(sql.starts_with("ST_Contains(resource.geometry,"));
    }

    #[test]
    fn numeric_literal_gets_numeric_cast() {
        let sql = compile_json(json!({"op": "<=", "attr": "security_level", "val": 5}));
        assert!(sql.contains("::numeric"));
    }

    #[test]
    fn principal_placeholder_rewrites_to_context_extract() {
        let sql = compile_json(json!({"op": "<=", "source": "resource", "attr": "security_level", "val": "$principal.level"}));
        assert!(sql.contains("p_ctx->'principal'->>'level'"));
    }

    #[test]
    fn context_placeholder_rewrites_to_context_extract() {
        let sql = compile_json(json!({"op": "=", "attr": "x", "val": "$context.region"}));
        assert!(sql.contains("p_ctx->'context'->>'region'"));
    }

    #[test]
    fn in_lowers_to_any_array_membership() {
        let sql = compile_json(json!({"op": "in", "attr": "role", "val": ["viewer", "editor"]}));
        assert!(sql.contains("= ANY(ARRAY(SELECT jsonb_array_elements_text("));
    }

    #[test]
    fn not_in_negates_membership() {
        let sql = compile_json(json!({"op": "not_in", "attr": "role", "val": ["banned"]}));
        assert!(sql.starts_with("(NOT "));
    }

    #[test]
    fn all_lowers_to_jsonb_containment() {
        let sql = compile_json(json!({"op": "all", "attr": "tags", "val": ["a", "b"]}));
        assert!(sql.contains("@>"));
    }

    #[test]
    fn dwithin_appends_distance_argument() {
        let sql = compile_json(json!({"op": "st_dwithin", "attr": "geometry", "val": [0.0, 0.0], "args": 5000}));
        assert!(sql.starts_with("ST_DWithin(resource.geometry,"));
        assert!(sql.ends_with(", 5000)"));
    }

    #[test]
    fn spatial_coordinate_pair_literal_lowers_to_point_wkt() {
        let sql = compile_json(json!({"op": "st_contains", "attr": "geometry", "val": [1.5, -2.5]}));
        assert!(sql.contains("'POINT(1.5 -2.5)'"));
    }

    #[test]
    fn non_geometry_spatial_lhs_is_wrapped() {
        let sql = compile_json(json!({"op": "st_within", "source": "context", "attr": "location", "val": [0.0, 0.0]}));
        assert!(sql.starts_with("ST_Within(ST_GeomFromText("));
    }

    #[test]
    fn empty_condition_tree_compiles_to_true() {
        assert_eq!(compile_optional(None), "TRUE");
    }

    #[test]
    fn literal_quoting_escapes_single_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
