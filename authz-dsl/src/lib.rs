//! The condition compiler: parses the JSON condition DSL into an algebraic
//! [`node::Node`] tree and lowers it into a parameterized SQL predicate
//! fragment (§4.1).
//!
//! This crate deliberately has no database dependency — it is the
//! in-process realization of the compiler, tested against the same
//! fixtures as the PL/pgSQL trigger-function realization embedded by the
//! storage layer via [`pg_function_sql`]. The two must never diverge in
//! semantics; a change to one of `compile::compile` or `pg_function_sql`
//! without the matching change to the other is a regression.

pub mod compile;
pub mod node;
pub mod parse;

pub use compile::{compile, compile_optional, compile_with_ctx, quote_literal, CTX_PARAM, SRID};
pub use node::{AttrRef, CompareOp, Node, Rhs, Source, SpatialOp};
pub use parse::{parse, DslError};

/// The canonical PL/pgSQL source of `compile_condition_to_sql(cond jsonb,
/// ctx_var text)`, embedded verbatim into the storage layer's migrations so
/// the ACL trigger function and this crate's [`compile`] stay two
/// realizations of one algorithm rather than two algorithms that happen to
/// agree today.
///
/// Corrected, relative to the historical reference this was distilled
/// from, in two respects the reference function left incomplete: `not` is
/// implemented (the reference only recursed on `and`/`or`), and `all` lowers
/// to jsonb `@>` containment rather than falling through to the
/// comparison-operator path.
pub fn pg_function_sql() -> &'static str {
    r#"
CREATE OR REPLACE FUNCTION compile_condition_to_sql(cond jsonb, ctx_var text)
RETURNS text AS $$
DECLARE
    op text := cond->>'op';
    src text := coalesce(cond->>'source', 'resource');
    attr text := cond->>'attr';
    lhs text;
    rhs text;
    cast_suffix text := '';
    child jsonb;
    parts text[] := ARRAY[]::text[];
    val jsonb := cond->'val';
BEGIN
    IF op = 'and' OR op = 'or' THEN
        FOR child IN SELECT * FROM jsonb_array_elements(cond->'conditions')
        LOOP
            parts := parts || compile_condition_to_sql(child, ctx_var);
        END LOOP;
        IF op = 'and' THEN
            RETURN '(' || array_to_string(parts, ' AND ') || ')';
        ELSE
            RETURN '(' || array_to_string(parts, ' OR ') || ')';
        END IF;
    END IF;

    IF op = 'not' THEN
        child := cond->'conditions'->0;
        RETURN '(NOT ' || compile_condition_to_sql(child, ctx_var) || ')';
    END IF;

    -- LHS resolution
    IF src = 'resource' AND attr = 'geometry' THEN
        lhs := 'resource.geometry';
    ELSIF src = 'resource' THEN
        lhs := 'resource.attributes->>' || quote_literal(attr);
    ELSIF src = 'principal' THEN
        lhs := ctx_var || '->''principal''->>' || quote_literal(attr);
    ELSE
        lhs := ctx_var || '->''context''->>' || quote_literal(attr);
    END IF;

    IF op IN ('st_dwithin', 'st_contains', 'st_within', 'st_intersects', 'st_covers') THEN
        rhs := 'ST_GeomFromText(' || resolve_spatial_rhs(val, ctx_var) || ', 3857)';
        IF lhs != 'resource.geometry' THEN
            lhs := 'ST_GeomFromText(' || lhs || ', 3857)';
        END IF;
        IF op = 'st_dwithin' THEN
            RETURN 'ST_DWithin(' || lhs || ', ' || rhs || ', ' || (cond->>'args') || ')';
        ELSIF op = 'st_contains' THEN
            RETURN 'ST_Contains(' || lhs || ', ' || rhs || ')';
        ELSIF op = 'st_within' THEN
            RETURN 'ST_Within(' || lhs || ', ' || rhs || ')';
        ELSIF op = 'st_intersects' THEN
            RETURN 'ST_Intersects(' || lhs || ', ' || rhs || ')';
        ELSE
            RETURN 'ST_Covers(' || lhs || ', ' || rhs || ')';
        END IF;
    END IF;

    IF op = 'in' OR op = 'not_in' THEN
        rhs := '(SELECT jsonb_array_elements_text(' || quote_literal(val::text) || '::jsonb))';
        IF op = 'in' THEN
            RETURN '(' || lhs || ') = ANY(ARRAY' || rhs || ')';
        ELSE
            RETURN '(NOT (' || lhs || ') = ANY(ARRAY' || rhs || '))';
        END IF;
    END IF;

    IF op = 'all' THEN
        IF src = 'resource' THEN
            lhs := 'resource.attributes->' || quote_literal(attr);
        ELSIF src = 'principal' THEN
            lhs := ctx_var || '->''principal''->' || quote_literal(attr);
        ELSE
            lhs := ctx_var || '->''context''->' || quote_literal(attr);
        END IF;
        RETURN '((' || lhs || ')::jsonb @> ' || quote_literal(val::text) || '::jsonb)';
    END IF;

    -- comparison operators
    IF jsonb_typeof(val) = 'number' THEN
        cast_suffix := '::numeric';
    ELSIF jsonb_typeof(val) = 'boolean' THEN
        cast_suffix := '::boolean';
    END IF;
    rhs := resolve_rhs(val, ctx_var);
    RETURN '(' || lhs || ')' || cast_suffix || ' ' || op || ' (' || rhs || ')' || cast_suffix;
END;
$$ LANGUAGE plpgsql IMMUTABLE;

-- A spatial predicate's RHS: a $context./$principal. reference is assumed to
-- already hold WKT/EWKT text at evaluation time (resolved like any other
-- reference); a literal coordinate pair or GeoJSON Point is converted to
-- WKT so an ACL author can embed a geometry literal directly in the
-- condition tree instead of only via the caller-supplied context.
CREATE OR REPLACE FUNCTION resolve_spatial_rhs(val jsonb, ctx_var text)
RETURNS text AS $$
DECLARE
    text_val text;
BEGIN
    IF jsonb_typeof(val) = 'string' THEN
        text_val := val#>>'{}';
        IF text_val LIKE '$principal.%' THEN
            RETURN ctx_var || '->''principal''->>' || quote_literal(substring(text_val from 12));
        ELSIF text_val LIKE '$context.%' THEN
            RETURN ctx_var || '->''context''->>' || quote_literal(substring(text_val from 10));
        END IF;
        RETURN quote_literal(text_val);
    ELSIF jsonb_typeof(val) = 'array' AND jsonb_array_length(val) = 2
          AND jsonb_typeof(val->0) = 'number' AND jsonb_typeof(val->1) = 'number' THEN
        RETURN quote_literal('POINT(' || (val->>0) || ' ' || (val->>1) || ')');
    ELSIF jsonb_typeof(val) = 'object' AND val->>'type' = 'Point' THEN
        RETURN quote_literal('POINT(' || (val->'coordinates'->>0) || ' ' || (val->'coordinates'->>1) || ')');
    END IF;
    RETURN quote_literal(val#>>'{}');
END;
$$ LANGUAGE plpgsql IMMUTABLE;

CREATE OR REPLACE FUNCTION resolve_rhs(val jsonb, ctx_var text)
RETURNS text AS $$
DECLARE
    text_val text;
BEGIN
    IF jsonb_typeof(val) = 'string' THEN
        text_val := val#>>'{}';
        IF text_val LIKE '$principal.%' THEN
            RETURN ctx_var || '->''principal''->>' || quote_literal(substring(text_val from 12));
        ELSIF text_val LIKE '$context.%' THEN
            RETURN ctx_var || '->''context''->>' || quote_literal(substring(text_val from 10));
        END IF;
        RETURN quote_literal(text_val);
    END IF;
    RETURN quote_literal(val#>>'{}');
END;
$$ LANGUAGE plpgsql IMMUTABLE;
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pg_function_sql_defines_both_routines() {
        let sql = pg_function_sql();
        assert!(sql.contains("FUNCTION compile_condition_to_sql"));
        assert!(sql.contains("FUNCTION resolve_rhs"));
        assert!(sql.contains("IF op = 'not' THEN"));
        assert!(sql.contains("IF op = 'all' THEN"));
    }

    #[test]
    fn full_parse_then_compile_round_trip() {
        let tree = parse(&serde_json::json!({
            "op": "and",
            "conditions": [
                {"op": "=", "attr": "status", "val": "active"},
                {"op": "st_dwithin", "attr": "geometry", "val": [0.0, 0.0], "args": 1000},
            ]
        }))
        .unwrap();
        let sql = compile(&tree);
        assert!(sql.contains(" AND "));
        assert!(sql.contains("ST_DWithin"));
    }
}
