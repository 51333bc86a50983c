use serde_json::Value as Json;

/// Where an LHS or an un-prefixed RHS attribute is read from (§4.1 "LHS
/// resolution"). Defaults to `Resource` when a leaf node omits `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Resource,
    Principal,
    Context,
}

impl Source {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("principal") => Source::Principal,
            Some("context") => Source::Context,
            _ => Source::Resource,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }

    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "=" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            ">" => CompareOp::Gt,
            "<=" => CompareOp::Le,
            ">=" => CompareOp::Ge,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOp {
    Dwithin,
    Contains,
    Within,
    Intersects,
    Covers,
}

impl SpatialOp {
    /// The lower-case PostGIS function name this op lowers to (`st_dwithin`
    /// takes a third distance argument; the rest are two-argument predicates).
    pub fn as_sql_fn(self) -> &'static str {
        match self {
            SpatialOp::Dwithin => "ST_DWithin",
            SpatialOp::Contains => "ST_Contains",
            SpatialOp::Within => "ST_Within",
            SpatialOp::Intersects => "ST_Intersects",
            SpatialOp::Covers => "ST_Covers",
        }
    }

    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "st_dwithin" => SpatialOp::Dwithin,
            "st_contains" => SpatialOp::Contains,
            "st_within" => SpatialOp::Within,
            "st_intersects" => SpatialOp::Intersects,
            "st_covers" => SpatialOp::Covers,
            _ => return None,
        })
    }
}

/// A leaf attribute reference, resolved either against the resource row or
/// against the bound `p_ctx` parameter's `principal`/`context` sub-object.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrRef {
    pub source: Source,
    pub attr: String,
}

/// The right-hand side of a leaf node: either a literal JSON scalar/array, or
/// a `$principal.*` / `$context.*` reference rewritten to the same JSON
/// extract shape as an LHS attribute (§4.1 "RHS resolution").
#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    Literal(Json),
    Ref(AttrRef),
}

impl Rhs {
    pub fn from_json(val: &Json) -> Self {
        if let Some(s) = val.as_str() {
            if let Some(rest) = s.strip_prefix("$principal.") {
                return Rhs::Ref(AttrRef {
                    source: Source::Principal,
                    attr: rest.to_string(),
                });
            }
            if let Some(rest) = s.strip_prefix("$context.") {
                return Rhs::Ref(AttrRef {
                    source: Source::Context,
                    attr: rest.to_string(),
                });
            }
        }
        Rhs::Literal(val.clone())
    }
}

/// The algebraic condition tree (§9 "DSL evaluation"). Parsing rejects
/// unknown operators at the boundary; the fold over this type in
/// [`crate::compile`] is total.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Compare { op: CompareOp, lhs: AttrRef, rhs: Rhs },
    In { lhs: AttrRef, values: Vec<Json> },
    NotIn { lhs: AttrRef, values: Vec<Json> },
    /// Subset containment: `values` (a JSON array) must be a subset of the
    /// JSON array stored at `lhs` (§9 open question 3 — this implementation
    /// treats the left side as a JSON array, never a delimited string).
    All { lhs: AttrRef, values: Vec<Json> },
    Spatial {
        op: SpatialOp,
        lhs: AttrRef,
        rhs: Rhs,
        /// Distance argument for `st_dwithin`, in SRID units (meters at SRID 3857).
        distance: Option<f64>,
    },
}
