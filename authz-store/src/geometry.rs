//! Geometry input normalization (§3 "geometry", §9 "Geospatial").
//!
//! Accepts GeoJSON (Geometry or Feature objects), WKT, EWKT (`SRID=xxxx;...`)
//! and bare `[lng, lat]` coordinate pairs, and produces an EWKT string
//! targeting the fixed SRID. Reprojection of a non-3857 input is delegated
//! to PostGIS's `ST_Transform` at insert time rather than done in-process —
//! this crate has no coordinate-transform library dependency of its own,
//! matching the rest of the pack's avoidance of a `proj` binding no example
//! repo actually pulls in.

use std::str::FromStr;

use serde_json::Value as Json;

pub const TARGET_SRID: i32 = 3857;
const DEFAULT_INPUT_SRID: i32 = 4326;

#[derive(Debug)]
pub enum GeometryError {
    Invalid(String),
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::Invalid(msg) => write!(f, "invalid geometry input: {msg}"),
        }
    }
}

impl std::error::Error for GeometryError {}

/// A geometry parsed from caller input, still tagged with its source SRID.
/// The repository layer wraps `ewkt` in `ST_GeomFromEWKT(...)` and, when
/// `srid != TARGET_SRID`, an outer `ST_Transform(..., 3857)`.
pub struct ParsedGeometry {
    pub ewkt: String,
    pub srid: i32,
}

/// Mirrors the reference service's format auto-detection: GeoJSON object,
/// WKT/EWKT string, or a bare `[lng, lat]` pair. `default_srid` is used when
/// the input doesn't carry its own (GeoJSON `crs`, or an EWKT `SRID=` prefix).
pub fn parse(value: &Json, default_srid: Option<i32>) -> Result<Option<ParsedGeometry>, GeometryError> {
    if value.is_null() {
        return Ok(None);
    }

    if let Some(arr) = value.as_array() {
        return parse_coordinate_pair(arr, default_srid).map(Some);
    }

    if let Some(obj) = value.as_object() {
        return parse_geojson(obj, default_srid).map(Some);
    }

    if let Some(s) = value.as_str() {
        return parse_string(s, default_srid).map(Some);
    }

    Err(GeometryError::Invalid(format!(
        "cannot detect geometry format from {value}"
    )))
}

fn parse_coordinate_pair(arr: &[Json], default_srid: Option<i32>) -> Result<ParsedGeometry, GeometryError> {
    if arr.len() < 2 {
        return Err(GeometryError::Invalid("coordinate pair needs at least [lng, lat]".into()));
    }
    let lng = arr[0]
        .as_f64()
        .ok_or_else(|| GeometryError::Invalid("lng must be numeric".into()))?;
    let lat = arr[1]
        .as_f64()
        .ok_or_else(|| GeometryError::Invalid("lat must be numeric".into()))?;
    Ok(ParsedGeometry {
        ewkt: format!("POINT({lng} {lat})"),
        srid: default_srid.unwrap_or(DEFAULT_INPUT_SRID),
    })
}

fn parse_geojson(
    obj: &serde_json::Map<String, Json>,
    default_srid: Option<i32>,
) -> Result<ParsedGeometry, GeometryError> {
    let geometry_obj = if obj.get("type").and_then(Json::as_str) == Some("Feature") {
        obj.get("geometry")
            .and_then(Json::as_object)
            .ok_or_else(|| GeometryError::Invalid("Feature missing geometry".into()))?
    } else {
        obj
    };

    let srid = extract_crs_srid(obj).or(default_srid).unwrap_or(DEFAULT_INPUT_SRID);
    let wkt_body = geojson_geometry_to_wkt(geometry_obj)?;
    Ok(ParsedGeometry { ewkt: wkt_body, srid })
}

/// GeoJSON's optional `crs` member, `{"type": "name", "properties": {"name": "EPSG:xxxx"}}`.
fn extract_crs_srid(obj: &serde_json::Map<String, Json>) -> Option<i32> {
    let name = obj.get("crs")?.get("properties")?.get("name")?.as_str()?;
    name.rsplit(':').next()?.parse().ok()
}

fn geojson_geometry_to_wkt(obj: &serde_json::Map<String, Json>) -> Result<String, GeometryError> {
    let kind = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| GeometryError::Invalid("GeoJSON geometry missing type".into()))?;
    let coords = obj.get("coordinates");

    match kind {
        "Point" => {
            let c = coords.and_then(Json::as_array).ok_or_else(invalid_coords)?;
            let (x, y) = pair(c)?;
            Ok(format!("POINT({x} {y})"))
        }
        "LineString" => {
            let c = coords.and_then(Json::as_array).ok_or_else(invalid_coords)?;
            Ok(format!("LINESTRING({})", ring_to_wkt(c)?))
        }
        "Polygon" => {
            let rings = coords.and_then(Json::as_array).ok_or_else(invalid_coords)?;
            let parts: Result<Vec<String>, GeometryError> = rings
                .iter()
                .map(|r| r.as_array().ok_or_else(invalid_coords).and_then(|r| ring_to_wkt(r)))
                .map(|r| r.map(|body| format!("({body})")))
                .collect();
            Ok(format!("POLYGON({})", parts?.join(", ")))
        }
        other => Err(GeometryError::Invalid(format!("unsupported GeoJSON geometry type: {other}"))),
    }
}

fn invalid_coords() -> GeometryError {
    GeometryError::Invalid("malformed coordinates array".into())
}

fn pair(c: &[Json]) -> Result<(f64, f64), GeometryError> {
    if c.len() < 2 {
        return Err(invalid_coords());
    }
    let x = c[0].as_f64().ok_or_else(invalid_coords)?;
    let y = c[1].as_f64().ok_or_else(invalid_coords)?;
    Ok((x, y))
}

fn ring_to_wkt(points: &[Json]) -> Result<String, GeometryError> {
    let parts: Result<Vec<String>, GeometryError> = points
        .iter()
        .map(|p| p.as_array().ok_or_else(invalid_coords).and_then(|p| pair(p)))
        .map(|p| p.map(|(x, y)| format!("{x} {y}")))
        .collect();
    Ok(parts?.join(", "))
}

fn parse_string(value: &str, default_srid: Option<i32>) -> Result<ParsedGeometry, GeometryError> {
    let value = value.trim();

    if value.to_uppercase().starts_with("SRID=") {
        let (head, body) = value
            .split_once(';')
            .ok_or_else(|| GeometryError::Invalid(format!("invalid EWKT format: {value}")))?;
        let srid: i32 = head[5..]
            .parse()
            .map_err(|_| GeometryError::Invalid(format!("invalid SRID value: {}", &head[5..])))?;
        return Ok(ParsedGeometry { ewkt: body.trim().to_string(), srid });
    }

    if let Ok(parsed) = serde_json::from_str::<Json>(value) {
        if let Some(obj) = parsed.as_object() {
            return parse_geojson(obj, default_srid);
        }
    }

    // Treat anything else as bare WKT: validated structurally (balanced
    // parens, a recognized keyword) rather than by a full grammar — the
    // database is the final arbiter via ST_GeomFromText.
    let upper = value.to_uppercase();
    let known_kind = ["POINT", "LINESTRING", "POLYGON", "MULTIPOINT", "MULTILINESTRING", "MULTIPOLYGON", "GEOMETRYCOLLECTION"]
        .iter()
        .any(|k| upper.starts_with(k));
    if !known_kind {
        return Err(GeometryError::Invalid(format!("string is not valid WKT, EWKT, or GeoJSON: {value}")));
    }
    Ok(ParsedGeometry {
        ewkt: value.to_string(),
        srid: default_srid.unwrap_or(DEFAULT_INPUT_SRID),
    })
}

/// Parse a WKT string (as returned by `ST_AsText(resource.geometry)`) into a
/// typed [`geo_types::Geometry`], for callers that want structured access to
/// a resource's stored geometry rather than its raw text form.
pub fn to_geo_type(wkt_text: &str) -> Result<geo_types::Geometry<f64>, GeometryError> {
    let parsed = wkt::Wkt::from_str(wkt_text).map_err(|e| GeometryError::Invalid(e.to_string()))?;
    geo_types::Geometry::try_from(parsed).map_err(|e| GeometryError::Invalid(e.to_string()))
}

/// The SQL fragment to bind as a geometry literal: wraps in `ST_Transform`
/// only when the parsed SRID differs from the fixed target.
pub fn to_sql_expr(parsed: &ParsedGeometry) -> String {
    let geom = format!("ST_GeomFromText('{}', {})", parsed.ewkt.replace('\'', "''"), parsed.srid);
    if parsed.srid == TARGET_SRID {
        geom
    } else {
        format!("ST_Transform({geom}, {TARGET_SRID})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinate_pair_parses_as_point() {
        let parsed = parse(&json!([1.0, 2.0]), None).unwrap().unwrap();
        assert!(parsed.ewkt.starts_with("POINT"));
        assert_eq!(parsed.srid, DEFAULT_INPUT_SRID);
    }

    #[test]
    fn ewkt_string_extracts_srid() {
        let parsed = parse(&json!("SRID=3857;POINT(0 0)"), None).unwrap().unwrap();
        assert_eq!(parsed.srid, 3857);
        assert_eq!(parsed.ewkt, "POINT(0 0)");
    }

    #[test]
    fn plain_wkt_uses_default_srid() {
        let parsed = parse(&json!("POINT(1 1)"), Some(4326)).unwrap().unwrap();
        assert_eq!(parsed.srid, 4326);
    }

    #[test]
    fn geojson_point_geometry_parses() {
        let parsed = parse(&json!({"type": "Point", "coordinates": [10.0, 20.0]}), None).unwrap().unwrap();
        assert_eq!(parsed.ewkt, "POINT(10 20)");
    }

    #[test]
    fn geojson_feature_unwraps_geometry() {
        let parsed = parse(
            &json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}),
            None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.ewkt, "POINT(1 2)");
    }

    #[test]
    fn geojson_crs_overrides_default_srid() {
        let parsed = parse(
            &json!({
                "type": "Point", "coordinates": [1.0, 2.0],
                "crs": {"type": "name", "properties": {"name": "EPSG:3857"}}
            }),
            Some(4326),
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.srid, 3857);
    }

    #[test]
    fn null_input_is_none() {
        assert!(parse(&Json::Null, None).unwrap().is_none());
    }

    #[test]
    fn garbage_string_is_rejected() {
        assert!(parse(&json!("not a geometry"), None).is_err());
    }

    #[test]
    fn non_target_srid_wraps_with_transform() {
        let parsed = ParsedGeometry { ewkt: "POINT(1 1)".into(), srid: 4326 };
        assert!(to_sql_expr(&parsed).starts_with("ST_Transform("));
    }

    #[test]
    fn target_srid_skips_transform() {
        let parsed = ParsedGeometry { ewkt: "POINT(1 1)".into(), srid: 3857 };
        assert!(!to_sql_expr(&parsed).contains("ST_Transform"));
    }

    #[test]
    fn wkt_text_round_trips_into_geo_types() {
        let geom = to_geo_type("POINT(1 2)").unwrap();
        assert!(matches!(geom, geo_types::Geometry::Point(_)));
    }
}
