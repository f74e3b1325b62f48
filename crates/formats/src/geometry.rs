use foundation::bounds::Aabb2;
use foundation::math::{LonLat, RenderPoint, project};
use serde_json::Value;

use crate::{wkb, wkt};

/// Simple-features geometry, generic over the coordinate type.
///
/// Decoders produce `Geometry<LonLat>`; [`Geometry::project`] moves it into
/// the render CRS.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry<P = RenderPoint> {
    Point(P),
    MultiPoint(Vec<P>),
    LineString(Vec<P>),
    MultiLineString(Vec<Vec<P>>),
    Polygon(Vec<Vec<P>>),
    MultiPolygon(Vec<Vec<Vec<P>>>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Line,
    Area,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryError {
    pub message: String,
}

impl GeometryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unreadable geometry: {}", self.message)
    }
}

impl std::error::Error for GeometryError {}

impl<P: Copy> Geometry<P> {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::LineString(_) | Geometry::MultiLineString(_) => GeometryKind::Line,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => GeometryKind::Area,
        }
    }

    pub fn map<Q>(self, f: impl Fn(P) -> Q + Copy) -> Geometry<Q> {
        let line = |pts: Vec<P>| pts.into_iter().map(f).collect::<Vec<Q>>();
        let rings = |rs: Vec<Vec<P>>| rs.into_iter().map(line).collect::<Vec<_>>();
        match self {
            Geometry::Point(p) => Geometry::Point(f(p)),
            Geometry::MultiPoint(ps) => Geometry::MultiPoint(line(ps)),
            Geometry::LineString(ps) => Geometry::LineString(line(ps)),
            Geometry::MultiLineString(ls) => Geometry::MultiLineString(rings(ls)),
            Geometry::Polygon(rs) => Geometry::Polygon(rings(rs)),
            Geometry::MultiPolygon(polys) => {
                Geometry::MultiPolygon(polys.into_iter().map(rings).collect())
            }
        }
    }

    pub fn for_each_point(&self, mut f: impl FnMut(P)) {
        match self {
            Geometry::Point(p) => f(*p),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.iter().for_each(|p| f(*p)),
            Geometry::MultiLineString(ls) | Geometry::Polygon(ls) => {
                ls.iter().flatten().for_each(|p| f(*p))
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(|p| f(*p)),
        }
    }

    pub fn vertex_count(&self) -> usize {
        let mut n = 0;
        self.for_each_point(|_| n += 1);
        n
    }
}

impl Geometry<LonLat> {
    /// Re-projects geographic coordinates into the render CRS.
    pub fn project(self) -> Geometry<RenderPoint> {
        self.map(project)
    }
}

impl Geometry<RenderPoint> {
    pub fn bounds(&self) -> Aabb2 {
        let mut b = Aabb2::empty();
        self.for_each_point(|p| b.extend(p.to_array()));
        b
    }
}

/// Decodes one raw geometry field.
///
/// Accepts a GeoJSON geometry object, a string holding GeoJSON, WKT
/// (optionally `SRID=…;`-prefixed) or hex-encoded (E)WKB.
pub fn decode_geometry(value: &Value) -> Result<Geometry<LonLat>, GeometryError> {
    match value {
        Value::Object(_) => parse_geojson_geometry(value),
        Value::String(s) => decode_geometry_text(s),
        Value::Null => Err(GeometryError::new("geometry is null")),
        _ => Err(GeometryError::new("geometry must be an object or a string")),
    }
}

fn decode_geometry_text(text: &str) -> Result<Geometry<LonLat>, GeometryError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GeometryError::new("geometry string is empty"));
    }
    if text.starts_with('{') {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GeometryError::new(format!("embedded GeoJSON: {e}")))?;
        return parse_geojson_geometry(&value);
    }
    if wkb::looks_like_hex(text) {
        return wkb::decode_hex(text);
    }
    wkt::parse(text)
}

pub fn parse_geojson_geometry(value: &Value) -> Result<Geometry<LonLat>, GeometryError> {
    let obj = value
        .as_object()
        .ok_or_else(|| GeometryError::new("geometry must be an object"))?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GeometryError::new("geometry missing type"))?;
    let coords = obj
        .get("coordinates")
        .ok_or_else(|| GeometryError::new("geometry missing coordinates"))?;

    match ty {
        "Point" => Ok(Geometry::Point(parse_position(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_positions(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_positions(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_nested(coords, parse_positions)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_nested(coords, parse_positions)?)),
        "MultiPolygon" => Ok(Geometry::MultiPolygon(parse_nested(coords, |poly| {
            parse_nested(poly, parse_positions)
        })?)),
        other => Err(GeometryError::new(format!("unsupported geometry type: {other}"))),
    }
}

fn parse_position(coords: &Value) -> Result<LonLat, GeometryError> {
    let arr = coords
        .as_array()
        .ok_or_else(|| GeometryError::new("position must be an array"))?;
    if arr.len() < 2 {
        return Err(GeometryError::new("position must have [lon, lat]"));
    }
    let lon = arr[0]
        .as_f64()
        .ok_or_else(|| GeometryError::new("lon must be a number"))?;
    let lat = arr[1]
        .as_f64()
        .ok_or_else(|| GeometryError::new("lat must be a number"))?;
    Ok(LonLat::new(lon, lat))
}

fn parse_positions(coords: &Value) -> Result<Vec<LonLat>, GeometryError> {
    parse_nested(coords, parse_position)
}

fn parse_nested<T>(
    coords: &Value,
    item: impl Fn(&Value) -> Result<T, GeometryError>,
) -> Result<Vec<T>, GeometryError> {
    let arr = coords
        .as_array()
        .ok_or_else(|| GeometryError::new("coordinates must be an array"))?;
    arr.iter().map(item).collect()
}
