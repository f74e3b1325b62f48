use std::collections::BTreeSet;

use catalog::Descriptor;
use foundation::FeatureId;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::feature::{FeatureRecord, KEY_DISTRICT};
use crate::geometry::decode_geometry;
use crate::payload::{ShapeError, locate_items};

/// Geometry field names, in lookup priority.
pub const GEOMETRY_FIELDS: [&str; 3] = ["geom", "geometry", "wkb_geometry"];
/// Upstream fields trusted as unique feature keys.
pub const NATURAL_KEY_FIELDS: [&str; 2] = ["uuid", "feature_id"];
/// Upstream numeric ids used when synthesizing a key.
pub const UPSTREAM_ID_FIELDS: [&str; 4] = ["id", "objectid", "gid", "fid"];

/// Parses a response body for `descriptor`.
pub fn parse_body(body: &[u8], descriptor: &Descriptor) -> Result<Vec<FeatureRecord>, ShapeError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| ShapeError::NotJson(e.to_string()))?;
    parse_payload(&payload, descriptor)
}

/// Fails only when the top-level shape is unusable. Bad items are dropped.
pub fn parse_payload(
    payload: &Value,
    descriptor: &Descriptor,
) -> Result<Vec<FeatureRecord>, ShapeError> {
    let items = locate_items(payload, descriptor.expected_key())?;
    Ok(parse_items(items, descriptor))
}

pub fn parse_items(items: &[Value], descriptor: &Descriptor) -> Vec<FeatureRecord> {
    let prefix = descriptor.kind.id_prefix();
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let Some((raw_geometry, mut props)) = split_item(item) else {
            warn!(descriptor = %descriptor.id, index, "dropping item: not an object");
            continue;
        };
        let Some(raw_geometry) = raw_geometry else {
            warn!(descriptor = %descriptor.id, index, "dropping item: no geometry field");
            continue;
        };
        let geometry = match decode_geometry(raw_geometry) {
            Ok(g) => g.project(),
            Err(e) => {
                warn!(descriptor = %descriptor.id, index, "dropping item: {e}");
                continue;
            }
        };

        let id = feature_id(&props, prefix, index, &mut seen);
        if let Some(district) = &descriptor.district {
            props.insert(KEY_DISTRICT.to_string(), Value::String(district.clone()));
        }
        out.push(FeatureRecord::new(
            id,
            descriptor.id.clone(),
            descriptor.color,
            geometry,
            props,
        ));
    }

    debug!(
        descriptor = %descriptor.id,
        parsed = out.len(),
        dropped = items.len() - out.len(),
        "payload parsed"
    );
    out
}

/// Splits an item into its geometry value and property bag.
///
/// GeoJSON `Feature` items are flattened: `properties` becomes the bag and a
/// feature-level `id` is kept when the properties have none.
fn split_item(item: &Value) -> Option<(Option<&Value>, Map<String, Value>)> {
    let obj = item.as_object()?;

    if obj.get("type").and_then(Value::as_str) == Some("Feature") {
        let mut props = obj
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some(id) = obj.get("id")
            && !props.contains_key("id")
        {
            props.insert("id".to_string(), id.clone());
        }
        let geometry = obj.get("geometry").filter(|g| !g.is_null());
        return Some((geometry, props));
    }

    let geometry = GEOMETRY_FIELDS
        .iter()
        .find_map(|k| obj.get(*k).filter(|g| !g.is_null()));
    let props = obj
        .iter()
        .filter(|(k, _)| !GEOMETRY_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some((geometry, props))
}

fn feature_id(
    props: &Map<String, Value>,
    prefix: &str,
    index: usize,
    seen: &mut BTreeSet<String>,
) -> FeatureId {
    if let Some(natural) = first_scalar(props, &NATURAL_KEY_FIELDS)
        && seen.insert(natural.clone())
    {
        return FeatureId::new(natural);
    }

    let upstream = first_scalar(props, &UPSTREAM_ID_FIELDS).unwrap_or_else(|| "x".to_string());
    let base = format!("{prefix}-{upstream}-{index}");
    let mut candidate = base.clone();
    let mut n = 1;
    while !seen.insert(candidate.clone()) {
        candidate = format!("{base}~{n}");
        n += 1;
    }
    FeatureId::new(candidate)
}

fn first_scalar(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match props.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use catalog::{Descriptor, LayerKind, Rgba};
    use serde_json::json;

    use super::{parse_body, parse_payload};
    use crate::geometry::GeometryKind;
    use crate::payload::ShapeError;

    fn parcels() -> Descriptor {
        let mut d = Descriptor::new("cankaya", LayerKind::Parcels, "http://x/parcels")
            .with_color(Rgba::new(0x33, 0x88, 0xff, 255));
        d.district = Some("cankaya".to_string());
        d
    }

    #[test]
    fn parses_mixed_encodings_and_injects_metadata() {
        let body = json!({"parcels": [
            {"id": 7, "ada": 112, "geom": {"type": "Point", "coordinates": [32.85, 39.93]}},
            {"id": 8, "geometry": "POLYGON ((32 39, 32.1 39, 32.1 39.1, 32 39))"},
            {"id": 9, "wkb_geometry": "0101000000000000000000F03F0000000000000040"}
        ]});
        let features = parse_payload(&body, &parcels()).unwrap();
        assert_eq!(features.len(), 3);

        let bag = features[0].property_bag();
        assert_eq!(bag["descriptorId"], "cankaya");
        assert_eq!(bag["color"], "#3388ff");
        assert_eq!(bag["district"], "cankaya");
        assert_eq!(bag["ada"], 112);
        assert_eq!(bag["featureId"], "parcel-7-0");
        assert!(bag.get("geom").is_none());

        assert_eq!(features[1].geometry.kind(), GeometryKind::Area);
        assert_eq!(features[2].id.as_str(), "parcel-9-2");
    }

    #[test]
    fn drops_malformed_items_without_failing() {
        let body = json!({"parcels": [
            {"id": 1},
            {"id": 2, "geom": null, "geometry": "NOT WKT"},
            42,
            {"id": 3, "geom": {"type": "Point", "coordinates": [1.0, 1.0]}}
        ]});
        let features = parse_payload(&body, &parcels()).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id.as_str(), "parcel-3-3");
    }

    #[test]
    fn ids_are_unique_even_when_upstream_repeats() {
        let point = json!({"type": "Point", "coordinates": [1.0, 1.0]});
        let body = json!({"parcels": [
            {"uuid": "a", "geom": point},
            {"uuid": "a", "geom": point},
            {"id": 5, "geom": point},
            {"id": 5, "geom": point},
            {"geom": point}
        ]});
        let features = parse_payload(&body, &parcels()).unwrap();
        let ids: Vec<_> = features.iter().map(|f| f.id.as_str().to_string()).collect();
        assert_eq!(ids, ["a", "parcel-x-1", "parcel-5-2", "parcel-5-3", "parcel-x-4"]);
        let unique: BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn flattens_geojson_features() {
        let d = Descriptor::new("parks", LayerKind::Generic, "http://x/parks");
        let body = json!({"type": "FeatureCollection", "features": [
            {"type": "Feature", "id": 11, "properties": {"name": "Kugulu"},
             "geometry": {"type": "Point", "coordinates": [32.86, 39.90]}}
        ]});
        let features = parse_payload(&body, &d).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id.as_str(), "feature-11-0");
        assert_eq!(features[0].property_bag()["name"], "Kugulu");
        assert!(features[0].color.is_none());
    }

    #[test]
    fn missing_expected_key_is_a_shape_error() {
        let body = br#"{"data": []}"#;
        assert_eq!(
            parse_body(body, &parcels()).unwrap_err(),
            ShapeError::MissingKey {
                key: "parcels".to_string()
            }
        );
        assert!(matches!(
            parse_body(b"<html>", &parcels()),
            Err(ShapeError::NotJson(_))
        ));
    }
}
