use catalog::Descriptor;
use foundation::FeatureId;
use foundation::math::LonLat;
use serde_json::Map;

use crate::feature::{FeatureRecord, KEY_DISTRICT};
use crate::geometry::Geometry;

pub const PLACEHOLDER_FEATURE_COUNT: usize = 4;

/// South-west corner of the placeholder grid (central Ankara).
const ANCHOR: LonLat = LonLat {
    lon_deg: 32.85,
    lat_deg: 39.92,
};
const CELL_DEG: f64 = 0.002;
const GAP_DEG: f64 = 0.0005;

/// A 2x2 grid of small squares, identical for every call with the same
/// descriptor. Every record is flagged as a placeholder.
pub fn placeholder_features(descriptor: &Descriptor) -> Vec<FeatureRecord> {
    let prefix = descriptor.kind.id_prefix();
    (0..PLACEHOLDER_FEATURE_COUNT)
        .map(|i| {
            let col = (i % 2) as f64;
            let row = (i / 2) as f64;
            let x0 = ANCHOR.lon_deg + col * (CELL_DEG + GAP_DEG);
            let y0 = ANCHOR.lat_deg + row * (CELL_DEG + GAP_DEG);
            let ring = vec![
                LonLat::new(x0, y0),
                LonLat::new(x0 + CELL_DEG, y0),
                LonLat::new(x0 + CELL_DEG, y0 + CELL_DEG),
                LonLat::new(x0, y0 + CELL_DEG),
                LonLat::new(x0, y0),
            ];

            let mut props = Map::new();
            if let Some(district) = &descriptor.district {
                props.insert(KEY_DISTRICT.to_string(), district.clone().into());
            }
            FeatureRecord::new(
                FeatureId::new(format!("{prefix}-placeholder-{i}")),
                descriptor.id.clone(),
                descriptor.color,
                Geometry::Polygon(vec![ring]).project(),
                props,
            )
            .into_placeholder()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use catalog::{Descriptor, LayerKind};

    use super::{PLACEHOLDER_FEATURE_COUNT, placeholder_features};

    #[test]
    fn placeholder_set_is_fixed_and_flagged() {
        let d = Descriptor::new("roads", LayerKind::Roads, "http://x/roads");
        let a = placeholder_features(&d);
        let b = placeholder_features(&d);
        assert_eq!(a.len(), PLACEHOLDER_FEATURE_COUNT);
        assert_eq!(a, b);
        assert!(a.iter().all(|f| f.is_placeholder()));
        assert_eq!(a[3].id.as_str(), "road-placeholder-3");
    }

    #[test]
    fn cells_do_not_overlap() {
        let d = Descriptor::new("p", LayerKind::Parcels, "http://x");
        let f = placeholder_features(&d);
        let b0 = f[0].geometry.bounds();
        let b1 = f[1].geometry.bounds();
        assert!(b0.max[0] < b1.min[0]);
    }
}
