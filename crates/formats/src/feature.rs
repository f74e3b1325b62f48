use catalog::Rgba;
use foundation::{DescriptorId, FeatureId};
use serde_json::{Map, Value};

use crate::geometry::Geometry;

pub const KEY_DESCRIPTOR_ID: &str = "descriptorId";
pub const KEY_COLOR: &str = "color";
pub const KEY_FEATURE_ID: &str = "featureId";
pub const KEY_DISTRICT: &str = "district";
pub const KEY_IS_SELECTED: &str = "isSelected";
pub const KEY_PLACEHOLDER: &str = "placeholder";

/// One parsed feature in render coordinates.
///
/// `properties` is the bag handed to observers. It always carries
/// `descriptorId`, `featureId` and `isSelected`, plus `color` when the
/// descriptor has one.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: FeatureId,
    pub descriptor_id: DescriptorId,
    pub color: Option<Rgba>,
    pub geometry: Geometry,
    properties: Map<String, Value>,
    selected: bool,
    placeholder: bool,
}

impl FeatureRecord {
    pub fn new(
        id: FeatureId,
        descriptor_id: DescriptorId,
        color: Option<Rgba>,
        geometry: Geometry,
        mut properties: Map<String, Value>,
    ) -> Self {
        properties.insert(
            KEY_DESCRIPTOR_ID.to_string(),
            Value::String(descriptor_id.to_string()),
        );
        if let Some(color) = color {
            properties.insert(KEY_COLOR.to_string(), Value::String(color.to_hex()));
        }
        properties.insert(KEY_FEATURE_ID.to_string(), Value::String(id.to_string()));
        properties.insert(KEY_IS_SELECTED.to_string(), Value::Bool(false));
        Self {
            id,
            descriptor_id,
            color,
            geometry,
            properties,
            selected: false,
            placeholder: false,
        }
    }

    /// Marks the record as fallback geometry standing in for a failed fetch.
    pub fn into_placeholder(mut self) -> Self {
        self.placeholder = true;
        self.properties
            .insert(KEY_PLACEHOLDER.to_string(), Value::Bool(true));
        self
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Returns `true` if the flag changed.
    pub fn set_selected(&mut self, selected: bool) -> bool {
        if self.selected == selected {
            return false;
        }
        self.selected = selected;
        self.properties
            .insert(KEY_IS_SELECTED.to_string(), Value::Bool(selected));
        true
    }

    /// Snapshot of the property bag as a JSON object.
    pub fn property_bag(&self) -> Value {
        Value::Object(self.properties.clone())
    }
}

#[cfg(test)]
mod tests {
    use catalog::Rgba;
    use foundation::math::RenderPoint;
    use foundation::{DescriptorId, FeatureId};
    use serde_json::{Map, Value, json};

    use super::FeatureRecord;
    use crate::geometry::Geometry;

    fn record() -> FeatureRecord {
        let mut props = Map::new();
        props.insert("ada_no".to_string(), json!(112));
        FeatureRecord::new(
            FeatureId::new("parcel-7-0"),
            DescriptorId::from("d7"),
            Some(Rgba::new(255, 0, 0, 255)),
            Geometry::Point(RenderPoint::new(0.0, 0.0)),
            props,
        )
    }

    #[test]
    fn bag_carries_injected_keys() {
        let bag = record().property_bag();
        assert_eq!(bag["descriptorId"], "d7");
        assert_eq!(bag["color"], "#ff0000");
        assert_eq!(bag["featureId"], "parcel-7-0");
        assert_eq!(bag["isSelected"], false);
        assert_eq!(bag["ada_no"], 112);
        assert!(bag.get("placeholder").is_none());
    }

    #[test]
    fn selection_flag_is_mirrored_in_bag() {
        let mut r = record();
        assert!(r.set_selected(true));
        assert!(!r.set_selected(true));
        assert_eq!(r.property("isSelected"), Some(&Value::Bool(true)));
        assert!(r.set_selected(false));
        assert_eq!(r.property("isSelected"), Some(&Value::Bool(false)));
    }

    #[test]
    fn placeholder_is_marked() {
        let r = record().into_placeholder();
        assert!(r.is_placeholder());
        assert_eq!(r.property("placeholder"), Some(&Value::Bool(true)));
    }
}
