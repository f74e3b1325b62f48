use catalog::{Descriptor, LayerKind};
use formats::FeatureRecord;
use foundation::{DescriptorId, FeatureId, LayerId};

use crate::symbology::{FeatureStyle, LayerStyle, StyleFn, style_fn};

/// Live render layer for one active descriptor.
///
/// Only the reconciler creates, fills or drops these.
#[derive(Debug, Clone)]
pub struct RenderLayer {
    pub id: LayerId,
    pub descriptor_id: DescriptorId,
    pub kind: LayerKind,
    pub z_index: i32,
    pub visible: bool,
    pub opacity: f32,
    pub style: LayerStyle,
    style_fn: StyleFn,
    features: Vec<FeatureRecord>,
}

impl RenderLayer {
    pub fn new(id: LayerId, descriptor: &Descriptor) -> Self {
        let style = descriptor
            .color
            .map(LayerStyle::new)
            .unwrap_or_else(|| LayerStyle::for_kind(descriptor.kind));
        Self {
            id,
            descriptor_id: descriptor.id.clone(),
            kind: descriptor.kind,
            z_index: descriptor.z_index,
            visible: descriptor.visible,
            opacity: descriptor.opacity,
            style,
            style_fn: style_fn(descriptor.kind),
            features: Vec::new(),
        }
    }

    /// Parcel layers are the only ones pointer selection looks at.
    pub fn is_selectable(&self) -> bool {
        self.kind.is_selectable()
    }

    pub fn features(&self) -> &[FeatureRecord] {
        &self.features
    }

    pub fn feature(&self, id: &FeatureId) -> Option<&FeatureRecord> {
        self.features.iter().find(|f| &f.id == id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.features.first().is_some_and(FeatureRecord::is_placeholder)
    }

    pub(crate) fn replace_features(&mut self, features: Vec<FeatureRecord>) {
        self.features = features;
    }

    /// Returns `true` if the flag changed.
    pub(crate) fn set_selected(&mut self, id: &FeatureId, selected: bool) -> bool {
        self.features
            .iter_mut()
            .find(|f| &f.id == id)
            .is_some_and(|f| f.set_selected(selected))
    }

    pub fn style_of(&self, feature: &FeatureRecord) -> FeatureStyle {
        (self.style_fn)(&self.style, feature)
    }

    pub fn styled(&self) -> impl Iterator<Item = (&FeatureRecord, FeatureStyle)> + '_ {
        self.features.iter().map(|f| (f, self.style_of(f)))
    }
}

#[cfg(test)]
mod tests {
    use catalog::{Descriptor, LayerKind, Rgba};
    use formats::placeholder_features;
    use foundation::LayerId;

    use super::RenderLayer;

    #[test]
    fn layer_takes_descriptor_settings() {
        let mut d = Descriptor::new("d1", LayerKind::Parcels, "http://x")
            .with_color(Rgba::new(10, 20, 30, 255));
        d.opacity = 0.4;
        d.visible = false;
        let layer = RenderLayer::new(LayerId(9), &d);
        assert_eq!(layer.style.color, Rgba::new(10, 20, 30, 255));
        assert_eq!(layer.opacity, 0.4);
        assert!(!layer.visible);
        assert!(layer.is_selectable());
        assert!(layer.is_empty());
    }

    #[test]
    fn selection_flag_flips_once() {
        let d = Descriptor::new("d1", LayerKind::Parcels, "http://x");
        let mut layer = RenderLayer::new(LayerId(1), &d);
        layer.replace_features(placeholder_features(&d));
        assert!(layer.is_placeholder());

        let id = layer.features()[2].id.clone();
        assert!(layer.set_selected(&id, true));
        assert!(!layer.set_selected(&id, true));
        assert_eq!(layer.features().iter().filter(|f| f.is_selected()).count(), 1);
    }
}
