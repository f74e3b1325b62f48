use std::collections::BTreeMap;

use formats::Geometry;
use foundation::math::RenderPoint;
use foundation::{FeatureId, LayerId};
use scene::{PickOptions, hit_test};

use crate::layer::RenderLayer;
use crate::symbology::FeatureStyle;

/// Drawing surface primitives.
///
/// Layer membership is changed only through `add_layer` / `remove_layer`;
/// `refresh_layer` pushes a new feature set or restyle for a layer that
/// already exists.
pub trait RenderSurface {
    fn add_layer(&mut self, layer: &RenderLayer);
    fn remove_layer(&mut self, id: LayerId);
    fn set_visible(&mut self, id: LayerId, visible: bool);
    fn set_opacity(&mut self, id: LayerId, opacity: f32);
    fn refresh_layer(&mut self, layer: &RenderLayer);

    /// Calls `f` for each feature under `point`, topmost layer first.
    /// Iteration stops as soon as `f` returns `true`.
    fn for_each_feature_at_point(
        &self,
        point: RenderPoint,
        f: &mut dyn FnMut(LayerId, &FeatureId) -> bool,
    );
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Add(LayerId),
    Remove(LayerId),
    SetVisible(LayerId, bool),
    SetOpacity(LayerId, f32),
    Refresh(LayerId),
}

#[derive(Debug, Clone)]
pub struct SurfaceFeature {
    pub id: FeatureId,
    pub geometry: Geometry,
    pub style: FeatureStyle,
}

#[derive(Debug, Clone)]
pub struct SurfaceLayer {
    pub z_index: i32,
    pub visible: bool,
    pub opacity: f32,
    pub features: Vec<SurfaceFeature>,
}

/// In-process surface: keeps a copy of what would be drawn, logs every
/// call, and hit-tests geometrically.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    layers: BTreeMap<LayerId, SurfaceLayer>,
    ops: Vec<SurfaceOp>,
    pick: PickOptions,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pick_options(mut self, pick: PickOptions) -> Self {
        self.pick = pick;
        self
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn layer(&self, id: LayerId) -> Option<&SurfaceLayer> {
        self.layers.get(&id)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layers top to bottom: higher `z_index` first, newer layers first on
    /// ties.
    pub fn paint_order(&self) -> Vec<LayerId> {
        let mut ids: Vec<_> = self.layers.iter().map(|(id, l)| (*id, l.z_index)).collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
        ids.into_iter().map(|(id, _)| id).collect()
    }

    fn snapshot(layer: &RenderLayer) -> Vec<SurfaceFeature> {
        layer
            .styled()
            .map(|(f, style)| SurfaceFeature {
                id: f.id.clone(),
                geometry: f.geometry.clone(),
                style,
            })
            .collect()
    }
}

impl RenderSurface for HeadlessSurface {
    fn add_layer(&mut self, layer: &RenderLayer) {
        self.layers.insert(
            layer.id,
            SurfaceLayer {
                z_index: layer.z_index,
                visible: layer.visible,
                opacity: layer.opacity,
                features: Self::snapshot(layer),
            },
        );
        self.ops.push(SurfaceOp::Add(layer.id));
    }

    fn remove_layer(&mut self, id: LayerId) {
        self.layers.remove(&id);
        self.ops.push(SurfaceOp::Remove(id));
    }

    fn set_visible(&mut self, id: LayerId, visible: bool) {
        if let Some(l) = self.layers.get_mut(&id) {
            l.visible = visible;
        }
        self.ops.push(SurfaceOp::SetVisible(id, visible));
    }

    fn set_opacity(&mut self, id: LayerId, opacity: f32) {
        if let Some(l) = self.layers.get_mut(&id) {
            l.opacity = opacity;
        }
        self.ops.push(SurfaceOp::SetOpacity(id, opacity));
    }

    fn refresh_layer(&mut self, layer: &RenderLayer) {
        if let Some(l) = self.layers.get_mut(&layer.id) {
            l.features = Self::snapshot(layer);
        }
        self.ops.push(SurfaceOp::Refresh(layer.id));
    }

    fn for_each_feature_at_point(
        &self,
        point: RenderPoint,
        f: &mut dyn FnMut(LayerId, &FeatureId) -> bool,
    ) {
        for id in self.paint_order() {
            let Some(layer) = self.layers.get(&id) else {
                continue;
            };
            if !layer.visible {
                continue;
            }
            for feature in &layer.features {
                if hit_test(&feature.geometry, point, self.pick) && f(id, &feature.id) {
                    return;
                }
            }
        }
    }
}
