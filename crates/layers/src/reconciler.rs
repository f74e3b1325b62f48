use std::collections::{BTreeMap, BTreeSet};

use catalog::{Descriptor, DescriptorCatalog, DescriptorEvent, DescriptorStatus, LoadState};
use formats::FeatureRecord;
use foundation::{DescriptorId, FeatureId, LayerId};
use runtime::Metrics;
use streaming::FetchPipeline;
use tracing::{debug, info};

use crate::layer::RenderLayer;
use crate::surface::RenderSurface;

/// What the reconciler needs from the fetch side.
pub trait FetchLauncher {
    /// Starts a fetch; `None` when one is already outstanding.
    fn launch(&mut self, descriptor: &Descriptor) -> Option<u64>;
    fn cancel(&mut self, id: &DescriptorId) -> bool;
    fn is_in_flight(&self, id: &DescriptorId) -> bool;
}

impl FetchLauncher for FetchPipeline {
    fn launch(&mut self, descriptor: &Descriptor) -> Option<u64> {
        FetchPipeline::launch(self, descriptor)
    }

    fn cancel(&mut self, id: &DescriptorId) -> bool {
        FetchPipeline::cancel(self, id)
    }

    fn is_in_flight(&self, id: &DescriptorId) -> bool {
        FetchPipeline::is_in_flight(self, id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    pub created: usize,
    pub destroyed: usize,
    pub launched: usize,
    pub cancelled: usize,
    pub visibility_updates: usize,
    pub opacity_updates: usize,
}

impl ReconcileSummary {
    pub fn mutations(&self) -> usize {
        self.created
            + self.destroyed
            + self.launched
            + self.cancelled
            + self.visibility_updates
            + self.opacity_updates
    }

    pub fn is_noop(&self) -> bool {
        self.mutations() == 0
    }
}

/// Result of one pass. The reconciler never writes descriptor state itself;
/// `events` are the status transitions the caller feeds to the reducer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub summary: ReconcileSummary,
    pub events: Vec<DescriptorEvent>,
    pub destroyed: Vec<LayerId>,
    pub cancelled: Vec<DescriptorId>,
}

/// Owner of every render layer, keyed by descriptor id.
///
/// Presence of a layer is judged from this map, never by asking the surface.
#[derive(Debug, Default)]
pub struct Reconciler {
    layers: BTreeMap<DescriptorId, RenderLayer>,
    next_layer_id: u64,
    metrics: Metrics,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn layer(&self, id: &DescriptorId) -> Option<&RenderLayer> {
        self.layers.get(id)
    }

    pub fn layer_by_id(&self, id: LayerId) -> Option<&RenderLayer> {
        self.layers.values().find(|l| l.id == id)
    }

    pub fn layers(&self) -> impl Iterator<Item = &RenderLayer> {
        self.layers.values()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn selectable_layers(&self) -> BTreeSet<LayerId> {
        self.layers
            .values()
            .filter(|l| l.is_selectable())
            .map(|l| l.id)
            .collect()
    }

    pub fn feature(&self, layer: LayerId, feature: &FeatureId) -> Option<&FeatureRecord> {
        self.layer_by_id(layer)?.feature(feature)
    }

    pub fn reconcile(
        &mut self,
        catalog: &DescriptorCatalog,
        surface: &mut dyn RenderSurface,
        fetcher: &mut dyn FetchLauncher,
    ) -> ReconcileOutcome {
        let mut out = ReconcileOutcome::default();

        let orphans: Vec<_> = self
            .layers
            .keys()
            .filter(|id| catalog.get(id).is_none())
            .cloned()
            .collect();
        for id in orphans {
            self.drop_layer(&id, surface, &mut out);
            if fetcher.cancel(&id) {
                out.summary.cancelled += 1;
                out.cancelled.push(id);
            }
        }

        for d in catalog.iter() {
            if d.active {
                self.ensure_active(d, surface, fetcher, &mut out);
            } else {
                self.ensure_inactive(d, surface, fetcher, &mut out);
            }
        }

        let s = out.summary;
        self.metrics.inc("reconcile.passes");
        if s.is_noop() {
            self.metrics.inc("reconcile.noop_passes");
        }
        self.metrics.add("layers.created", s.created as u64);
        self.metrics.add("layers.destroyed", s.destroyed as u64);
        self.metrics.add("fetch.launched", s.launched as u64);
        self.metrics.add("fetch.cancelled", s.cancelled as u64);
        self.metrics.add("layers.visibility_updates", s.visibility_updates as u64);
        self.metrics.add("layers.opacity_updates", s.opacity_updates as u64);
        self.metrics.record("reconcile.mutations", s.mutations() as u64);
        debug!(?s, "reconcile pass");
        out
    }

    fn ensure_active(
        &mut self,
        d: &Descriptor,
        surface: &mut dyn RenderSurface,
        fetcher: &mut dyn FetchLauncher,
        out: &mut ReconcileOutcome,
    ) {
        let created = !self.layers.contains_key(&d.id);
        if created {
            let layer = RenderLayer::new(LayerId(self.next_layer_id), d);
            self.next_layer_id += 1;
            info!(descriptor = %d.id, layer = %layer.id, "layer created");
            surface.add_layer(&layer);
            self.layers.insert(d.id.clone(), layer);
            out.summary.created += 1;
        } else if let Some(layer) = self.layers.get_mut(&d.id) {
            if layer.visible != d.visible {
                layer.visible = d.visible;
                surface.set_visible(layer.id, d.visible);
                out.summary.visibility_updates += 1;
            }
            if layer.opacity != d.opacity {
                layer.opacity = d.opacity;
                surface.set_opacity(layer.id, d.opacity);
                out.summary.opacity_updates += 1;
            }
        }

        let stale = created || d.status.load_state == LoadState::Idle;
        if stale && fetcher.launch(d).is_some() {
            out.summary.launched += 1;
            out.events
                .push(DescriptorEvent::FetchStarted { id: d.id.clone() });
        }
    }

    fn ensure_inactive(
        &mut self,
        d: &Descriptor,
        surface: &mut dyn RenderSurface,
        fetcher: &mut dyn FetchLauncher,
        out: &mut ReconcileOutcome,
    ) {
        self.drop_layer(&d.id, surface, out);
        if fetcher.cancel(&d.id) {
            out.summary.cancelled += 1;
            out.cancelled.push(d.id.clone());
        }
        if d.status != DescriptorStatus::default() {
            out.events
                .push(DescriptorEvent::ResetStatus { id: d.id.clone() });
        }
    }

    fn drop_layer(
        &mut self,
        id: &DescriptorId,
        surface: &mut dyn RenderSurface,
        out: &mut ReconcileOutcome,
    ) {
        if let Some(layer) = self.layers.remove(id) {
            info!(descriptor = %id, layer = %layer.id, "layer destroyed");
            surface.remove_layer(layer.id);
            out.summary.destroyed += 1;
            out.destroyed.push(layer.id);
        }
    }

    /// Re-runs the fetch for one active descriptor, keeping its current
    /// layer (and placeholder) on screen until the new data lands.
    pub fn refetch(
        &mut self,
        d: &Descriptor,
        fetcher: &mut dyn FetchLauncher,
    ) -> Option<DescriptorEvent> {
        if !d.active || !self.layers.contains_key(&d.id) {
            return None;
        }
        fetcher.launch(d)?;
        self.metrics.inc("fetch.launched");
        self.metrics.inc("fetch.retried_by_user");
        Some(DescriptorEvent::FetchStarted { id: d.id.clone() })
    }

    /// Swaps in a fetched feature set. Returns the layer it landed in.
    pub fn replace_features(
        &mut self,
        id: &DescriptorId,
        features: Vec<FeatureRecord>,
        surface: &mut dyn RenderSurface,
    ) -> Option<LayerId> {
        let layer = self.layers.get_mut(id)?;
        layer.replace_features(features);
        surface.refresh_layer(layer);
        Some(layer.id)
    }

    /// Flips one feature's `isSelected` flag and restyles its layer.
    pub fn set_selected(
        &mut self,
        layer: LayerId,
        feature: &FeatureId,
        selected: bool,
        surface: &mut dyn RenderSurface,
    ) -> bool {
        let Some(l) = self.layers.values_mut().find(|l| l.id == layer) else {
            return false;
        };
        if !l.set_selected(feature, selected) {
            return false;
        }
        surface.refresh_layer(l);
        true
    }
}
