//! The single task that owns all synchronization state.
//!
//! User commands and fetch progress both end up as reducer events on the
//! catalog; every applied transition produces at most one UI event of each
//! kind. Reconciliation runs on the trailing edge of a debounce window.

use std::sync::Arc;

use catalog::{CatalogError, DescriptorCatalog, DescriptorEvent};
use formats::FeatureRecord;
use foundation::math::RenderPoint;
use foundation::{DescriptorId, FeatureId, LayerId};
use runtime::{Debouncer, Event, EventBus, Metrics};
use scene::{SelectionCoordinator, Transition};
use serde_json::{Value, json};
use streaming::{FetchMessage, FetchPipeline, FetchUpdate, Transport};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::aggregate::{ExternalUnit, LoadingSummary, aggregate};
use crate::config::SyncConfig;
use crate::reconciler::{ReconcileSummary, Reconciler};
use crate::surface::RenderSurface;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    SetActive { id: DescriptorId, active: bool },
    SetVisible { id: DescriptorId, visible: bool },
    SetOpacity { id: DescriptorId, opacity: f32 },
    /// Clears an errored descriptor and fetches it again.
    Retry { id: DescriptorId },
    /// Pointer click in render coordinates.
    Pointer { point: RenderPoint },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Property bag of the newly selected feature, or `None` on deselect.
    FeatureSelected(Option<Value>),
    LoadingChanged {
        descriptor: DescriptorId,
        loading: bool,
    },
    ErrorChanged {
        descriptor: DescriptorId,
        error: Option<String>,
    },
    FetchCancelled {
        descriptor: DescriptorId,
    },
    Progress(LoadingSummary),
}

impl UiEvent {
    pub fn to_json(&self) -> Value {
        match self {
            UiEvent::FeatureSelected(bag) => json!({"event": "feature_selected", "properties": bag}),
            UiEvent::LoadingChanged {
                descriptor,
                loading,
            } => json!({"event": "loading_changed", "descriptor": descriptor.as_str(), "loading": loading}),
            UiEvent::ErrorChanged { descriptor, error } => {
                json!({"event": "error_changed", "descriptor": descriptor.as_str(), "error": error})
            }
            UiEvent::FetchCancelled { descriptor } => {
                json!({"event": "fetch_cancelled", "descriptor": descriptor.as_str()})
            }
            UiEvent::Progress(summary) => json!({"event": "progress", "summary": summary}),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Catalog(CatalogError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Catalog(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        EngineError::Catalog(e)
    }
}

pub struct SyncEngine<S: RenderSurface> {
    catalog: DescriptorCatalog,
    surface: S,
    reconciler: Reconciler,
    pipeline: FetchPipeline,
    fetch_rx: UnboundedReceiver<FetchMessage>,
    selection: SelectionCoordinator,
    debounce: Debouncer,
    events: EventBus<UiEvent>,
    external: Vec<ExternalUnit>,
    last_summary: Option<LoadingSummary>,
    metrics: Metrics,
}

impl<S: RenderSurface> SyncEngine<S> {
    /// Builds an engine; descriptors already active in `catalog` are
    /// reconciled after the first debounce window.
    pub fn new(
        catalog: DescriptorCatalog,
        surface: S,
        transport: Arc<dyn Transport>,
        config: SyncConfig,
    ) -> Self {
        let (tx, fetch_rx) = mpsc::unbounded_channel();
        let pipeline = FetchPipeline::new(transport, config.retry_policy(), tx)
            .with_timeout_override(config.timeout_override());
        let mut debounce = Debouncer::new(config.debounce());
        debounce.poke(Instant::now());
        Self {
            catalog,
            surface,
            reconciler: Reconciler::new(),
            pipeline,
            fetch_rx,
            selection: SelectionCoordinator::new(),
            debounce,
            events: EventBus::new(),
            external: Vec::new(),
            last_summary: None,
            metrics: Metrics::new(),
        }
    }

    pub fn catalog(&self) -> &DescriptorCatalog {
        &self.catalog
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn selection(&self) -> &SelectionCoordinator {
        &self.selection
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn events(&self) -> &[Event<UiEvent>] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<Event<UiEvent>> {
        self.events.drain()
    }

    pub fn summary(&self) -> LoadingSummary {
        aggregate(self.catalog.as_slice(), &self.external)
    }

    pub fn is_idle(&self) -> bool {
        !self.debounce.is_pending() && self.pipeline.in_flight_count() == 0
    }

    /// Adds or replaces a non-descriptor unit in the progress aggregate.
    pub fn set_external_unit(&mut self, unit: ExternalUnit) {
        match self.external.iter_mut().find(|u| u.name == unit.name) {
            Some(existing) => *existing = unit,
            None => self.external.push(unit),
        }
        self.publish_progress();
    }

    pub fn dispatch(&mut self, command: EngineCommand) -> Result<(), EngineError> {
        debug!(?command, "dispatch");
        match command {
            EngineCommand::SetActive { id, active } => {
                self.apply_user(DescriptorEvent::SetActive { id, active })
            }
            EngineCommand::SetVisible { id, visible } => {
                self.apply_user(DescriptorEvent::SetVisible { id, visible })
            }
            EngineCommand::SetOpacity { id, opacity } => {
                self.apply_user(DescriptorEvent::SetOpacity { id, opacity })
            }
            EngineCommand::Retry { id } => self.retry(&id),
            EngineCommand::Pointer { point } => {
                self.pointer(point);
                Ok(())
            }
        }
    }

    fn apply_user(&mut self, event: DescriptorEvent) -> Result<(), EngineError> {
        let id = event.id().clone();
        let change = self.catalog.apply(event)?;
        if change.needs_reconcile {
            self.debounce.poke(Instant::now());
        }
        self.emit_change(&id, change);
        Ok(())
    }

    fn retry(&mut self, id: &DescriptorId) -> Result<(), EngineError> {
        let d = self
            .catalog
            .get(id)
            .ok_or_else(|| CatalogError::UnknownDescriptor(id.to_string()))?;
        if !d.active {
            warn!(descriptor = %id, "retry ignored: descriptor is not active");
            return Ok(());
        }
        if self.pipeline.is_in_flight(id) {
            debug!(descriptor = %id, "retry ignored: fetch already in flight");
            return Ok(());
        }

        info!(descriptor = %id, "retry requested");
        let change = self
            .catalog
            .apply(DescriptorEvent::ResetStatus { id: id.clone() })?;
        self.emit_change(id, change);

        let Some(d) = self.catalog.get(id) else {
            return Ok(());
        };
        if let Some(started) = self.reconciler.refetch(d, &mut self.pipeline) {
            let change = self.catalog.apply(started)?;
            self.emit_change(id, change);
        }
        Ok(())
    }

    fn pointer(&mut self, point: RenderPoint) {
        let selectable = self.reconciler.selectable_layers();
        let mut hit: Option<(FeatureId, LayerId)> = None;
        self.surface
            .for_each_feature_at_point(point, &mut |layer, feature| {
                if selectable.contains(&layer) {
                    hit = Some((feature.clone(), layer));
                    return true;
                }
                false
            });

        let transition = match hit {
            Some((feature, layer)) => self.selection.hit(feature, layer),
            None => self.selection.miss(),
        };
        self.apply_selection(transition);
    }

    fn apply_selection(&mut self, t: Transition) {
        if let Some(old) = &t.clear {
            self.reconciler
                .set_selected(old.layer, &old.feature, false, &mut self.surface);
        }
        if let Some(new) = &t.select {
            self.reconciler
                .set_selected(new.layer, &new.feature, true, &mut self.surface);
        }
        if t.notify {
            let bag = t
                .select
                .as_ref()
                .and_then(|s| self.reconciler.feature(s.layer, &s.feature))
                .map(FeatureRecord::property_bag);
            self.metrics.inc("selection.notifications");
            self.events.emit(UiEvent::FeatureSelected(bag));
        }
    }

    /// Runs a reconcile pass now, whether or not the debounce window is open.
    pub fn reconcile_now(&mut self) -> Result<ReconcileSummary, EngineError> {
        self.debounce.cancel();
        let out = self
            .reconciler
            .reconcile(&self.catalog, &mut self.surface, &mut self.pipeline);

        for id in out.cancelled {
            self.events
                .emit(UiEvent::FetchCancelled { descriptor: id });
        }
        for layer in out.destroyed {
            let t = self.selection.forget_layer(layer);
            self.apply_selection(t);
        }
        for event in out.events {
            let id = event.id().clone();
            let change = self.catalog.apply(event)?;
            self.emit_change(&id, change);
        }
        Ok(out.summary)
    }

    fn handle_fetch(&mut self, msg: FetchMessage) -> Result<(), EngineError> {
        let FetchMessage {
            descriptor_id: id,
            generation,
            update,
        } = msg;
        if !self.pipeline.is_current(&id, generation) {
            debug!(descriptor = %id, generation, "dropping stale fetch message");
            self.metrics.inc("fetch.stale_dropped");
            return Ok(());
        }

        let event = match update {
            FetchUpdate::Retrying {
                retry_count,
                message,
            } => {
                self.metrics.inc("fetch.retries");
                DescriptorEvent::RetryScheduled {
                    id: id.clone(),
                    retry_count,
                    message,
                }
            }
            FetchUpdate::Loaded { features } => {
                self.pipeline.finish(&id, generation);
                self.metrics.inc("fetch.loaded");
                self.install(&id, features);
                DescriptorEvent::Loaded { id: id.clone() }
            }
            FetchUpdate::Failed { message, features } => {
                self.pipeline.finish(&id, generation);
                self.metrics.inc("fetch.failed");
                let placeholder = !features.is_empty();
                self.install(&id, features);
                DescriptorEvent::Failed {
                    id: id.clone(),
                    message,
                    placeholder,
                }
            }
        };
        let change = self.catalog.apply(event)?;
        self.emit_change(&id, change);
        Ok(())
    }

    fn install(&mut self, id: &DescriptorId, features: Vec<FeatureRecord>) {
        if let Some(layer) = self
            .reconciler
            .replace_features(id, features, &mut self.surface)
        {
            let t = self.selection.forget_layer(layer);
            self.apply_selection(t);
        }
    }

    fn emit_change(&mut self, id: &DescriptorId, change: catalog::Change) {
        if let Some(loading) = change.loading {
            self.events.emit(UiEvent::LoadingChanged {
                descriptor: id.clone(),
                loading,
            });
        }
        if let Some(error) = change.error {
            self.events.emit(UiEvent::ErrorChanged {
                descriptor: id.clone(),
                error,
            });
        }
        self.publish_progress();
    }

    fn publish_progress(&mut self) {
        let summary = self.summary();
        if self.last_summary != Some(summary) {
            self.last_summary = Some(summary);
            self.events.emit(UiEvent::Progress(summary));
        }
    }

    /// Waits for and handles the next fetch message or debounce expiry.
    ///
    /// Returns `false` without waiting when nothing is pending.
    pub async fn step(&mut self) -> Result<bool, EngineError> {
        let deadline = self.debounce.deadline();
        let fetching = self.pipeline.in_flight_count() > 0;
        if deadline.is_none() && !fetching {
            return Ok(false);
        }

        tokio::select! {
            Some(msg) = self.fetch_rx.recv(), if fetching => self.handle_fetch(msg)?,
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if self.debounce.fire_if_due(Instant::now()) {
                    self.reconcile_now()?;
                }
            }
            else => return Ok(false),
        }
        Ok(true)
    }

    /// Steps until no reconcile is pending and no fetch is in flight.
    pub async fn settle(&mut self) -> Result<(), EngineError> {
        while self.step().await? {}
        Ok(())
    }

    /// Long-running loop: serves `commands` until the sender is dropped and
    /// forwards UI events to `ui`.
    pub async fn run(
        &mut self,
        mut commands: UnboundedReceiver<EngineCommand>,
        ui: UnboundedSender<Event<UiEvent>>,
    ) {
        loop {
            let deadline = self.debounce.deadline();
            let fetching = self.pipeline.in_flight_count() > 0;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.dispatch(command) {
                            warn!("command rejected: {e}");
                        }
                    }
                    None => break,
                },
                Some(msg) = self.fetch_rx.recv(), if fetching => {
                    if let Err(e) = self.handle_fetch(msg) {
                        warn!("fetch message rejected: {e}");
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.debounce.fire_if_due(Instant::now())
                        && let Err(e) = self.reconcile_now()
                    {
                        warn!("reconcile failed: {e}");
                    }
                }
            }
            for event in self.events.drain() {
                if ui.send(event).is_err() {
                    return;
                }
            }
        }
        self.pipeline.cancel_all();
    }
}
