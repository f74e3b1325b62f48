pub mod descriptor;
pub mod kind;

use std::collections::BTreeSet;
use std::path::Path;

use foundation::DescriptorId;

pub use descriptor::*;
pub use kind::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    UnknownDescriptor(String),
    DuplicateId(String),
    Invalid(String),
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::UnknownDescriptor(id) => write!(f, "unknown descriptor: {id}"),
            CatalogError::DuplicateId(id) => write!(f, "duplicate descriptor id: {id}"),
            CatalogError::Invalid(msg) => write!(f, "invalid descriptor: {msg}"),
            CatalogError::Corrupt(msg) => write!(f, "catalog file corrupt: {msg}"),
            CatalogError::Io(msg) => write!(f, "catalog read error: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// State transitions applied to the catalog.
///
/// User input (`SetActive`, `SetVisible`, `SetOpacity`) and fetch progress
/// (everything else) go through the same reducer so descriptor state has a
/// single writer.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorEvent {
    SetActive { id: DescriptorId, active: bool },
    SetVisible { id: DescriptorId, visible: bool },
    SetOpacity { id: DescriptorId, opacity: f32 },
    FetchStarted { id: DescriptorId },
    RetryScheduled {
        id: DescriptorId,
        retry_count: u32,
        message: String,
    },
    Loaded { id: DescriptorId },
    Failed {
        id: DescriptorId,
        message: String,
        placeholder: bool,
    },
    ResetStatus { id: DescriptorId },
}

impl DescriptorEvent {
    pub fn id(&self) -> &DescriptorId {
        match self {
            DescriptorEvent::SetActive { id, .. }
            | DescriptorEvent::SetVisible { id, .. }
            | DescriptorEvent::SetOpacity { id, .. }
            | DescriptorEvent::FetchStarted { id }
            | DescriptorEvent::RetryScheduled { id, .. }
            | DescriptorEvent::Loaded { id }
            | DescriptorEvent::Failed { id, .. }
            | DescriptorEvent::ResetStatus { id } => id,
        }
    }
}

/// What an applied event changed, so callers can emit one notification per
/// transition and nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Change {
    /// A user-facing field (`active`, `visible`, `opacity`) changed.
    pub needs_reconcile: bool,
    /// New value of "is loading", when it flipped.
    pub loading: Option<bool>,
    /// New `last_error`, when it changed.
    pub error: Option<Option<String>>,
}

impl Change {
    pub fn is_empty(&self) -> bool {
        !self.needs_reconcile && self.loading.is_none() && self.error.is_none()
    }
}

/// Ordered descriptor list. Order is display order; lookups are by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorCatalog {
    descriptors: Vec<Descriptor>,
}

impl DescriptorCatalog {
    pub fn new(descriptors: Vec<Descriptor>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        for d in &descriptors {
            if !seen.insert(d.id.clone()) {
                return Err(CatalogError::DuplicateId(d.id.to_string()));
            }
        }
        Ok(Self { descriptors })
    }

    /// Parses a JSON array of [`DescriptorConfig`] entries.
    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let configs: Vec<DescriptorConfig> =
            serde_json::from_str(text).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        let descriptors = configs
            .into_iter()
            .map(Descriptor::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(descriptors)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, id: &DescriptorId) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| &d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn as_slice(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Applies one event and reports what changed.
    pub fn apply(&mut self, event: DescriptorEvent) -> Result<Change, CatalogError> {
        let d = self
            .descriptors
            .iter_mut()
            .find(|d| &d.id == event.id())
            .ok_or_else(|| CatalogError::UnknownDescriptor(event.id().to_string()))?;

        let was_loading = d.status.load_state == LoadState::Loading;
        let prev_error = d.status.last_error.clone();
        let mut change = Change::default();

        match event {
            DescriptorEvent::SetActive { active, .. } => {
                change.needs_reconcile = d.active != active;
                d.active = active;
            }
            DescriptorEvent::SetVisible { visible, .. } => {
                change.needs_reconcile = d.visible != visible;
                d.visible = visible;
            }
            DescriptorEvent::SetOpacity { opacity, .. } => {
                let opacity = clamp_opacity(opacity);
                change.needs_reconcile = d.opacity != opacity;
                d.opacity = opacity;
            }
            DescriptorEvent::FetchStarted { .. } => {
                d.status = DescriptorStatus {
                    load_state: LoadState::Loading,
                    last_error: None,
                    retry_count: 0,
                    showing_placeholder: false,
                };
            }
            DescriptorEvent::RetryScheduled {
                retry_count,
                message,
                ..
            } => {
                d.status.load_state = LoadState::Loading;
                d.status.retry_count = retry_count;
                d.status.last_error = Some(message);
            }
            DescriptorEvent::Loaded { .. } => {
                d.status.load_state = LoadState::Loaded;
                d.status.last_error = None;
                d.status.showing_placeholder = false;
            }
            DescriptorEvent::Failed {
                message,
                placeholder,
                ..
            } => {
                d.status.load_state = LoadState::Errored;
                d.status.last_error = Some(message);
                d.status.showing_placeholder = placeholder;
            }
            DescriptorEvent::ResetStatus { .. } => {
                d.status = DescriptorStatus::default();
            }
        }

        let is_loading = d.status.load_state == LoadState::Loading;
        if is_loading != was_loading {
            change.loading = Some(is_loading);
        }
        if d.status.last_error != prev_error {
            change.error = Some(d.status.last_error.clone());
        }
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        CatalogError, Change, Descriptor, DescriptorCatalog, DescriptorEvent, LayerKind, LoadState,
    };
    use foundation::DescriptorId;

    fn catalog() -> DescriptorCatalog {
        DescriptorCatalog::new(vec![
            Descriptor::new("d1", LayerKind::Parcels, "http://x/1"),
            Descriptor::new("roads", LayerKind::Roads, "http://x/roads"),
        ])
        .unwrap()
    }

    fn id(s: &str) -> DescriptorId {
        DescriptorId::from(s)
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = DescriptorCatalog::new(vec![
            Descriptor::new("a", LayerKind::Roads, "http://x"),
            Descriptor::new("a", LayerKind::Water, "http://y"),
        ])
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId("a".to_string()));
    }

    #[test]
    fn loads_json_catalog() {
        let c = DescriptorCatalog::from_json_str(
            r##"[
                {"id":"d1","name":"Cankaya","endpoint":"http://x/p?d=1","kind":"parcels","color":"#ff0000","active":true},
                {"id":"water","endpoint":"http://x/water","kind":"water","opacity":0.5}
            ]"##,
        )
        .unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.get(&id("d1")).unwrap().active);
        assert_eq!(c.get(&id("water")).unwrap().opacity, 0.5);
    }

    #[test]
    fn corrupt_json_is_reported() {
        let err = DescriptorCatalog::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, CatalogError::Corrupt(_)));
    }

    #[test]
    fn unknown_descriptor_is_an_error() {
        let mut c = catalog();
        let err = c
            .apply(DescriptorEvent::SetActive {
                id: id("nope"),
                active: true,
            })
            .unwrap_err();
        assert_eq!(err, CatalogError::UnknownDescriptor("nope".to_string()));
    }

    #[test]
    fn toggles_request_reconcile_only_when_changed() {
        let mut c = catalog();
        let on = DescriptorEvent::SetActive {
            id: id("d1"),
            active: true,
        };
        assert!(c.apply(on.clone()).unwrap().needs_reconcile);
        assert!(c.apply(on).unwrap().is_empty());

        let fade = DescriptorEvent::SetOpacity {
            id: id("d1"),
            opacity: 3.0,
        };
        assert!(!c.apply(fade).unwrap().needs_reconcile);
    }

    #[test]
    fn fetch_lifecycle_reports_each_transition_once() {
        let mut c = catalog();
        let started = c.apply(DescriptorEvent::FetchStarted { id: id("d1") }).unwrap();
        assert_eq!(
            started,
            Change {
                needs_reconcile: false,
                loading: Some(true),
                error: None
            }
        );

        let retry = c
            .apply(DescriptorEvent::RetryScheduled {
                id: id("d1"),
                retry_count: 1,
                message: "server error (HTTP 500); retrying (1/3)".to_string(),
            })
            .unwrap();
        assert_eq!(retry.loading, None);
        assert_eq!(
            retry.error,
            Some(Some("server error (HTTP 500); retrying (1/3)".to_string()))
        );

        let loaded = c.apply(DescriptorEvent::Loaded { id: id("d1") }).unwrap();
        assert_eq!(loaded.loading, Some(false));
        assert_eq!(loaded.error, Some(None));

        let status = &c.get(&id("d1")).unwrap().status;
        assert_eq!(status.load_state, LoadState::Loaded);
        assert_eq!(status.retry_count, 1);
    }

    #[test]
    fn failure_then_reset_returns_to_idle() {
        let mut c = catalog();
        c.apply(DescriptorEvent::FetchStarted { id: id("roads") }).unwrap();
        c.apply(DescriptorEvent::Failed {
            id: id("roads"),
            message: "timeout; exhausted after 4 attempts".to_string(),
            placeholder: true,
        })
        .unwrap();
        let s = &c.get(&id("roads")).unwrap().status;
        assert_eq!(s.load_state, LoadState::Errored);
        assert!(s.showing_placeholder);

        let reset = c.apply(DescriptorEvent::ResetStatus { id: id("roads") }).unwrap();
        assert_eq!(reset.error, Some(None));
        assert_eq!(reset.loading, None);
        assert_eq!(c.get(&id("roads")).unwrap().status.load_state, LoadState::Idle);
    }
}
