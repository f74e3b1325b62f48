use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upstream dataset family a descriptor pulls from.
///
/// The kind fixes everything that used to be duplicated per data source: the
/// payload key, the id prefix for synthesized feature ids, the request timeout
/// and whether features can be picked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Cadastral parcels of one district.
    Parcels,
    Roads,
    Buildings,
    Water,
    /// Anything else; payload shape is discovered at parse time.
    #[default]
    Generic,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Parcels => "parcels",
            LayerKind::Roads => "roads",
            LayerKind::Buildings => "buildings",
            LayerKind::Water => "water",
            LayerKind::Generic => "generic",
        }
    }

    /// Top-level payload key holding the item array, if the kind has one.
    pub fn expected_key(self) -> Option<&'static str> {
        match self {
            LayerKind::Parcels => Some("parcels"),
            LayerKind::Roads => Some("roads"),
            LayerKind::Buildings => Some("buildings"),
            LayerKind::Water => Some("water"),
            LayerKind::Generic => None,
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            LayerKind::Parcels => "parcel",
            LayerKind::Roads => "road",
            LayerKind::Buildings => "building",
            LayerKind::Water => "water",
            LayerKind::Generic => "feature",
        }
    }

    pub fn default_timeout(self) -> Duration {
        match self {
            LayerKind::Parcels => Duration::from_secs(15),
            _ => Duration::from_secs(10),
        }
    }

    pub fn is_selectable(self) -> bool {
        matches!(self, LayerKind::Parcels)
    }

    /// Paint order; larger values draw on top.
    pub fn default_z_index(self) -> i32 {
        match self {
            LayerKind::Water => 10,
            LayerKind::Roads => 20,
            LayerKind::Buildings => 30,
            LayerKind::Generic => 35,
            LayerKind::Parcels => 40,
        }
    }
}
