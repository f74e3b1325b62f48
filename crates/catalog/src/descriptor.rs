use std::time::Duration;

use foundation::DescriptorId;
use serde::{Deserialize, Serialize};

use crate::CatalogError;
use crate::kind::LayerKind;

/// 8-bit RGBA render color.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba([r, g, b, a])
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn parse_hex(s: &str) -> Result<Self, CatalogError> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || CatalogError::Invalid(format!("invalid color: {s:?}"));
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let mut out = [0u8, 0, 0, 255];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                    out[i] = v * 17;
                }
                Ok(Rgba(out))
            }
            6 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        let [r, g, b, _] = self.0;
        Rgba([r, g, b, a])
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored,
}

impl LoadState {
    /// Whether the unit has been requested at all (counts toward progress).
    pub fn is_requested(self) -> bool {
        !matches!(self, LoadState::Idle)
    }

    pub fn is_settled(self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Errored)
    }
}

/// Engine-owned status of a descriptor. Only the reducer writes it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DescriptorStatus {
    pub load_state: LoadState,
    pub last_error: Option<String>,
    pub retry_count: u32,
    /// The layer currently shows fallback geometry instead of fetched data.
    pub showing_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub id: DescriptorId,
    pub name: String,
    pub endpoint: String,
    pub kind: LayerKind,
    /// Overrides the kind's payload key.
    pub response_key: Option<String>,
    pub color: Option<Rgba>,
    /// Owning district, for parcel layers.
    pub district: Option<String>,
    pub z_index: i32,
    pub timeout: Duration,
    pub active: bool,
    pub visible: bool,
    pub opacity: f32,
    pub status: DescriptorStatus,
}

impl Descriptor {
    pub fn new(id: impl Into<DescriptorId>, kind: LayerKind, endpoint: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            endpoint: endpoint.into(),
            kind,
            response_key: None,
            color: None,
            district: None,
            z_index: kind.default_z_index(),
            timeout: kind.default_timeout(),
            active: false,
            visible: true,
            opacity: 1.0,
            status: DescriptorStatus::default(),
        }
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_response_key(mut self, key: impl Into<String>) -> Self {
        self.response_key = Some(key.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// The payload key this descriptor expects, if any.
    pub fn expected_key(&self) -> Option<&str> {
        self.response_key
            .as_deref()
            .or_else(|| self.kind.expected_key())
    }

    pub fn is_selectable(&self) -> bool {
        self.kind.is_selectable()
    }
}

/// On-disk form of a descriptor, as listed in a catalog JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub kind: LayerKind,
    #[serde(default)]
    pub response_key: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub z_index: Option<i32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub active: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

impl TryFrom<DescriptorConfig> for Descriptor {
    type Error = CatalogError;

    fn try_from(cfg: DescriptorConfig) -> Result<Self, Self::Error> {
        if cfg.id.trim().is_empty() {
            return Err(CatalogError::Invalid("descriptor id is required".to_string()));
        }
        if cfg.endpoint.trim().is_empty() {
            return Err(CatalogError::Invalid(format!(
                "descriptor {} has no endpoint",
                cfg.id
            )));
        }

        let color = cfg.color.as_deref().map(Rgba::parse_hex).transpose()?;
        let name = if cfg.name.trim().is_empty() {
            cfg.id.clone()
        } else {
            cfg.name
        };

        Ok(Descriptor {
            id: DescriptorId::new(cfg.id),
            name,
            endpoint: cfg.endpoint,
            kind: cfg.kind,
            response_key: cfg.response_key.filter(|k| !k.trim().is_empty()),
            color,
            district: cfg.district,
            z_index: cfg.z_index.unwrap_or_else(|| cfg.kind.default_z_index()),
            timeout: cfg
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| cfg.kind.default_timeout()),
            active: cfg.active,
            visible: cfg.visible,
            opacity: clamp_opacity(cfg.opacity),
            status: DescriptorStatus::default(),
        })
    }
}

/// Clamps to [0, 1]; NaN becomes fully opaque.
pub fn clamp_opacity(v: f32) -> f32 {
    if v.is_nan() { 1.0 } else { v.clamp(0.0, 1.0) }
}
