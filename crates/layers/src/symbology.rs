use catalog::{LayerKind, Rgba};
use formats::FeatureRecord;

/// Layer-wide style inputs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerStyle {
    /// Used for features that carry no color of their own.
    pub color: Rgba,
}

impl LayerStyle {
    pub const fn new(color: Rgba) -> Self {
        Self { color }
    }

    pub fn for_kind(kind: LayerKind) -> Self {
        Self::new(default_color(kind))
    }
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self::for_kind(LayerKind::Generic)
    }
}

/// Resolved paint for one feature.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FeatureStyle {
    pub fill: Option<Rgba>,
    pub stroke: Rgba,
    pub stroke_width: f32,
    pub dashed: bool,
}

pub type StyleFn = fn(&LayerStyle, &FeatureRecord) -> FeatureStyle;

const SELECTED_STROKE: Rgba = Rgba::new(255, 214, 0, 255);
const PLACEHOLDER_STROKE: Rgba = Rgba::new(160, 160, 160, 255);

pub fn default_color(kind: LayerKind) -> Rgba {
    match kind {
        LayerKind::Parcels => Rgba::new(0x33, 0x88, 0xff, 255),
        LayerKind::Roads => Rgba::new(0x66, 0x66, 0x66, 255),
        LayerKind::Buildings => Rgba::new(0xb0, 0xa0, 0x90, 255),
        LayerKind::Water => Rgba::new(0x4a, 0x90, 0xd9, 255),
        LayerKind::Generic => Rgba::new(0x88, 0x88, 0x88, 255),
    }
}

pub fn style_fn(kind: LayerKind) -> StyleFn {
    match kind {
        LayerKind::Parcels => parcel_style,
        LayerKind::Roads => road_style,
        LayerKind::Buildings | LayerKind::Water | LayerKind::Generic => area_style,
    }
}

fn placeholder_style() -> FeatureStyle {
    FeatureStyle {
        fill: None,
        stroke: PLACEHOLDER_STROKE,
        stroke_width: 1.0,
        dashed: true,
    }
}

fn parcel_style(layer: &LayerStyle, f: &FeatureRecord) -> FeatureStyle {
    if f.is_placeholder() {
        return placeholder_style();
    }
    let color = f.color.unwrap_or(layer.color);
    if f.is_selected() {
        FeatureStyle {
            fill: Some(SELECTED_STROKE.with_alpha(96)),
            stroke: SELECTED_STROKE,
            stroke_width: 3.0,
            dashed: false,
        }
    } else {
        FeatureStyle {
            fill: Some(color.with_alpha(64)),
            stroke: color,
            stroke_width: 1.0,
            dashed: false,
        }
    }
}

fn road_style(layer: &LayerStyle, f: &FeatureRecord) -> FeatureStyle {
    if f.is_placeholder() {
        return placeholder_style();
    }
    FeatureStyle {
        fill: None,
        stroke: f.color.unwrap_or(layer.color),
        stroke_width: 2.0,
        dashed: false,
    }
}

fn area_style(layer: &LayerStyle, f: &FeatureRecord) -> FeatureStyle {
    if f.is_placeholder() {
        return placeholder_style();
    }
    let color = f.color.unwrap_or(layer.color);
    FeatureStyle {
        fill: Some(color.with_alpha(128)),
        stroke: color,
        stroke_width: 1.0,
        dashed: false,
    }
}
