pub mod feature;
pub mod geometry;
pub mod parse;
pub mod payload;
pub mod placeholder;
pub mod wkb;
pub mod wkt;

pub use feature::*;
pub use geometry::{Geometry, GeometryError, GeometryKind, decode_geometry};
pub use parse::*;
pub use payload::*;
pub use placeholder::*;
