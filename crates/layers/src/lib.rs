pub mod aggregate;
pub mod config;
pub mod engine;
pub mod layer;
pub mod reconciler;
pub mod surface;
pub mod symbology;

pub use aggregate::*;
pub use config::*;
pub use engine::*;
pub use layer::*;
pub use reconciler::*;
pub use surface::*;
pub use symbology::*;
