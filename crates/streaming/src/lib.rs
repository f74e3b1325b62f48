pub mod error;
pub mod pipeline;
pub mod retry;
pub mod transport;

pub use error::*;
pub use pipeline::*;
pub use retry::*;
pub use transport::*;
