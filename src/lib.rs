pub mod error;
pub mod exporters;
pub mod hash;
pub mod host;
pub mod instancing;
pub mod motion;
pub mod registry;
pub mod render;
pub mod session;
pub mod shading;
pub mod target;
pub mod utils;

pub use error::{ExportError, ExportResult, ExportStatus};
pub use session::{SessionManager, SessionMode, SessionOptions};
