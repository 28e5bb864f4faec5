mod adapter;
mod config;
mod content;
mod drag;
mod editor;
mod geometry;
mod host;
mod id;
pub mod logging;
mod registry;
mod scheduler;
mod selection;

pub use adapter::*;
pub use config::*;
pub use content::*;
pub use drag::*;
pub use editor::*;
pub use geometry::*;
pub use host::*;
pub use id::BlockId;
pub use registry::*;
pub use scheduler::*;
pub use selection::*;
