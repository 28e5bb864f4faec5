mod autoformat;
mod core;
mod editing;
mod format;
mod marks;
mod markup;
mod ops;
mod plugin;
mod position;
mod schema;
mod serde_value;

pub use crate::core::*;
pub use crate::editing::*;
pub use crate::format::*;
pub use crate::marks::*;
pub use crate::markup::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::position::*;
pub use crate::schema::*;
pub use crate::serde_value::*;
