//! # Property Graph Model
//!
//! DTOs for the fixed epidemiological vocabulary. These types cross every
//! boundary: storage ↔ traversal ↔ queries ↔ user.
//!
//! This module is pure data with no I/O and no async.

pub mod node;
pub mod relationship;
pub mod path;
pub mod value;
pub mod property_map;

pub use node::{Label, Node, NodeRef};
pub use relationship::{Direction, RelId, RelType, Relationship};
pub use path::Path;
pub use value::Value;
pub use property_map::{props, PropertyMap};
