//! Safe SQL builder: identifiers from the resource schema only, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
