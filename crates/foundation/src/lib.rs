pub mod bounds;
pub mod grid;
pub mod ids;
pub mod tile;
pub mod value;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use grid::*;
pub use ids::*;
pub use tile::*;
pub use value::*;
