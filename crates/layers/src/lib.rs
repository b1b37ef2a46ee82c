pub mod layer;
pub mod raster;
pub mod symbology;

pub use layer::*;
pub use raster::*;
pub use symbology::*;
