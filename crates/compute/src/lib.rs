pub mod align;
pub mod analysis;
pub mod dataset;
pub mod pipeline;

pub use align::*;
pub use analysis::statistics::Statistics;
pub use dataset::*;
pub use pipeline::*;
