pub mod callback;
pub mod dispatch;
pub mod function;
pub mod metrics;

pub use callback::*;
pub use dispatch::*;
pub use function::*;
