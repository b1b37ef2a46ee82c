pub mod controls;
pub mod dashboard;
pub mod error;
pub mod groups;
pub mod layout;
pub mod session;

pub use controls::*;
pub use dashboard::*;
pub use error::*;
pub use groups::*;
pub use layout::*;
pub use session::*;
