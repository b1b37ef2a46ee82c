pub mod grid_file;

pub use grid_file::*;
