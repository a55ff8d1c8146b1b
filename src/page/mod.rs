pub mod tracker;
pub mod types;

pub use tracker::*;
pub use types::*;
