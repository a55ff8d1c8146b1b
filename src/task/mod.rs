pub mod config_service;
pub mod factory;
pub mod manager;
pub mod types;

#[cfg(test)]
mod tests;

pub use config_service::*;
pub use factory::*;
pub use manager::*;
pub use types::*;
