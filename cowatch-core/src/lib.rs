pub mod models;
pub mod repository;
pub mod service;
pub mod transport;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use bootstrap::Services;
pub use config::Config;
pub use error::{Error, Result};
