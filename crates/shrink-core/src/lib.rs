pub mod config;
pub mod error;
pub mod types;

pub use config::ShrinkConfig;
pub use error::{Result, ShrinkError};
pub use types::*;
