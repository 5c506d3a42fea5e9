pub mod config;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod interval;
pub mod scheduler;
pub mod shutdown;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
