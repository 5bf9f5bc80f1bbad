pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod queue;
pub mod reconcile;
pub mod scanner;
pub mod storage;

pub use config::{load_configuration, AppConfig};
pub use engine::{process_scan, ScanSettings};
pub use error::{Error, Result};
pub use queue::ScanQueue;
pub use reconcile::{reconcile, DesiredAsset, ReconcileStats};
pub use storage::{CatalogStore, Database};
