pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod progress;
pub mod result;
pub mod runner;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use progress::{NoopProgress, ProgressReporter, StoreProgress};
pub use result::ResultTab;
pub use runner::Pipeline;
