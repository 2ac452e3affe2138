pub mod config;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod io;
pub mod labels;
pub mod percent;
pub mod pipeline;
pub mod record;
pub mod reshape;

pub use config::{MalformedPolicy, PipelineConfig};
pub use error::CleanError;
pub use labels::LabelTable;
pub use pipeline::{clean, RunReport};
pub use record::{CleanVariantRecord, LineageLabel, RawVariantRecord};
