#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod combine;
pub mod consensus;
pub mod error;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod precision;
pub mod sample_size;
#[path = "../shared/files.rs"]
pub mod shared_files;
pub mod types;
pub mod shared {
    pub use super::shared_files as files;
}

pub use error::MergeError;
pub use pipeline::{RunConfig, RunSummary, run};
