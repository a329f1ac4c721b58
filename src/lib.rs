mod config;
mod distributor;
mod error;
mod inspect;
mod job;
pub mod key;
mod run_log;
mod sink;
mod size;

pub use config::{AllowList, Limits, SplitConfig};
pub use distributor::{split_reader, RowDistributor, SplitSummary};
pub use error::{Error, Result};
pub use inspect::{inspect_reader, DEFAULT_INSPECT_ROWS};
pub use job::{run, SplitJob, SplitOutcome};
pub use run_log::{log_path, RunLog};
pub use sink::CompletedFile;
pub use size::ByteSize;

pub use csv;
