pub mod rebuild;

pub use rebuild::{RebuildJob, RebuildJobConfig, RebuildJobStats};
