//! Testing utilities for dumpbeam pipelines.
//!
//! - **Fixtures**: dump lines and temporary dump files ([`DumpFixture`])
//! - **Stages**: [`RecordingStage`] logs every lifecycle call into an
//!   [`EventLog`] and can be told to fail at any step
//! - **Assertions**: chunk coverage and stage-result counts
//!
//! # Quick Start
//!
//! ```no_run
//! use dumpbeam::stage::{base_context_factory, stage_factory};
//! use dumpbeam::testing::*;
//! use dumpbeam::worker::run_worker;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dump = DumpFixture::new(&edition_lines(10))?;
//! let log = EventLog::new();
//! let stage = RecordingStage::new("probe", &log);
//! run_worker(
//!     dump.path(),
//!     0,
//!     dump.size()?,
//!     4,
//!     &[stage_factory(move || stage.clone())],
//!     &[base_context_factory()],
//! )?;
//! assert_eq!(log.matching("batch:").len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod stages;

pub use assertions::*;
pub use fixtures::*;
pub use stages::*;
