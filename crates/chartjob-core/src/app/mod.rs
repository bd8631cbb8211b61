//! Application layer: wiring, background maintenance and status views.
//!
//! - **AppBuilder**: registers handlers, validates them, starts workers
//! - **GcLoop**: expires artifacts and forgets old finished jobs
//! - **QueueCounts**: per-state job counts for health reporting

pub mod builder;
pub mod gc_loop;
pub mod status;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::gc_loop::{GcHandle, GcLoop, GcReport};
pub use self::status::QueueCounts;
