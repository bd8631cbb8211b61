//! Ports: traits at the edges of the core.
//!
//! Each trait hides something the core should not care about the details of
//! (where bytes live, what time it is, how ids are drawn), so tests can swap
//! in deterministic implementations.

pub mod artifact_store;
pub mod clock;
pub mod id_generator;

pub use self::artifact_store::{ArtifactError, ArtifactStore};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
