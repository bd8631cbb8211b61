//! Domain model (ids, task envelopes, outcomes, artifact handles, progress).

pub mod artifact;
pub mod ids;
pub mod outcome;
pub mod progress;
pub mod state;
pub mod task;

pub use artifact::ArtifactHandle;
pub use ids::{Id, IdMarker, IdParseError, JobId};
pub use outcome::{Artifact, Outcome, OutcomeKind};
pub use progress::ProgressReport;
pub use state::PublicState;
pub use task::{Task, TaskEnvelope, TaskType};
