//! Port implementations.
//!
//! - **FsArtifactStore**: artifacts as files under a local directory

pub mod fs_artifact;

pub use self::fs_artifact::FsArtifactStore;
