//! chartjob-core
//!
//! Building blocks for asynchronous chart jobs: an in-process broker, the
//! worker runtime that drains it, the artifact store that holds rendered
//! images until they are fetched, and the chart task itself.
//!
//! # Modules
//! - **domain**: ids, task envelopes, outcomes, artifact handles, progress reports
//! - **ports**: seams to the outside world (ArtifactStore, Clock, IdGenerator)
//! - **impls**: port implementations (FsArtifactStore)
//! - **queue**: the `Queue` trait and its in-memory broker
//! - **runtime** / **worker**: handler registry and the worker group
//! - **chart**: synthetic series and the PNG line-chart renderer
//! - **tasks**: task handlers registered with the runtime
//! - **polling**: client-side polling schedule (bounded, exponential backoff)
//! - **app**: wiring (AppBuilder), background GC, status views

pub mod app;
pub mod chart;
pub mod domain;
pub mod error;
pub mod impls;
pub mod polling;
pub mod ports;
pub mod queue;
pub mod runtime;
pub mod tasks;
pub mod worker;

pub use error::ChartjobError;
