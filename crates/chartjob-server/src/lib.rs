pub mod bootstrap;
pub mod config;
pub mod error;
pub mod pages;
pub mod router;
pub mod routes;
pub mod state;
