//! Sandbox module containing the runtime and its collaborators.

pub mod api;
pub mod cache;
pub mod config;
pub mod events;
pub mod io;
pub mod limits;
pub mod loader;
pub mod native;
pub mod report;
pub mod resolver;
pub mod runtime;
pub mod transform;
