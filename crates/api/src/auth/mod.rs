//! Project authentication module

pub mod middleware;

#[cfg(test)]
mod middleware_tests;

pub use middleware::{require_project, AuthState, ProjectContext};
