//! Infrastructure layer: transport bindings and process-level plumbing.

pub mod bluetooth;
pub mod logging;
