//! Read-only analyses of a built graph: dependency structure and cache telemetry.
pub mod telemetry;
pub mod topology;
