//! JSON snapshots of a graph's structure.
//!
//! Only the arena and the expression registration order are written. Variable
//! values, dirty flags and caches are evaluation state and are never persisted:
//! a loaded context starts with every variable unset.
use crate::context::{ContextError, EvaluationContext};
use crate::store::{NodeId, Registry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

const FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("Inconsistent snapshot: {0}")]
    Invalid(#[from] ContextError),
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    registry: &'a Registry,
    expressions: &'a [NodeId],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    registry: Registry,
    expressions: Vec<NodeId>,
}

pub fn to_json(ctx: &EvaluationContext) -> Result<String, SnapshotError> {
    let snapshot = SnapshotRef {
        version: FORMAT_VERSION,
        registry: ctx.registry(),
        expressions: ctx.registration_order(),
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

pub fn from_json(json: &str) -> Result<EvaluationContext, SnapshotError> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    if snapshot.version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }
    Ok(EvaluationContext::from_parts(snapshot.registry, &snapshot.expressions)?)
}

pub fn save(ctx: &EvaluationContext, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    fs::write(path, to_json(ctx)?)?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<EvaluationContext, SnapshotError> {
    from_json(&fs::read_to_string(path)?)
}
