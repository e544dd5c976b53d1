//! Primitive tools, one per avatar capability. These form the lowest tier
//! and can be shadowed by tool files of the same name.

pub mod entities;
pub mod items;
pub mod movement;
pub mod terrain;

use std::sync::Arc;

use serde_json::Value;
use vessel_world::{BlockPos, Vec3};

use super::{Tool, ToolError};

/// Every builtin, in registration order.
pub fn all() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(movement::MoveNear),
        Arc::new(movement::LookAt),
        Arc::new(movement::Position),
        Arc::new(movement::Wait),
        Arc::new(terrain::Dig),
        Arc::new(terrain::Place),
        Arc::new(items::Equip),
        Arc::new(items::Consume),
        Arc::new(items::Inventory),
        Arc::new(items::Count),
        Arc::new(entities::Attack),
        Arc::new(entities::Nearby),
        Arc::new(entities::Say),
    ]
}

// ── Argument extraction ──

pub(crate) fn num(tool: &str, args: &Value, key: &str) -> Result<f64, ToolError> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::args(tool, format!("missing number `{key}`")))
}

pub(crate) fn num_or(args: &Value, key: &str, default: f64) -> f64 {
    args.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub(crate) fn text<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::args(tool, format!("missing string `{key}`")))
}

pub(crate) fn point(tool: &str, args: &Value) -> Result<Vec3, ToolError> {
    Ok(Vec3::new(num(tool, args, "x")?, num(tool, args, "y")?, num(tool, args, "z")?))
}

pub(crate) fn block(tool: &str, args: &Value) -> Result<BlockPos, ToolError> {
    Ok(point(tool, args)?.floored())
}
