use std::time::Duration;

use serde_json::{Value, json};

use super::{num, num_or, point};
use crate::capability::{Tool, ToolContext, ToolError, ToolMeta};

pub struct MoveNear;

#[async_trait::async_trait]
impl Tool for MoveNear {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("move_near", "Walk until within `tolerance` blocks of a point")
            .param("x", "target x")
            .param("y", "target y")
            .param("z", "target z")
            .param("tolerance", "arrival distance, default 1")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let target = point("move_near", &args)?;
        let tolerance = num_or(&args, "tolerance", 1.0);
        ctx.world()
            .move_near(target, tolerance)
            .await
            .map_err(ToolError::capability("move_near"))?;
        Ok(Value::Null)
    }
}

pub struct LookAt;

#[async_trait::async_trait]
impl Tool for LookAt {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("look_at", "Turn to face a point")
            .param("x", "point x")
            .param("y", "point y")
            .param("z", "point z")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let target = point("look_at", &args)?;
        ctx.world().look_at(target).await.map_err(ToolError::capability("look_at"))?;
        Ok(Value::Null)
    }
}

pub struct Position;

#[async_trait::async_trait]
impl Tool for Position {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("position", "Current position as {x, y, z}")
    }

    async fn call(&self, ctx: &ToolContext, _args: Value) -> Result<Value, ToolError> {
        let p = ctx.world().position();
        Ok(json!({"x": p.x, "y": p.y, "z": p.z}))
    }
}

pub struct Wait;

#[async_trait::async_trait]
impl Tool for Wait {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("wait", "Do nothing for a while").param("ms", "milliseconds")
    }

    async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let ms = num("wait", &args, "ms")?;
        if ms < 0.0 {
            return Err(ToolError::args("wait", "`ms` must not be negative"));
        }
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        Ok(Value::Null)
    }
}
