use serde_json::{Value, json};
use vessel_world::EquipSlot;

use super::text;
use crate::capability::{Tool, ToolContext, ToolError, ToolMeta};

pub struct Equip;

#[async_trait::async_trait]
impl Tool for Equip {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("equip", "Equip an inventory item")
            .param("item", "item name")
            .param("slot", "hand, head, torso, legs or feet; default hand")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let item = text("equip", &args, "item")?;
        let slot = match args.get("slot").and_then(Value::as_str) {
            Some(s) => s.parse().map_err(ToolError::capability("equip"))?,
            None => EquipSlot::Hand,
        };
        ctx.world().equip(item, slot).await.map_err(ToolError::capability("equip"))?;
        Ok(Value::Null)
    }
}

pub struct Consume;

#[async_trait::async_trait]
impl Tool for Consume {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("consume", "Eat the held item; returns the new food level")
    }

    async fn call(&self, ctx: &ToolContext, _args: Value) -> Result<Value, ToolError> {
        ctx.world().consume().await.map_err(ToolError::capability("consume"))?;
        Ok(json!(ctx.world().food()))
    }
}

pub struct Inventory;

#[async_trait::async_trait]
impl Tool for Inventory {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("inventory", "Inventory as a list of {name, count}")
    }

    async fn call(&self, ctx: &ToolContext, _args: Value) -> Result<Value, ToolError> {
        let stacks: Vec<Value> = ctx
            .world()
            .inventory()
            .into_iter()
            .map(|s| json!({"name": s.name, "count": s.count}))
            .collect();
        Ok(Value::Array(stacks))
    }
}

pub struct Count;

#[async_trait::async_trait]
impl Tool for Count {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("count", "How many of an item the avatar holds").param("item", "item name")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let item = text("count", &args, "item")?;
        let total: u32 = ctx
            .world()
            .inventory()
            .iter()
            .filter(|s| s.name == item)
            .map(|s| s.count)
            .sum();
        Ok(json!(total))
    }
}
