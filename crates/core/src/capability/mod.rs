//! Tools callable from command scripts.
//!
//! A tool is either a builtin wrapping one `World` capability or a script
//! loaded from a YAML tool file. Tools are resolved by name through an
//! immutable [`ToolTable`]; the registry publishes a fresh table on every
//! reload and callers keep whichever generation they captured.

pub mod builtin;
pub mod catalog;
pub mod loader;
pub mod registry;
pub mod reload;
pub mod script;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use vessel_world::{CapabilityError, World};

pub use registry::ToolRegistry;
pub use script::{Script, ScriptError};

/// Descriptive metadata shown in the catalogue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolMeta {
    pub name: String,
    pub description: String,
    /// Parameter name to description.
    pub params: BTreeMap<String, String>,
    pub requires: Vec<String>,
    pub provides: Vec<String>,
    /// First comment line of the tool's script, if any.
    pub note: Option<String>,
}

impl ToolMeta {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn param(mut self, name: &str, description: &str) -> Self {
        self.params.insert(name.to_string(), description.to_string());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unresolved(String),
    #[error("tool {name} failed to load: {reason}")]
    Broken { name: String, reason: String },
    #[error("{tool}: {reason}")]
    Args { tool: String, reason: String },
    #[error("{tool}: {source}")]
    Capability {
        tool: String,
        source: CapabilityError,
    },
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("tool nesting exceeded {0} levels")]
    DepthExceeded(usize),
}

impl ToolError {
    pub fn args(tool: &str, reason: impl Into<String>) -> Self {
        Self::Args { tool: tool.to_string(), reason: reason.into() }
    }

    pub fn capability(tool: &str) -> impl FnOnce(CapabilityError) -> Self + '_ {
        move |source| Self::Capability { tool: tool.to_string(), source }
    }
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn meta(&self) -> ToolMeta;
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Builtin,
    Shared,
    Avatar,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Builtin => "builtin",
            Self::Shared => "shared",
            Self::Avatar => "avatar",
        })
    }
}

/// One resolved name. A broken binding shadows lower tiers: the name stays
/// unresolved until its file loads again or is removed.
#[derive(Clone)]
pub enum Binding {
    Ready { tier: Tier, tool: Arc<dyn Tool> },
    Broken { tier: Tier, reason: String },
}

impl Binding {
    pub fn tier(&self) -> Tier {
        match self {
            Self::Ready { tier, .. } | Self::Broken { tier, .. } => *tier,
        }
    }
}

/// One immutable registry generation.
#[derive(Clone, Default)]
pub struct ToolTable {
    entries: HashMap<String, Binding>,
    generation: u64,
}

impl ToolTable {
    pub fn new(entries: HashMap<String, Binding>, generation: u64) -> Self {
        Self { entries, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        match self.entries.get(name) {
            Some(Binding::Ready { tool, .. }) => Ok(Arc::clone(tool)),
            Some(Binding::Broken { reason, .. }) => Err(ToolError::Broken {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(ToolError::Unresolved(name.to_string())),
        }
    }

    /// Entries sorted by name.
    pub fn sorted(&self) -> Vec<(&str, &Binding)> {
        let mut all: Vec<(&str, &Binding)> =
            self.entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a running tool can reach: the avatar, the table generation the
/// command started with, and its nesting depth.
#[derive(Clone)]
pub struct ToolContext {
    world: Arc<dyn World>,
    table: Arc<ToolTable>,
    depth: usize,
    max_depth: usize,
}

impl ToolContext {
    pub fn new(world: Arc<dyn World>, table: Arc<ToolTable>, max_depth: usize) -> Self {
        Self { world, table, depth: 0, max_depth }
    }

    pub fn world(&self) -> &dyn World {
        self.world.as_ref()
    }

    pub fn table(&self) -> &Arc<ToolTable> {
        &self.table
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self.table.resolve(name)?;
        if self.depth >= self.max_depth {
            return Err(ToolError::DepthExceeded(self.max_depth));
        }
        let nested = Self { depth: self.depth + 1, ..self.clone() };
        tracing::trace!(tool = %name, depth = nested.depth, "invoke");
        tool.call(&nested, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_world::sim::SimWorld;

    struct Echo;

    #[async_trait::async_trait]
    impl Tool for Echo {
        fn meta(&self) -> ToolMeta {
            ToolMeta::new("echo", "returns its arguments")
        }

        async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
            Ok(args)
        }
    }

    fn table() -> Arc<ToolTable> {
        let mut entries = HashMap::new();
        entries.insert("echo".to_string(), Binding::Ready { tier: Tier::Builtin, tool: Arc::new(Echo) });
        entries.insert(
            "bad".to_string(),
            Binding::Broken { tier: Tier::Avatar, reason: "line 1: unexpected token".into() },
        );
        Arc::new(ToolTable::new(entries, 1))
    }

    #[tokio::test]
    async fn invoke_resolves_and_calls() {
        let ctx = ToolContext::new(Arc::new(SimWorld::new("bob")), table(), 8);
        let out = ctx.invoke("echo", serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(out["a"], 1);
    }

    #[tokio::test]
    async fn broken_and_missing_names_fail_resolution() {
        let ctx = ToolContext::new(Arc::new(SimWorld::new("bob")), table(), 8);
        assert!(matches!(ctx.invoke("bad", Value::Null).await, Err(ToolError::Broken { .. })));
        assert!(matches!(ctx.invoke("nope", Value::Null).await, Err(ToolError::Unresolved(_))));
    }

    #[tokio::test]
    async fn depth_limit_applies() {
        let ctx = ToolContext::new(Arc::new(SimWorld::new("bob")), table(), 0);
        assert!(matches!(ctx.invoke("echo", Value::Null).await, Err(ToolError::DepthExceeded(0))));
    }
}
