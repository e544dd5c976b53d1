use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::watch;
use vessel_world::World;

use super::loader::{self, tool_key};
use super::{Binding, Tier, Tool, ToolContext, ToolError, ToolTable, builtin};
use crate::io::AvatarPaths;

/// A file-tier entry: the compiled tool or the reason it failed to load.
type Slot = Result<Arc<dyn Tool>, String>;

#[derive(Default)]
struct Tiers {
    builtin: Vec<Arc<dyn Tool>>,
    shared: HashMap<String, Slot>,
    avatar: HashMap<String, Slot>,
    generation: u64,
}

impl Tiers {
    fn file_tier(&mut self, tier: Tier) -> &mut HashMap<String, Slot> {
        match tier {
            Tier::Shared => &mut self.shared,
            _ => &mut self.avatar,
        }
    }

    fn build(&mut self) -> ToolTable {
        self.generation += 1;
        let mut entries: HashMap<String, Binding> = self
            .builtin
            .iter()
            .map(|t| (t.meta().name, Binding::Ready { tier: Tier::Builtin, tool: Arc::clone(t) }))
            .collect();
        for (tier, slots) in [(Tier::Shared, &self.shared), (Tier::Avatar, &self.avatar)] {
            for (name, slot) in slots {
                let binding = match slot {
                    Ok(tool) => Binding::Ready { tier, tool: Arc::clone(tool) },
                    Err(reason) => Binding::Broken { tier, reason: reason.clone() },
                };
                entries.insert(name.clone(), binding);
            }
        }
        ToolTable::new(entries, self.generation)
    }
}

/// Counts from a full load, for the startup log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: usize,
}

/// Three-tier tool registry: builtins, then `<root>/shared/tools`, then the
/// avatar's own `tools/`. Later tiers shadow earlier ones by name.
///
/// Every change publishes a new immutable [`ToolTable`]; readers take an
/// `Arc` to the current one and are never affected by later reloads.
pub struct ToolRegistry {
    shared_dir: PathBuf,
    avatar_dir: PathBuf,
    max_depth: usize,
    tiers: Mutex<Tiers>,
    tx: watch::Sender<Arc<ToolTable>>,
}

impl ToolRegistry {
    /// Registry holding only the builtins. Call [`load`](Self::load)
    /// to read the file tiers.
    pub fn new(paths: &AvatarPaths, max_depth: usize) -> Self {
        Self::with_builtins(paths.shared_tools_dir(), paths.tools_dir(), builtin::all(), max_depth)
    }

    pub fn with_builtins(
        shared_dir: PathBuf,
        avatar_dir: PathBuf,
        builtins: Vec<Arc<dyn Tool>>,
        max_depth: usize,
    ) -> Self {
        let mut tiers = Tiers { builtin: builtins, ..Tiers::default() };
        let (tx, _) = watch::channel(Arc::new(tiers.build()));
        Self {
            shared_dir,
            avatar_dir,
            max_depth,
            tiers: Mutex::new(tiers),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tiers> {
        self.tiers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn avatar_dir(&self) -> &Path {
        &self.avatar_dir
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Re-read both file tiers from scratch and publish one new generation.
    pub fn load(&self) -> LoadSummary {
        let mut summary = LoadSummary::default();
        let shared = load_dir(&self.shared_dir, Tier::Shared, &mut summary);
        let avatar = load_dir(&self.avatar_dir, Tier::Avatar, &mut summary);

        let mut tiers = self.lock();
        tiers.shared = shared;
        tiers.avatar = avatar;
        self.publish(&mut tiers);
        tracing::info!(
            loaded = summary.loaded,
            failed = summary.failed,
            generation = tiers.generation,
            "tool registry loaded"
        );
        summary
    }

    /// React to a change of one avatar-tier file: recompile it if it exists,
    /// drop it otherwise. Returns the affected name, or `None` when the path
    /// is not a tool file.
    pub fn reload_avatar_file(&self, path: &Path) -> Option<String> {
        let name = tool_key(path)?;
        if path.is_file() {
            let slot = compile(path, &name, Tier::Avatar);
            if slot.is_ok() {
                tracing::info!(tool = %name, "tool reloaded");
            }
            self.upsert(Tier::Avatar, &name, slot);
        } else if self.remove(Tier::Avatar, &name) {
            tracing::info!(tool = %name, "tool removed");
        }
        Some(name)
    }

    fn upsert(&self, tier: Tier, name: &str, slot: Slot) {
        let mut tiers = self.lock();
        tiers.file_tier(tier).insert(name.to_string(), slot);
        self.publish(&mut tiers);
    }

    /// Drop a file-tier entry, uncovering any lower tier of the same name.
    pub fn remove(&self, tier: Tier, name: &str) -> bool {
        let mut tiers = self.lock();
        let removed = tiers.file_tier(tier).remove(name).is_some();
        if removed {
            self.publish(&mut tiers);
        }
        removed
    }

    fn publish(&self, tiers: &mut Tiers) {
        self.tx.send_replace(Arc::new(tiers.build()));
    }

    /// The current generation.
    pub fn snapshot(&self) -> Arc<ToolTable> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ToolTable>> {
        self.tx.subscribe()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.snapshot().resolve(name)
    }

    /// A call context bound to `world` and the current generation.
    pub fn context(&self, world: Arc<dyn World>) -> ToolContext {
        ToolContext::new(world, self.snapshot(), self.max_depth)
    }

    pub async fn invoke(&self, world: Arc<dyn World>, name: &str, args: Value) -> Result<Value, ToolError> {
        self.context(world).invoke(name, args).await
    }
}

fn compile(path: &Path, name: &str, tier: Tier) -> Slot {
    match loader::load_tool_file(path) {
        Ok(tool) => Ok(Arc::new(tool) as Arc<dyn Tool>),
        Err(e) => {
            tracing::warn!(tool = %name, tier = %tier, error = %e, "tool failed to load");
            Err(e.to_string())
        }
    }
}

fn load_dir(dir: &Path, tier: Tier, summary: &mut LoadSummary) -> HashMap<String, Slot> {
    let files = match loader::scan_dir(dir) {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(tier = %tier, error = %e, "tool directory unreadable");
            return HashMap::new();
        }
    };
    files
        .into_iter()
        .map(|(name, path)| {
            let slot = compile(&path, &name, tier);
            match slot {
                Ok(_) => summary.loaded += 1,
                Err(_) => summary.failed += 1,
            }
            (name, slot)
        })
        .collect()
}
