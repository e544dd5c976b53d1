use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use super::script::{Script, ScriptError, leading_comment};
use super::{Tool, ToolContext, ToolError, ToolMeta};

#[derive(Debug, thiserror::Error)]
pub enum RegistryLoadError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("compile {path}: {source}")]
    Script {
        path: PathBuf,
        source: ScriptError,
    },
    #[error("{path}: declared name `{declared}` does not match file name")]
    NameMismatch { path: PathBuf, declared: String },
}

/// On-disk shape of a tool file.
#[derive(Debug, Deserialize)]
struct ToolFile {
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    params: BTreeMap<String, String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    provides: Vec<String>,
    script: String,
}

/// A tool defined by a script. Call arguments are bound as variables;
/// declared parameters the caller omitted are bound to `null`.
pub struct ScriptTool {
    meta: ToolMeta,
    script: Script,
}

impl ScriptTool {
    pub fn new(meta: ToolMeta, script: Script) -> Self {
        Self { meta, script }
    }
}

#[async_trait::async_trait]
impl Tool for ScriptTool {
    fn meta(&self) -> ToolMeta {
        self.meta.clone()
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let mut vars = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ToolError::args(&self.meta.name, "arguments must be an object")),
        };
        for param in self.meta.params.keys() {
            vars.entry(param.clone()).or_insert(Value::Null);
        }
        self.script.run(ctx, vars).await
    }
}

/// Registry key for a tool file: its stem, for `.yaml`/`.yml` files only.
pub fn tool_key(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !matches!(ext, "yaml" | "yml") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    (!stem.starts_with('.')).then(|| stem.to_string())
}

pub fn load_tool_file(path: &Path) -> Result<ScriptTool, RegistryLoadError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| RegistryLoadError::Io { path: path.to_path_buf(), source })?;
    parse_tool(path, &raw)
}

fn parse_tool(path: &Path, raw: &str) -> Result<ScriptTool, RegistryLoadError> {
    let file: ToolFile = serde_yaml::from_str(raw)
        .map_err(|source| RegistryLoadError::Yaml { path: path.to_path_buf(), source })?;
    let key = tool_key(path).unwrap_or_default();
    if let Some(declared) = file.name
        && declared != key
    {
        return Err(RegistryLoadError::NameMismatch { path: path.to_path_buf(), declared });
    }
    let script = Script::parse(&file.script)
        .map_err(|source| RegistryLoadError::Script { path: path.to_path_buf(), source })?;
    let meta = ToolMeta {
        name: key,
        description: file.description,
        params: file.params,
        requires: file.requires,
        provides: file.provides,
        note: leading_comment(&file.script),
    };
    Ok(ScriptTool::new(meta, script))
}

/// Every tool file directly inside `dir`, sorted by path. A missing
/// directory is empty.
pub fn scan_dir(dir: &Path) -> Result<Vec<(String, PathBuf)>, RegistryLoadError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(RegistryLoadError::Io { path: dir.to_path_buf(), source }),
    };
    let mut found: Vec<(String, PathBuf)> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| tool_key(&p).map(|k| (k, p)))
        .collect();
    found.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(found)
}
