//! Line-oriented command scripts.
//!
//! ```text
//! # comment
//! move_near {"x": 10, "y": 64, "z": -3}
//! let logs = count {"item": "oak_log"}
//! return {"logs": "$logs"}
//! ```
//!
//! A call's value becomes the running result; `return` stops early. A JSON
//! string that is exactly `"$name"` is replaced by the bound variable.

use serde_json::{Map, Value};

use super::{ToolContext, ToolError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("line {line}: unbound variable ${name}")]
    Unbound { line: usize, name: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Call {
        line: usize,
        bind: Option<String>,
        tool: String,
        args: Value,
    },
    Return {
        line: usize,
        value: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl std::str::FromStr for Script {
    type Err = ScriptError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        Self::parse(src)
    }
}

impl Script {
    pub fn parse(src: &str) -> Result<Self, ScriptError> {
        let mut steps = Vec::new();
        for (idx, raw) in src.lines().enumerate() {
            let line = idx + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            steps.push(parse_step(line, text)?);
        }
        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of every tool the script calls, in order of appearance.
    pub fn calls(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| match s {
            Step::Call { tool, .. } => Some(tool.as_str()),
            Step::Return { .. } => None,
        })
    }

    /// Run against `ctx` with `vars` pre-bound.
    pub async fn run(&self, ctx: &ToolContext, mut vars: Map<String, Value>) -> Result<Value, ToolError> {
        let mut last = Value::Null;
        for step in &self.steps {
            match step {
                Step::Call { line, bind, tool, args } => {
                    let args = substitute(args, &vars, *line)?;
                    last = ctx.invoke(tool, args).await?;
                    if let Some(var) = bind {
                        vars.insert(var.clone(), last.clone());
                    }
                }
                Step::Return { line, value } => return Ok(substitute(value, &vars, *line)?),
            }
        }
        Ok(last)
    }
}

/// First comment line of a script, without the `#`.
pub fn leading_comment(src: &str) -> Option<String> {
    src.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.strip_prefix('#'))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn parse_step(line: usize, text: &str) -> Result<Step, ScriptError> {
    let err = |reason: String| ScriptError::Parse { line, reason };

    if let Some(rest) = keyword(text, "return") {
        let value = parse_json(rest).map_err(err)?;
        return Ok(Step::Return { line, value });
    }

    let (bind, call) = match keyword(text, "let") {
        Some(rest) => {
            let (var, call) = rest
                .split_once('=')
                .ok_or_else(|| err("expected `let <name> = <tool> [args]`".into()))?;
            let var = var.trim();
            if !is_ident(var) {
                return Err(err(format!("invalid variable name `{var}`")));
            }
            (Some(var.to_string()), call.trim())
        }
        None => (None, text),
    };

    let (tool, rest) = match call.split_once(char::is_whitespace) {
        Some((tool, rest)) => (tool, rest.trim()),
        None => (call, ""),
    };
    if !is_ident(tool) {
        return Err(err(format!("invalid tool name `{tool}`")));
    }
    let args = parse_json(rest).map_err(err)?;
    if !matches!(args, Value::Object(_) | Value::Null) {
        return Err(err("arguments must be a JSON object".into()));
    }
    Ok(Step::Call { line, bind, tool: tool.to_string(), args })
}

/// `text` minus a leading keyword, if it starts with one as a whole word.
fn keyword<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(word)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn parse_json(text: &str) -> Result<Value, String> {
    if text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| format!("bad JSON: {e}"))
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn substitute(value: &Value, vars: &Map<String, Value>, line: usize) -> Result<Value, ScriptError> {
    Ok(match value {
        Value::String(s) => match s.strip_prefix('$').filter(|name| is_ident(name)) {
            Some(name) => vars.get(name).cloned().ok_or_else(|| ScriptError::Unbound {
                line,
                name: name.to_string(),
            })?,
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute(v, vars, line))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), substitute(v, vars, line)?)))
                .collect::<Result<_, ScriptError>>()?,
        ),
        other => other.clone(),
    })
}
