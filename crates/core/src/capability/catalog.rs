//! Markdown listing of every tool a script can call.

use std::fmt::Write;

use super::{Binding, ToolTable};

pub fn render(table: &ToolTable) -> String {
    let mut out = String::from("# Tools\n");
    for (name, binding) in table.sorted() {
        let _ = write!(out, "\n## {name}\n\n");
        match binding {
            Binding::Broken { tier, reason } => {
                let _ = writeln!(out, "_{tier}_ **failed to load:** {reason}");
            }
            Binding::Ready { tier, tool } => {
                let meta = tool.meta();
                let summary = if !meta.description.is_empty() {
                    meta.description.as_str()
                } else {
                    meta.note.as_deref().unwrap_or("(no description)")
                };
                let _ = writeln!(out, "_{tier}_ {summary}");
                if !meta.params.is_empty() {
                    out.push_str("\n| param | description |\n|---|---|\n");
                    for (param, desc) in &meta.params {
                        let _ = writeln!(out, "| `{param}` | {desc} |");
                    }
                }
                if !meta.requires.is_empty() {
                    let _ = writeln!(out, "\nRequires: {}", meta.requires.join(", "));
                }
                if !meta.provides.is_empty() {
                    let _ = writeln!(out, "\nProvides: {}", meta.provides.join(", "));
                }
            }
        }
    }
    out
}
