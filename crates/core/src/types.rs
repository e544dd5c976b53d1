use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vessel_world::Vec3;

// ── Commands ───────────────────────────────────────────────────

/// An operator action script taken from the mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub script: String,
    pub taken_at: DateTime<Utc>,
}

impl Command {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            script: script.into(),
            taken_at: Utc::now(),
        }
    }

    /// First line of the script, for log lines.
    pub fn preview(&self) -> &str {
        self.script.lines().next().unwrap_or("")
    }
}

/// Result record of one executed command. Written to `outbox.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub position: Vec3,
    /// `"15/20"`, with `" (was 18)"` appended when it changed.
    pub health: String,
    pub food: String,
    /// `"no"` or `"<n> blocks"`.
    pub moved: String,
    pub inventory: Vec<String>,
    pub inventory_changed: bool,
    pub time: u32,
    pub nearby_entities: Vec<String>,
}

// ── Status ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarState {
    Idle,
    Executing,
    Dead,
    Error,
    Disconnected,
}

impl std::fmt::Display for AvatarState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Executing => "executing",
            Self::Dead => "dead",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Live status written to `status.json` on every state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: AvatarState,
    pub health: f32,
    pub food: u32,
    pub position: Vec3,
    pub time: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Journal entries ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflexAction {
    Fight,
    Flee,
}

/// Notable things that happened to the avatar, newest last in `events.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventKind {
    Chat {
        from: String,
        message: String,
    },
    Whisper {
        from: String,
        message: String,
    },
    Reflex {
        action: ReflexAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weapon: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        health: Option<f32>,
    },
    AutoEat {
        item: String,
        food: u32,
    },
    AutoShelter {
        health: f32,
        /// World time of day; the entry's own `time` is the wall clock.
        #[serde(rename = "worldTime")]
        world_time: u32,
    },
    Hurt {
        by: String,
        health: f32,
    },
    Death,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Local wall-clock `HH:MM:SS`.
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub from: String,
    pub message: String,
    pub time: String,
}

/// Wall-clock stamp used on journal entries.
pub fn clock_stamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
