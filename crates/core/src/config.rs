use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// All vessel control parameters. Loaded from the avatar's `config.json`;
/// keys missing from the file keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselCfg {
    // identity
    /// In-world account name. Falls back to the avatar name when unset.
    pub username: Option<String>,

    // command execution
    pub mailbox_poll_ms: u64,
    pub action_timeout_ms: u64,
    pub settle_ms: u64,
    pub max_tool_depth: usize,

    // outcome report
    pub nearby_radius: f64,
    pub nearby_limit: usize,

    // combat reflex
    pub combat_poll_ms: u64,
    pub combat_radius: f64,
    pub hurt_attacker_radius: f64,
    pub combat_health_floor: f32,
    pub combat_cooldown_ms: u64,
    pub flee_distance: f64,
    pub flee_sprint_ms: u64,

    // hunger reflex
    pub hunger_poll_ms: u64,
    pub hunger_threshold: u32,
    pub meal_cooldown_ms: u64,

    // shelter reflex
    pub shelter_poll_ms: u64,
    pub shelter_health_floor: f32,
    pub shelter_hostile_radius: f64,
    pub shelter_depth: i32,
    pub dig_pause_ms: u64,
    pub night_start: u32,
    pub night_end: u32,

    // reflex bounds
    pub reflex_action_timeout_ms: u64,
    pub reflex_cooldown_ms: u64,

    // journals
    pub log_capacity: usize,

    // lifecycle
    pub respawn_delay_ms: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for VesselCfg {
    fn default() -> Self {
        Self {
            username: None,
            mailbox_poll_ms: 500,
            action_timeout_ms: 120_000,
            settle_ms: 500,
            max_tool_depth: 8,
            nearby_radius: 16.0,
            nearby_limit: 5,
            combat_poll_ms: 500,
            combat_radius: 5.0,
            hurt_attacker_radius: 6.0,
            combat_health_floor: 6.0,
            combat_cooldown_ms: 2000,
            flee_distance: 20.0,
            flee_sprint_ms: 5000,
            hunger_poll_ms: 5000,
            hunger_threshold: 14,
            meal_cooldown_ms: 10_000,
            shelter_poll_ms: 10_000,
            shelter_health_floor: 10.0,
            shelter_hostile_radius: 10.0,
            shelter_depth: 4,
            dig_pause_ms: 200,
            night_start: 13_000,
            night_end: 23_000,
            reflex_action_timeout_ms: 10_000,
            reflex_cooldown_ms: 500,
            log_capacity: 20,
            respawn_delay_ms: 1000,
            shutdown_timeout_secs: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl VesselCfg {
    /// Load from a flat JSON object. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io { path: path.display().to_string(), source });
            }
        };
        let obj: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;

        let map: HashMap<String, String> = obj
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect();
        Ok(Self::from_map(&map))
    }

    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            username: m.get("username").filter(|u| !u.trim().is_empty()).cloned().or(d.username),
            mailbox_poll_ms: get_or(m, "mailbox_poll_ms", d.mailbox_poll_ms),
            action_timeout_ms: get_or(m, "action_timeout_ms", d.action_timeout_ms),
            settle_ms: get_or(m, "settle_ms", d.settle_ms),
            max_tool_depth: get_or(m, "max_tool_depth", d.max_tool_depth),
            nearby_radius: get_or(m, "nearby_radius", d.nearby_radius),
            nearby_limit: get_or(m, "nearby_limit", d.nearby_limit),
            combat_poll_ms: get_or(m, "combat_poll_ms", d.combat_poll_ms),
            combat_radius: get_or(m, "combat_radius", d.combat_radius),
            hurt_attacker_radius: get_or(m, "hurt_attacker_radius", d.hurt_attacker_radius),
            combat_health_floor: get_or(m, "combat_health_floor", d.combat_health_floor),
            combat_cooldown_ms: get_or(m, "combat_cooldown_ms", d.combat_cooldown_ms),
            flee_distance: get_or(m, "flee_distance", d.flee_distance),
            flee_sprint_ms: get_or(m, "flee_sprint_ms", d.flee_sprint_ms),
            hunger_poll_ms: get_or(m, "hunger_poll_ms", d.hunger_poll_ms),
            hunger_threshold: get_or(m, "hunger_threshold", d.hunger_threshold),
            meal_cooldown_ms: get_or(m, "meal_cooldown_ms", d.meal_cooldown_ms),
            shelter_poll_ms: get_or(m, "shelter_poll_ms", d.shelter_poll_ms),
            shelter_health_floor: get_or(m, "shelter_health_floor", d.shelter_health_floor),
            shelter_hostile_radius: get_or(m, "shelter_hostile_radius", d.shelter_hostile_radius),
            shelter_depth: get_or(m, "shelter_depth", d.shelter_depth),
            dig_pause_ms: get_or(m, "dig_pause_ms", d.dig_pause_ms),
            night_start: get_or(m, "night_start", d.night_start),
            night_end: get_or(m, "night_end", d.night_end),
            reflex_action_timeout_ms: get_or(m, "reflex_action_timeout_ms", d.reflex_action_timeout_ms),
            reflex_cooldown_ms: get_or(m, "reflex_cooldown_ms", d.reflex_cooldown_ms),
            log_capacity: get_or(m, "log_capacity", d.log_capacity),
            respawn_delay_ms: get_or(m, "respawn_delay_ms", d.respawn_delay_ms),
            shutdown_timeout_secs: get_or(m, "shutdown_timeout_secs", d.shutdown_timeout_secs),
        }
    }

    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            (
                "username",
                self.username.clone().unwrap_or_else(|| "(avatar name)".into()),
                "In-world account name",
            ),
            ("mailbox_poll_ms", self.mailbox_poll_ms.to_string(), "Inbox poll interval ms"),
            ("action_timeout_ms", self.action_timeout_ms.to_string(), "Hard deadline per command ms"),
            ("settle_ms", self.settle_ms.to_string(), "Pause before the after-snapshot ms"),
            ("max_tool_depth", self.max_tool_depth.to_string(), "Max nested tool calls"),
            ("nearby_radius", self.nearby_radius.to_string(), "Nearby entity report radius"),
            ("nearby_limit", self.nearby_limit.to_string(), "Max nearby entities reported"),
            ("combat_poll_ms", self.combat_poll_ms.to_string(), "Combat watcher interval ms"),
            ("combat_radius", self.combat_radius.to_string(), "Hostile engagement radius"),
            ("hurt_attacker_radius", self.hurt_attacker_radius.to_string(), "Attacker search radius on damage"),
            ("combat_health_floor", self.combat_health_floor.to_string(), "Flee at or below this health"),
            ("combat_cooldown_ms", self.combat_cooldown_ms.to_string(), "Combat token hold after trigger ms"),
            ("flee_distance", self.flee_distance.to_string(), "Flee goal distance"),
            ("flee_sprint_ms", self.flee_sprint_ms.to_string(), "Sprint duration while fleeing ms"),
            ("hunger_poll_ms", self.hunger_poll_ms.to_string(), "Hunger watcher interval ms"),
            ("hunger_threshold", self.hunger_threshold.to_string(), "Eat below this food level"),
            ("meal_cooldown_ms", self.meal_cooldown_ms.to_string(), "Minimum time between meals ms"),
            ("shelter_poll_ms", self.shelter_poll_ms.to_string(), "Shelter watcher interval ms"),
            ("shelter_health_floor", self.shelter_health_floor.to_string(), "Shelter below this health"),
            ("shelter_hostile_radius", self.shelter_hostile_radius.to_string(), "Hostile radius for shelter"),
            ("shelter_depth", self.shelter_depth.to_string(), "Blocks dug for emergency shelter"),
            ("dig_pause_ms", self.dig_pause_ms.to_string(), "Pause between shelter digs ms"),
            ("night_start", self.night_start.to_string(), "Night begins after this time of day"),
            ("night_end", self.night_end.to_string(), "Night ends before this time of day"),
            ("reflex_action_timeout_ms", self.reflex_action_timeout_ms.to_string(), "Deadline for one reflex action ms"),
            ("reflex_cooldown_ms", self.reflex_cooldown_ms.to_string(), "Hunger and shelter token hold after action ms"),
            ("log_capacity", self.log_capacity.to_string(), "Event and chat log length"),
            ("respawn_delay_ms", self.respawn_delay_ms.to_string(), "Delay before respawn after death ms"),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs.to_string(), "Graceful shutdown timeout seconds"),
        ]
    }

    /// The configured account name, or `avatar` when none is set.
    pub fn username_for(&self, avatar: &str) -> String {
        self.username.clone().unwrap_or_else(|| avatar.to_string())
    }

    pub fn mailbox_poll(&self) -> Duration {
        Duration::from_millis(self.mailbox_poll_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
