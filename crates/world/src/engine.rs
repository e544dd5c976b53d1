use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ── Geometry ────────────────────────────────────────────────────

/// A point in continuous world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(self, other: Vec3) -> f64 {
        self.minus(other).length()
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn minus(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn plus(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scaled(self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }

    /// Unit vector in the same direction. A zero vector stays zero.
    pub fn normalize(self) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            return self;
        }
        self.scaled(1.0 / len)
    }

    /// The block containing this point.
    pub fn floored(self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Centre of the block's footprint at floor height.
    pub fn center(self) -> Vec3 {
        Vec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y),
            f64::from(self.z) + 0.5,
        )
    }
}

// ── World objects ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

pub type EntityId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Mob,
    Player,
    Object,
    Other,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mob => "mob",
            Self::Player => "player",
            Self::Object => "object",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Another entity visible to the avatar. The avatar itself is never listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub pos: BlockPos,
    pub diggable: bool,
}

impl Block {
    pub fn is_air(&self) -> bool {
        matches!(self.name.as_str(), "air" | "cave_air" | "void_air")
    }

    /// True for blocks another block can be placed against.
    pub fn is_solid(&self) -> bool {
        !self.is_air() && !matches!(self.name.as_str(), "water" | "lava" | "flowing_water" | "flowing_lava")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipSlot {
    #[default]
    Hand,
    Head,
    Torso,
    Legs,
    Feet,
}

impl std::str::FromStr for EquipSlot {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hand" => Ok(Self::Hand),
            "head" => Ok(Self::Head),
            "torso" => Ok(Self::Torso),
            "legs" => Ok(Self::Legs),
            "feet" => Ok(Self::Feet),
            other => Err(CapabilityError::InvalidTarget(format!("unknown slot {other}"))),
        }
    }
}

/// A navigation goal: get within `tolerance` of `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub target: Vec3,
    pub tolerance: f64,
}

/// Asynchronous notifications from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Spawned,
    Chat { from: String, message: String },
    Whisper { from: String, message: String },
    /// The avatar took damage.
    Hurt,
    Death,
    /// Recoverable engine error.
    Error(String),
    /// Session ended by the server.
    Kicked(String),
    /// Connection closed.
    Ended(String),
}

/// An engine-level rejection of a capability call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("target unreachable: {0}")]
    Unreachable(String),
    #[error("missing item: {0}")]
    MissingItem(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("not connected")]
    Disconnected,
}

// ── Capability interface ────────────────────────────────────────

/// The live avatar handle. Queries are cheap reads of the engine's cached
/// state; actions may suspend until the engine reports completion.
#[async_trait::async_trait]
pub trait World: Send + Sync {
    fn username(&self) -> &str;

    fn position(&self) -> Vec3;
    fn health(&self) -> f32;
    fn food(&self) -> u32;
    /// Ticks since dawn, 0..24000.
    fn time_of_day(&self) -> u32;
    fn inventory(&self) -> Vec<ItemStack>;
    fn entities(&self) -> Vec<Entity>;
    fn block_at(&self, pos: BlockPos) -> Option<Block>;
    fn light_level(&self, pos: BlockPos) -> Option<u8>;

    /// Replace the navigation goal without waiting for arrival. `None` stops.
    fn set_goal(&self, goal: Option<Goal>);
    fn set_sprint(&self, on: bool);

    async fn move_near(&self, target: Vec3, tolerance: f64) -> Result<(), CapabilityError>;
    async fn dig(&self, pos: BlockPos) -> Result<(), CapabilityError>;
    /// Place the held block against `reference` on the side given by `face`.
    async fn place(&self, reference: BlockPos, face: BlockPos) -> Result<(), CapabilityError>;
    async fn equip(&self, item: &str, slot: EquipSlot) -> Result<(), CapabilityError>;
    async fn attack(&self, entity: EntityId) -> Result<(), CapabilityError>;
    /// Consume the held item.
    async fn consume(&self) -> Result<(), CapabilityError>;
    async fn look_at(&self, point: Vec3) -> Result<(), CapabilityError>;
    async fn chat(&self, message: &str) -> Result<(), CapabilityError>;
    async fn respawn(&self) -> Result<(), CapabilityError>;

    fn subscribe(&self) -> broadcast::Receiver<WorldEvent>;
}
