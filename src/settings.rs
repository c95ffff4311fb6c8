use serde::{Deserialize, Serialize};

pub const DEFAULT_ROWS: usize = 20;
pub const DEFAULT_COLS: usize = 10;
pub const DEFAULT_BASE_INTERVAL_MS: u32 = 500;
pub const MIN_INTERVAL_MS: u32 = 50;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct GameSettings {
    pub rows: usize,
    pub cols: usize,
    pub base_interval_ms: u32,
    pub min_interval_ms: u32,
    pub spawn_column: i32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            base_interval_ms: DEFAULT_BASE_INTERVAL_MS,
            min_interval_ms: MIN_INTERVAL_MS,
            spawn_column: 3,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    /// Store path every room key lives under.
    pub room: String,
    pub guest_name: String,
    pub game: GameSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            room: "rooms/global".to_string(),
            guest_name: "Guest".to_string(),
            game: GameSettings::default(),
        }
    }
}

impl SessionSettings {
    pub fn status_path(&self) -> String {
        format!("{}/status", self.room)
    }

    pub fn players_path(&self) -> String {
        format!("{}/players", self.room)
    }

    pub fn player_path(&self, id: &str) -> String {
        format!("{}/players/{}", self.room, id)
    }

    pub fn attacks_path(&self) -> String {
        format!("{}/attacks", self.room)
    }

    pub fn attack_queue_path(&self, id: &str) -> String {
        format!("{}/attacks/{}", self.room, id)
    }
}
