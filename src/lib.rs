pub mod board;
pub mod bot;
pub mod controller;
pub mod error;
pub mod scores;
pub mod session;
pub mod settings;
pub mod shapes;
pub mod store;
pub mod timer;
pub mod wasm;

pub use board::{speed_for_cleared_total, Board, Cell, Piece};
pub use controller::{ControllerEvent, GameController, Phase, RotateDirection};
pub use error::{ScoreError, SessionError, StoreError};
pub use scores::{Leaderboard, RankingEntry, ScoreEndpoint, ScoreSubmission};
pub use session::{JoinOutcome, RoomStatus, SessionCoordinator, SessionPhase};
pub use settings::{GameSettings, SessionSettings};
pub use shapes::Tetromino;
pub use store::{MemoryClient, MemoryStore, SharedStore, Subscription};
