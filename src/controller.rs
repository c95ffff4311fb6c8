use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::board::{speed_for_cleared_total, Board, Piece};
use crate::settings::GameSettings;
use crate::shapes::{Point, Tetromino};
use crate::timer::{TickScheduler, TimerFired};

#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
pub enum Phase {
    Spawning,
    Falling,
    Locking,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerEvent {
    LinesCleared(u32),
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

impl RotateDirection {
    fn step(self) -> i32 {
        match self {
            RotateDirection::Clockwise => 1,
            RotateDirection::CounterClockwise => -1,
        }
    }
}

#[derive(Serialize)]
pub struct ControllerView {
    pub rows: usize,
    pub cols: usize,
    pub field: Vec<u8>,
    pub ghost: Vec<Point>,
    pub next: Tetromino,
    pub next_blocks: Vec<Point>,
    pub next_color: String,
    pub cleared_lines: u32,
    pub tick_interval_ms: u32,
    pub paused: bool,
    pub game_over: bool,
}

/// One player's board, falling piece and gravity clock.
pub struct GameController {
    settings: GameSettings,
    board: Board,
    current: Piece,
    next: Tetromino,
    cleared_lines: u32,
    tick_interval_ms: u32,
    phase: Phase,
    paused: bool,
    rng: StdRng,
    timer: Box<dyn TickScheduler>,
    timer_token: Option<u64>,
}

impl GameController {
    pub fn new(settings: GameSettings, timer: Box<dyn TickScheduler>) -> Self {
        Self::with_rng(settings, timer, StdRng::from_entropy())
    }

    pub fn with_rng(
        settings: GameSettings,
        timer: Box<dyn TickScheduler>,
        mut rng: StdRng,
    ) -> Self {
        let board = Board::new(settings.rows, settings.cols);
        let first = Tetromino::random(&mut rng);
        let tick_interval_ms =
            speed_for_cleared_total(0, settings.base_interval_ms, settings.min_interval_ms);
        let mut controller = Self {
            current: Piece::spawn(first, settings.spawn_column),
            next: first,
            settings,
            board,
            cleared_lines: 0,
            tick_interval_ms,
            phase: Phase::Spawning,
            paused: false,
            rng,
            timer,
            timer_token: None,
        };
        let mut events = Vec::new();
        controller.spawn(&mut events);
        if controller.phase == Phase::Falling {
            controller.reschedule();
        }
        controller
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current(&self) -> &Piece {
        &self.current
    }

    pub fn next(&self) -> Tetromino {
        self.next
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn cleared_lines(&self) -> u32 {
        self.cleared_lines
    }

    pub fn tick_interval_ms(&self) -> u32 {
        self.tick_interval_ms
    }

    pub fn timer_token(&self) -> Option<u64> {
        self.timer_token
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Ends the game from outside, e.g. when the room reports game over.
    pub fn halt(&mut self) {
        self.phase = Phase::GameOver;
        self.timer.cancel();
        self.timer_token = None;
    }

    fn can_act(&self) -> bool {
        self.phase == Phase::Falling && !self.paused
    }

    fn reschedule(&mut self) {
        let token = self
            .timer
            .reschedule(Duration::from_millis(self.tick_interval_ms as u64));
        self.timer_token = Some(token);
    }

    /// Runs a tick for a timer fire issued by the current schedule; stale fires are dropped.
    pub fn on_timer(&mut self, fired: TimerFired) -> Vec<ControllerEvent> {
        if self.timer_token != Some(fired.token) {
            return Vec::new();
        }
        self.tick()
    }

    pub fn tick(&mut self) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if !self.can_act() {
            return events;
        }
        if !self.board.collides(&self.current, 0, 1) {
            self.current = self.current.shifted(0, 1);
        } else {
            self.lock_and_spawn(&mut events);
        }
        events
    }

    pub fn soft_drop(&mut self) -> Vec<ControllerEvent> {
        self.tick()
    }

    pub fn move_by(&mut self, dx: i32) -> bool {
        if !self.can_act() || self.board.collides(&self.current, dx, 0) {
            return false;
        }
        self.current = self.current.shifted(dx, 0);
        true
    }

    // No kick search: a blocked rotation is simply rejected.
    pub fn rotate(&mut self, dir: RotateDirection) -> bool {
        if !self.can_act() {
            return false;
        }
        let candidate = self.current.rotated(dir.step());
        if self.board.collides(&candidate, 0, 0) {
            return false;
        }
        self.current = candidate;
        true
    }

    pub fn hard_drop(&mut self) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if !self.can_act() {
            return events;
        }
        let dy = self.board.drop_distance(&self.current);
        self.current = self.current.shifted(0, dy);
        self.lock_and_spawn(&mut events);
        events
    }

    #[cfg(test)]
    pub(crate) fn load_board(&mut self, board: Board) {
        self.board = board;
    }

    /// Injects garbage under the stack. The falling piece keeps its origin even if it now
    /// overlaps; the next gravity step settles it.
    pub fn apply_garbage(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        self.board = self.board.inject_garbage(count, &mut self.rng);
        debug!(count, "garbage injected");
    }

    fn lock_and_spawn(&mut self, events: &mut Vec<ControllerEvent>) {
        self.phase = Phase::Locking;
        let (board, cleared) = self.board.lock(&self.current).clear_full_rows();
        self.board = board;
        let cleared = cleared as u32;
        self.cleared_lines += cleared;
        let interval = speed_for_cleared_total(
            self.cleared_lines,
            self.settings.base_interval_ms,
            self.settings.min_interval_ms,
        );
        events.push(ControllerEvent::LinesCleared(cleared));
        self.spawn(events);
        if self.phase == Phase::Falling && interval != self.tick_interval_ms {
            debug!(interval, total = self.cleared_lines, "gravity sped up");
            self.tick_interval_ms = interval;
            self.reschedule();
        } else {
            self.tick_interval_ms = interval;
        }
    }

    fn spawn(&mut self, events: &mut Vec<ControllerEvent>) {
        self.phase = Phase::Spawning;
        let candidate = Piece::spawn(self.next, self.settings.spawn_column);
        self.next = Tetromino::random(&mut self.rng);
        if self.board.collides(&candidate, 0, 0) {
            debug!(kind = ?candidate.kind, "spawn blocked");
            self.halt();
            events.push(ControllerEvent::GameOver);
        } else {
            self.current = candidate;
            self.phase = Phase::Falling;
        }
    }

    fn ghost(&self) -> Vec<Point> {
        if self.phase != Phase::Falling {
            return Vec::new();
        }
        let landed = self.current.shifted(0, self.board.drop_distance(&self.current));
        landed
            .cells()
            .filter(|&(_, y)| y >= 0)
            .map(|(x, y)| Point {
                x: x as i8,
                y: y as i8,
            })
            .collect()
    }

    pub fn snapshot(&self) -> ControllerView {
        let cols = self.board.cols();
        let mut field = self.board.color_ids();
        if self.phase != Phase::GameOver {
            for (x, y) in self.current.cells() {
                if y >= 0 && (y as usize) < self.board.rows() && x >= 0 && (x as usize) < cols {
                    field[y as usize * cols + x as usize] = self.current.kind.color_id();
                }
            }
        }
        ControllerView {
            rows: self.board.rows(),
            cols,
            field,
            ghost: self.ghost(),
            next: self.next,
            next_blocks: self.next.mask(0).to_vec(),
            next_color: self.next.color().to_string(),
            cleared_lines: self.cleared_lines,
            tick_interval_ms: self.tick_interval_ms,
            paused: self.paused,
            game_over: self.is_game_over(),
        }
    }
}
