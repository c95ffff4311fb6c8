use crate::board::{Board, Piece};
use crate::controller::RotateDirection;
use crate::scores::ScoreEndpoint;
use crate::session::{SessionCoordinator, SessionPhase};
use crate::store::SharedStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub rotation: usize,
    pub x: i32,
    pub score: i32,
}

fn score_board(after: &Board, lines: usize) -> i32 {
    (lines as i32 * 40) - (after.hole_count() as i32 * 8) - after.max_height() as i32 * 2
}

/// Best resting spot for `piece` by a lines/holes/height heuristic, ignoring whether the
/// path there is clear.
pub fn plan_placement(board: &Board, piece: &Piece) -> Option<Placement> {
    let mut best: Option<Placement> = None;
    for rotation in 0..piece.kind.rotation_count() {
        for x in -3..board.cols() as i32 + 3 {
            let candidate = Piece {
                rotation,
                x,
                ..*piece
            };
            if board.collides(&candidate, 0, 0) {
                continue;
            }
            let landed = candidate.shifted(0, board.drop_distance(&candidate));
            let (after, lines) = board.lock(&landed).clear_full_rows();
            let score = score_board(&after, lines);
            if best.map(|b| score > b.score).unwrap_or(true) {
                best = Some(Placement { rotation, x, score });
            }
        }
    }
    best
}

pub struct BotDriver {
    pps: f32,
    think_timer: f32,
}

impl BotDriver {
    pub fn new(pps: f32) -> Self {
        Self {
            pps,
            think_timer: 0.0,
        }
    }

    /// Places one piece once enough time has passed for the configured pieces per second.
    pub fn update<S: SharedStore, E: ScoreEndpoint>(
        &mut self,
        session: &mut SessionCoordinator<S, E>,
        dt_ms: f32,
    ) -> bool {
        if session.phase() != SessionPhase::Playing || session.is_paused() {
            return false;
        }
        self.think_timer += dt_ms;
        let piece_time = 1000.0 / self.pps.max(0.1);
        if self.think_timer < piece_time {
            return false;
        }
        self.think_timer = 0.0;
        let Some(plan) = session
            .controller()
            .and_then(|c| plan_placement(c.board(), c.current()))
        else {
            session.hard_drop();
            return true;
        };
        let Some(current) = session.controller().map(|c| *c.current()) else {
            return false;
        };
        let count = current.kind.rotation_count();
        let turns = (plan.rotation + count - current.rotation % count) % count;
        for _ in 0..turns {
            if !session.rotate(RotateDirection::Clockwise) {
                break;
            }
        }
        let dir = (plan.x - current.x).signum();
        for _ in 0..(plan.x - current.x).abs() {
            if !session.move_piece(dir) {
                break;
            }
        }
        session.hard_drop();
        true
    }
}
