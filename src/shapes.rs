use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Tetromino {
    I,
    J,
    L,
    O,
    S,
    Z,
    T,
}

pub const GARBAGE_COLOR_ID: u8 = 8;
pub const GARBAGE_COLOR: &str = "#808080";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i8,
    pub y: i8,
}

const fn p(x: i8, y: i8) -> Point {
    Point { x, y }
}

// Cells inside a 4x4 box, y grows downward.
const I_STATES: [[Point; 4]; 2] = [
    [p(0, 0), p(1, 0), p(2, 0), p(3, 0)],
    [p(2, 0), p(2, 1), p(2, 2), p(2, 3)],
];
const O_STATES: [[Point; 4]; 1] = [[p(1, 0), p(2, 0), p(1, 1), p(2, 1)]];
const S_STATES: [[Point; 4]; 2] = [
    [p(1, 0), p(2, 0), p(0, 1), p(1, 1)],
    [p(1, 0), p(1, 1), p(2, 1), p(2, 2)],
];
const Z_STATES: [[Point; 4]; 2] = [
    [p(0, 0), p(1, 0), p(1, 1), p(2, 1)],
    [p(2, 0), p(1, 1), p(2, 1), p(1, 2)],
];
const J_STATES: [[Point; 4]; 4] = [
    [p(0, 0), p(0, 1), p(1, 1), p(2, 1)],
    [p(1, 0), p(2, 0), p(1, 1), p(1, 2)],
    [p(0, 1), p(1, 1), p(2, 1), p(2, 2)],
    [p(1, 0), p(1, 1), p(0, 2), p(1, 2)],
];
const L_STATES: [[Point; 4]; 4] = [
    [p(2, 0), p(0, 1), p(1, 1), p(2, 1)],
    [p(1, 0), p(1, 1), p(1, 2), p(2, 2)],
    [p(0, 1), p(1, 1), p(2, 1), p(0, 2)],
    [p(0, 0), p(1, 0), p(1, 1), p(1, 2)],
];
const T_STATES: [[Point; 4]; 4] = [
    [p(1, 0), p(0, 1), p(1, 1), p(2, 1)],
    [p(1, 0), p(1, 1), p(2, 1), p(1, 2)],
    [p(0, 1), p(1, 1), p(2, 1), p(1, 2)],
    [p(1, 0), p(0, 1), p(1, 1), p(1, 2)],
];

impl Tetromino {
    pub fn all() -> [Tetromino; 7] {
        [
            Tetromino::I,
            Tetromino::J,
            Tetromino::L,
            Tetromino::O,
            Tetromino::S,
            Tetromino::Z,
            Tetromino::T,
        ]
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Tetromino {
        // `all()` is never empty.
        *Tetromino::all().choose(rng).unwrap_or(&Tetromino::T)
    }

    fn states(self) -> &'static [[Point; 4]] {
        match self {
            Tetromino::I => &I_STATES,
            Tetromino::J => &J_STATES,
            Tetromino::L => &L_STATES,
            Tetromino::O => &O_STATES,
            Tetromino::S => &S_STATES,
            Tetromino::Z => &Z_STATES,
            Tetromino::T => &T_STATES,
        }
    }

    pub fn rotation_count(self) -> usize {
        self.states().len()
    }

    /// Mask for `rotation`, taken modulo the kind's state count.
    pub fn mask(self, rotation: usize) -> [Point; 4] {
        let states = self.states();
        states[rotation % states.len()]
    }

    pub fn color_id(self) -> u8 {
        match self {
            Tetromino::I => 1,
            Tetromino::J => 2,
            Tetromino::L => 3,
            Tetromino::O => 4,
            Tetromino::S => 5,
            Tetromino::Z => 6,
            Tetromino::T => 7,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Tetromino::I => "#00f0f0",
            Tetromino::J => "#0000f0",
            Tetromino::L => "#f0a000",
            Tetromino::O => "#f0f000",
            Tetromino::S => "#00f000",
            Tetromino::Z => "#f00000",
            Tetromino::T => "#a000f0",
        }
    }
}
