use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::shapes::{Point, Tetromino, GARBAGE_COLOR_ID};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Piece(Tetromino),
    Garbage,
}

impl Cell {
    pub fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn color_id(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Piece(kind) => kind.color_id(),
            Cell::Garbage => GARBAGE_COLOR_ID,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Piece {
    pub kind: Tetromino,
    pub rotation: usize,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    pub fn spawn(kind: Tetromino, column: i32) -> Self {
        Self {
            kind,
            rotation: 0,
            x: column,
            y: 0,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.kind
            .mask(self.rotation)
            .into_iter()
            .map(move |Point { x, y }| (self.x + x as i32, self.y + y as i32))
    }

    pub fn shifted(&self, dx: i32, dy: i32) -> Piece {
        Piece {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// `dir` is +1 clockwise, -1 counter-clockwise.
    pub fn rotated(&self, dir: i32) -> Piece {
        let total = self.kind.rotation_count() as i32;
        let rotation = (self.rotation as i32 + dir).rem_euclid(total) as usize;
        Piece { rotation, ..*self }
    }
}

/// Interval for a running total of cleared lines: 10% faster per 10 lines, never below
/// `floor_ms`.
pub fn speed_for_cleared_total(total: u32, base_interval_ms: u32, floor_ms: u32) -> u32 {
    let steps = (total / 10) as i32;
    let scaled = base_interval_ms as f64 * 0.9f64.powi(steps);
    (scaled.floor() as u32).max(floor_ms).max(1)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl Board {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![Cell::Empty; cols]; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, y: usize) -> &[Cell] {
        &self.cells[y]
    }

    pub fn get(&self, x: usize, y: usize) -> Cell {
        self.cells[y][x]
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[y][x] = cell;
    }

    /// Cells above row 0 never collide; walls and the floor always do.
    pub fn collides(&self, piece: &Piece, dx: i32, dy: i32) -> bool {
        piece.cells().any(|(x, y)| {
            let (x, y) = (x + dx, y + dy);
            if y < 0 {
                return false;
            }
            if x < 0 || x >= self.cols as i32 || y >= self.rows as i32 {
                return true;
            }
            !self.cells[y as usize][x as usize].is_empty()
        })
    }

    pub fn lock(&self, piece: &Piece) -> Board {
        let mut next = self.clone();
        for (x, y) in piece.cells() {
            if y >= 0 && y < self.rows as i32 && x >= 0 && x < self.cols as i32 {
                next.cells[y as usize][x as usize] = Cell::Piece(piece.kind);
            }
        }
        next
    }

    pub fn clear_full_rows(&self) -> (Board, usize) {
        let kept: Vec<Vec<Cell>> = self
            .cells
            .iter()
            .filter(|row| row.iter().any(|c| c.is_empty()))
            .cloned()
            .collect();
        let cleared = self.rows - kept.len();
        let mut cells = vec![vec![Cell::Empty; self.cols]; cleared];
        cells.extend(kept);
        (
            Board {
                rows: self.rows,
                cols: self.cols,
                cells,
            },
            cleared,
        )
    }

    /// Pushes `count` garbage rows in from the bottom. Whatever sat in the top row is
    /// dropped; running out of room only shows up at the next spawn.
    pub fn inject_garbage<R: Rng + ?Sized>(&self, count: u32, rng: &mut R) -> Board {
        let mut next = self.clone();
        if self.rows == 0 || self.cols < 2 {
            return next;
        }
        for _ in 0..count {
            next.cells.remove(0);
            let first = rng.gen_range(0..self.cols);
            let mut second = rng.gen_range(0..self.cols);
            while second == first {
                second = rng.gen_range(0..self.cols);
            }
            let mut row = vec![Cell::Garbage; self.cols];
            row[first] = Cell::Empty;
            row[second] = Cell::Empty;
            next.cells.push(row);
        }
        next
    }

    pub fn drop_distance(&self, piece: &Piece) -> i32 {
        let mut dy = 0;
        while !self.collides(piece, 0, dy + 1) {
            dy += 1;
            if dy > self.rows as i32 + 4 {
                break;
            }
        }
        dy
    }

    pub fn hole_count(&self) -> usize {
        let mut holes = 0;
        for x in 0..self.cols {
            let mut found = false;
            for y in 0..self.rows {
                if !self.cells[y][x].is_empty() {
                    found = true;
                } else if found {
                    holes += 1;
                }
            }
        }
        holes
    }

    pub fn max_height(&self) -> usize {
        self.cells
            .iter()
            .position(|row| row.iter().any(|c| !c.is_empty()))
            .map(|top| self.rows - top)
            .unwrap_or(0)
    }

    pub fn color_ids(&self) -> Vec<u8> {
        self.cells
            .iter()
            .flat_map(|row| row.iter().map(|c| c.color_id()))
            .collect()
    }
}
