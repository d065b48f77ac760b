use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RoomError;

/// Edge length of one grid cell in pixels.
pub const CELL_SIZE: i32 = 32;

/// Edge length of a participant's bounding box in pixels.
pub const PARTICIPANT_SIZE: i32 = 32;

/// Minimum time between two position-changing moves of the same participant.
pub const MOVE_DELAY: Duration = Duration::from_millis(100);

/// Number of state-changing actions kept for `revert_to`.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

pub type Cell = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Unit step in cell coordinates. `y` grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

impl FromStr for Direction {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(RoomError::InvalidAction(format!("unknown direction {:?}", other))),
        }
    }
}

/// Pixel position of a participant's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn from_cell((cx, cy): Cell) -> Self {
        Self {
            x: cx * CELL_SIZE,
            y: cy * CELL_SIZE,
        }
    }

    pub fn cell(&self) -> Cell {
        (self.x.div_euclid(CELL_SIZE), self.y.div_euclid(CELL_SIZE))
    }

    /// Position one cell away in `direction`.
    pub fn step(&self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx * CELL_SIZE,
            y: self.y + dy * CELL_SIZE,
        }
    }

    /// Cells touched by the four corners of the bounding box anchored here.
    pub fn corner_cells(&self) -> [Cell; 4] {
        let right = self.x + PARTICIPANT_SIZE - 1;
        let bottom = self.y + PARTICIPANT_SIZE - 1;
        [
            Position::new(self.x, self.y).cell(),
            Position::new(right, self.y).cell(),
            Position::new(self.x, bottom).cell(),
            Position::new(right, bottom).cell(),
        ]
    }
}

/// Static geometry of a room, in cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMap {
    pub width: i32,
    pub height: i32,
    pub spawn: Cell,
    pub blocked: HashSet<Cell>,
}

impl RoomMap {
    pub fn open(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            spawn: (0, 0),
            blocked: HashSet::new(),
        }
    }

    pub fn with_spawn(mut self, spawn: Cell) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn with_blocked<I: IntoIterator<Item = Cell>>(mut self, cells: I) -> Self {
        self.blocked.extend(cells);
        self
    }

    pub fn in_bounds(&self, (cx, cy): Cell) -> bool {
        cx >= 0 && cy >= 0 && cx < self.width && cy < self.height
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains(&cell)
    }

    /// True when every corner of the bounding box at `position` lies on an
    /// in-bounds, unblocked cell.
    pub fn is_clear(&self, position: Position) -> bool {
        position
            .corner_cells()
            .iter()
            .all(|cell| self.in_bounds(*cell) && !self.is_blocked(*cell))
    }

    /// Blocked cells in row-major order, for deterministic transmission.
    pub fn blocked_sorted(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.blocked.iter().copied().collect();
        cells.sort_by_key(|(x, y)| (*y, *x));
        cells
    }
}
