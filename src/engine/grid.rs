use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::config::*;

/// A cell on the field. `row` is the `x` axis of the agent protocol, `col` the `y` axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub const fn new(row: i32, col: i32) -> Self {
        Coord { row, col }
    }

    /// The neighboring cell in the given direction. May lie outside the field.
    pub fn offset(self, direction: Direction) -> Coord {
        let (dr, dc) = direction.delta();
        Coord {
            row: self.row + dr,
            col: self.col + dc,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One of the four cardinal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// (row, col) delta. "Up" is increasing row.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (1, 0),
            Direction::Down => (-1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    pub fn opposite(self) -> Direction {
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
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// What a single cell holds, as seen by a decision request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    OutOfBounds,
    SnakeBody,
    Apple,
    Empty,
}

impl Occupancy {
    /// Query-string encoding. The apple is walkable, so it travels as empty.
    pub fn wire(self) -> &'static str {
        match self {
            Occupancy::OutOfBounds => WIRE_OUT_OF_BOUNDS,
            Occupancy::SnakeBody => WIRE_SNAKE,
            Occupancy::Apple | Occupancy::Empty => WIRE_EMPTY,
        }
    }

    /// Whether a head could enter this cell without dying (ignoring simultaneous moves).
    pub fn is_free(self) -> bool {
        matches!(self, Occupancy::Apple | Occupancy::Empty)
    }
}

/// Field bounds. `height` bounds rows, `width` bounds columns; fixed for a game's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Field {
    pub height: i32,
    pub width: i32,
}

impl Field {
    pub fn new(height: i32, width: i32) -> Self {
        Field { height, width }
    }

    pub fn contains(&self, coord: Coord) -> bool {
        (0..self.height).contains(&coord.row) && (0..self.width).contains(&coord.col)
    }

    pub fn area(&self) -> usize {
        (self.height.max(0) as usize) * (self.width.max(0) as usize)
    }

    /// All in-bounds cells, row-major.
    pub fn cells(&self) -> impl Iterator<Item = Coord> {
        let width = self.width;
        (0..self.height).flat_map(move |row| (0..width).map(move |col| Coord::new(row, col)))
    }

    /// Perimeter cells walked clockwise from (0, 0): along row 0, up the last
    /// column, back along the last row, then down column 0. Each cell appears once.
    pub fn perimeter(&self) -> Vec<Coord> {
        let (h, w) = (self.height, self.width);
        if h <= 0 || w <= 0 {
            return Vec::new();
        }
        if h == 1 {
            return (0..w).map(|c| Coord::new(0, c)).collect();
        }
        if w == 1 {
            return (0..h).map(|r| Coord::new(r, 0)).collect();
        }
        let mut cells = Vec::with_capacity((2 * w + 2 * h - 4) as usize);
        cells.extend((0..w).map(|c| Coord::new(0, c)));
        cells.extend((1..h - 1).map(|r| Coord::new(r, w - 1)));
        cells.extend((0..w).rev().map(|c| Coord::new(h - 1, c)));
        cells.extend((1..h - 1).rev().map(|r| Coord::new(r, 0)));
        cells
    }
}

/// Classify `coord` against the field, every segment yielded by `segments`, and the apple.
/// Linear scan over the occupied cells.
pub fn occupancy_at<'a, I>(field: &Field, segments: I, apple: Coord, coord: Coord) -> Occupancy
where
    I: IntoIterator<Item = &'a Coord>,
{
    if !field.contains(coord) {
        Occupancy::OutOfBounds
    } else if segments.into_iter().any(|c| *c == coord) {
        Occupancy::SnakeBody
    } else if apple == coord {
        Occupancy::Apple
    } else {
        Occupancy::Empty
    }
}
