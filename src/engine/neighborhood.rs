use serde::Serialize;

use super::grid::{occupancy_at, Coord, Direction, Field, Occupancy};
use super::snake::Snake;

/// Occupancy of the four cells around a head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Neighborhood {
    pub up: Occupancy,
    pub down: Occupancy,
    pub left: Occupancy,
    pub right: Occupancy,
}

impl Neighborhood {
    /// Probe the cells around `head` against the given snakes and apple.
    /// Callers pass the pre-move view; nothing here mutates.
    pub fn probe<'a, I>(field: &Field, snakes: I, apple: Coord, head: Coord) -> Self
    where
        I: IntoIterator<Item = &'a Snake> + Clone,
    {
        let at = |direction: Direction| {
            let cell = head.offset(direction);
            occupancy_at(
                field,
                snakes.clone().into_iter().flat_map(|s| s.segments()),
                apple,
                cell,
            )
        };
        Neighborhood {
            up: at(Direction::Up),
            down: at(Direction::Down),
            left: at(Direction::Left),
            right: at(Direction::Right),
        }
    }

    pub fn get(&self, direction: Direction) -> Occupancy {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::snake::SnakeId;

    #[test]
    fn test_probe_corner() {
        let field = Field::new(5, 5);
        let snake = Snake::from_body(SnakeId(0), [Coord::new(0, 0), Coord::new(0, 1)]).unwrap();
        let snakes = vec![snake];
        let n = Neighborhood::probe(&field, &snakes, Coord::new(1, 1), Coord::new(0, 1));
        assert_eq!(n.up, Occupancy::Apple);
        assert_eq!(n.down, Occupancy::OutOfBounds);
        assert_eq!(n.left, Occupancy::SnakeBody);
        assert_eq!(n.right, Occupancy::Empty);
    }

    #[test]
    fn test_probe_sees_other_snakes() {
        let field = Field::new(5, 5);
        let a = Snake::from_body(SnakeId(0), [Coord::new(2, 2)]).unwrap();
        let b = Snake::from_body(SnakeId(1), [Coord::new(3, 2), Coord::new(3, 3)]).unwrap();
        let snakes = vec![a, b];
        let n = Neighborhood::probe(&field, &snakes, Coord::new(4, 4), Coord::new(2, 2));
        assert_eq!(n.get(Direction::Up), Occupancy::SnakeBody);
        assert_eq!(n.get(Direction::Down), Occupancy::Empty);
        assert_eq!(n.get(Direction::Right), Occupancy::Empty);
    }
}
