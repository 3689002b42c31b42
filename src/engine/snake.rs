use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::grid::Coord;

/// Stable snake identity. Snake `n` is bound to agent `n` for the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnakeId(pub u32);

impl fmt::Display for SnakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snake's body and growth state.
///
/// The body is stored tail first; the head is the back of the deque. After every
/// move the body is trimmed to `target_len`, with the dropped segment parked in
/// `pending_tail` until the tick knows whether the move ate the apple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    pub id: SnakeId,
    body: VecDeque<Coord>,
    target_len: usize,
    pending_tail: Option<Coord>,
}

impl Snake {
    /// A single-segment snake that will grow toward `target_len`.
    pub fn spawn(id: SnakeId, at: Coord, target_len: usize) -> Self {
        Snake {
            id,
            body: VecDeque::from([at]),
            target_len: target_len.max(1),
            pending_tail: None,
        }
    }

    /// A snake with an explicit body, tail first. The target length is the body length.
    pub fn from_body(id: SnakeId, body: impl IntoIterator<Item = Coord>) -> Option<Self> {
        let body: VecDeque<Coord> = body.into_iter().collect();
        if body.is_empty() {
            return None;
        }
        let target_len = body.len();
        Some(Snake {
            id,
            body,
            target_len,
            pending_tail: None,
        })
    }

    pub fn head(&self) -> Coord {
        // Non-empty by construction.
        self.body[self.body.len() - 1]
    }

    pub fn tail(&self) -> Coord {
        self.body[0]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn target_len(&self) -> usize {
        self.target_len
    }

    pub fn pending_tail(&self) -> Option<Coord> {
        self.pending_tail
    }

    /// Segments from tail to head.
    pub fn segments(&self) -> impl Iterator<Item = &Coord> {
        self.body.iter()
    }

    /// Segments from tail to head, excluding the head.
    pub fn trailing_segments(&self) -> impl Iterator<Item = &Coord> {
        self.body.iter().take(self.body.len() - 1)
    }

    pub fn occupies(&self, coord: Coord) -> bool {
        self.body.contains(&coord)
    }

    /// Whether the head sits on one of the snake's own trailing segments.
    pub fn bites_itself(&self) -> bool {
        let head = self.head();
        self.trailing_segments().any(|c| *c == head)
    }

    /// Move: push `new_head`, trimming the tail into `pending_tail` if the body
    /// now exceeds its target length.
    pub fn advance(&mut self, new_head: Coord) {
        self.pending_tail = None;
        self.body.push_back(new_head);
        if self.body.len() > self.target_len {
            self.pending_tail = self.body.pop_front();
        }
    }

    /// Growth commit after eating: restore the parked tail if any and raise the
    /// target length by one.
    pub fn commit_growth(&mut self) {
        if let Some(tail) = self.pending_tail.take() {
            self.body.push_front(tail);
        }
        self.target_len += 1;
    }

    /// Drop the parked tail; the move did not eat.
    pub fn discard_pending_tail(&mut self) {
        self.pending_tail = None;
    }

    /// Relocate to a single cell with a fresh target length. Identity is kept.
    pub fn respawn(&mut self, at: Coord, target_len: usize) {
        self.body.clear();
        self.body.push_back(at);
        self.target_len = target_len.max(1);
        self.pending_tail = None;
    }
}
