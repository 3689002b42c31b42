// Reference decision strategy and the HTTP handler that serves it.

use axum::{
    extract::{Json, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::engine::config::WIRE_EMPTY;
use crate::engine::grid::{Coord, Direction};

/// Fallback order when the greedy move is blocked.
const FALLBACK_ORDER: [Direction; 4] = [
    Direction::Up,
    Direction::Right,
    Direction::Down,
    Direction::Left,
];

/// Head toward the apple along the axis with the larger distance (rows on ties).
/// When `is_free` reports the greedy cell as blocked, take the first free
/// direction in [`FALLBACK_ORDER`]; with nothing free, stay greedy.
pub fn greedy_direction<F>(apple: Coord, head: Coord, is_free: F) -> Direction
where
    F: Fn(Direction) -> bool,
{
    let d_row = head.row - apple.row;
    let d_col = head.col - apple.col;

    let greedy = if d_row.abs() < d_col.abs() {
        if d_col > 0 {
            Direction::Left
        } else {
            Direction::Right
        }
    } else if d_row > 0 {
        Direction::Down
    } else {
        Direction::Up
    };

    if is_free(greedy) {
        return greedy;
    }
    FALLBACK_ORDER
        .into_iter()
        .find(|d| is_free(*d))
        .unwrap_or(greedy)
}

/// Query parameters of a decision request as received by an agent.
/// Both `head_*` and `coord_*` spellings are accepted.
#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    pub apple_pos_x: Option<i32>,
    pub apple_pos_y: Option<i32>,
    pub head_x: Option<i32>,
    pub head_y: Option<i32>,
    pub coord_x: Option<i32>,
    pub coord_y: Option<i32>,
    pub up_head_val: Option<String>,
    pub down_head_val: Option<String>,
    pub left_head_val: Option<String>,
    pub right_head_val: Option<String>,
}

impl DecisionQuery {
    pub fn apple(&self) -> Option<Coord> {
        Some(Coord::new(self.apple_pos_x?, self.apple_pos_y?))
    }

    pub fn head(&self) -> Option<Coord> {
        let row = self.head_x.or(self.coord_x)?;
        let col = self.head_y.or(self.coord_y)?;
        Some(Coord::new(row, col))
    }

    /// Whether the neighbor in `direction` is reported free. Missing values count as free.
    pub fn is_free(&self, direction: Direction) -> bool {
        let val = match direction {
            Direction::Up => &self.up_head_val,
            Direction::Down => &self.down_head_val,
            Direction::Left => &self.left_head_val,
            Direction::Right => &self.right_head_val,
        };
        val.as_deref().map_or(true, |v| v == WIRE_EMPTY)
    }

    pub fn decide(&self) -> Option<Direction> {
        let apple = self.apple()?;
        let head = self.head()?;
        Some(greedy_direction(apple, head, |d| self.is_free(d)))
    }
}

async fn decide_handler(Query(query): Query<DecisionQuery>) -> impl IntoResponse {
    match query.decide() {
        Some(direction) => {
            tracing::debug!(?query, %direction, "Decided");
            (StatusCode::OK, Json(json!({ "direction": direction.as_str() })))
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing apple or head coordinates" })),
        ),
    }
}

/// Router answering decision requests at `/`.
pub fn agent_router() -> Router {
    Router::new().route("/", get(decide_handler))
}
