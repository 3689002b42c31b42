use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::config::*;
use super::grid::{Coord, Direction, Field};
use super::neighborhood::Neighborhood;
use super::snake::{Snake, SnakeId};
use crate::agent::{Agent, AgentError, DecisionRequest};
use crate::config::{validate_layout, ConfigError};
use crate::metrics;

/// Fatal engine errors. Agent failures never end up here.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("board saturated: no empty cell left to place the {purpose}")]
    BoardSaturated { purpose: &'static str },
    #[error("unknown snake {0}")]
    UnknownSnake(SnakeId),
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    #[error("a game is already running")]
    AlreadyRunning,
}

/// Per-game tunables.
#[derive(Debug, Clone)]
pub struct GameSettings {
    pub ticks: u64,
    pub spawn_length: usize,
    pub decision_timeout: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            ticks: DEFAULT_TICKS,
            spawn_length: DEFAULT_SPAWN_LENGTH,
            decision_timeout: Duration::from_millis(DEFAULT_DECISION_TIMEOUT_MS),
        }
    }
}

/// Per-snake statistics tracked during play.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SnakeStats {
    pub apples_eaten: u32,
    pub deaths: u32,
    pub forfeits: u32,
    pub max_length: usize,
}

/// Why a snake died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeathCause {
    OutOfBounds,
    SelfCollision,
    Collision { with: SnakeId },
}

impl DeathCause {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DeathCause::OutOfBounds => "bounds",
            DeathCause::SelfCollision => "self",
            DeathCause::Collision { .. } => "snake",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Death {
    pub snake_id: SnakeId,
    pub cause: DeathCause,
    pub respawned_at: Coord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forfeit {
    pub snake_id: SnakeId,
    pub reason: String,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub moves: BTreeMap<SnakeId, Direction>,
    pub eaten_by: Vec<SnakeId>,
    pub deaths: Vec<Death>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forfeits: Vec<Forfeit>,
}

/// Snapshot of a snake for rendering / API consumers.
#[derive(Clone, Debug, Serialize)]
pub struct SnakeSnapshot {
    pub id: SnakeId,
    /// Tail first, head last.
    pub body: Vec<Coord>,
    pub length: usize,
    pub target_length: usize,
    pub agent: String,
    pub stats: SnakeStats,
}

/// Snapshot of the full game state after a tick.
#[derive(Clone, Debug, Serialize)]
pub struct GameSnapshot {
    pub tick: u64,
    pub ticks_remaining: u64,
    pub field: Field,
    pub apple: Coord,
    pub snakes: Vec<SnakeSnapshot>,
    pub rows: Vec<String>,
}

/// One cell of the display grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Apple,
    Body(SnakeId),
    Head(SnakeId),
}

impl Cell {
    pub fn glyph(self) -> char {
        match self {
            Cell::Empty => GLYPH_EMPTY,
            Cell::Apple => GLYPH_APPLE,
            Cell::Body(_) => GLYPH_BODY,
            Cell::Head(id) => std::char::from_digit(id.0 % 36, 36).unwrap_or('?'),
        }
    }
}

/// Read-only display grid derived from the game state. Row 0 is the bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub height: i32,
    pub width: i32,
    cells: Vec<Cell>,
}

impl FieldView {
    pub fn cell(&self, coord: Coord) -> Option<Cell> {
        if coord.row < 0 || coord.col < 0 || coord.row >= self.height || coord.col >= self.width {
            return None;
        }
        self.cells
            .get((coord.row * self.width + coord.col) as usize)
            .copied()
    }

    /// Text rows, highest row first.
    pub fn rows(&self) -> Vec<String> {
        (0..self.height)
            .rev()
            .map(|row| {
                (0..self.width)
                    .filter_map(|col| self.cell(Coord::new(row, col)))
                    .map(|c| c.glyph().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

impl fmt::Display for FieldView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat((2 * self.width - 1).max(1) as usize);
        writeln!(f, "{rule}")?;
        for row in self.rows() {
            writeln!(f, "{row}")?;
        }
        write!(f, "{rule}")
    }
}

/// Top-level game state and tick driver. The only mutator of snakes and the apple.
pub struct Game {
    field: Field,
    snakes: BTreeMap<SnakeId, Snake>,
    agents: BTreeMap<SnakeId, Arc<dyn Agent>>,
    stats: BTreeMap<SnakeId, SnakeStats>,
    apple: Coord,
    ticks_remaining: u64,
    tick: u64,
    settings: GameSettings,
}

impl Game {
    /// Create a game with one snake per agent. Snake `n` is bound to `agents[n]`
    /// and starts on an evenly spaced perimeter cell; the apple starts at the centre.
    pub fn new(
        field: Field,
        agents: Vec<Arc<dyn Agent>>,
        settings: GameSettings,
    ) -> Result<Self, GameError> {
        validate_layout(field.height, field.width, agents.len(), settings.spawn_length)?;

        let perimeter = field.perimeter();
        let step = perimeter.len() / agents.len();
        let mut snakes = BTreeMap::new();
        let mut bound = BTreeMap::new();
        for (i, agent) in agents.into_iter().enumerate() {
            let id = SnakeId(i as u32);
            let start = perimeter[i * step];
            snakes.insert(id, Snake::spawn(id, start, settings.spawn_length));
            bound.insert(id, agent);
        }

        let centre = Coord::new(field.height / 2, field.width / 2);
        let occupied: HashSet<Coord> = snakes.values().flat_map(|s| s.segments()).copied().collect();
        let apple = if occupied.contains(&centre) {
            random_free_cell(&field, &occupied, "apple")?
        } else {
            centre
        };

        Ok(Self::assemble(field, snakes, bound, apple, settings))
    }

    /// Create a game from explicit snakes. Ids must be unique, bodies in bounds
    /// and disjoint, and the apple on a free in-bounds cell.
    pub fn with_snakes(
        field: Field,
        snakes: Vec<(Snake, Arc<dyn Agent>)>,
        apple: Coord,
        settings: GameSettings,
    ) -> Result<Self, GameError> {
        validate_layout(field.height, field.width, snakes.len(), settings.spawn_length)?;

        let mut occupied = HashSet::new();
        let mut by_id = BTreeMap::new();
        let mut bound = BTreeMap::new();
        for (snake, agent) in snakes {
            for c in snake.segments() {
                if !field.contains(*c) {
                    return Err(GameError::InvalidLayout(format!(
                        "snake {} segment {c} is outside the field",
                        snake.id
                    )));
                }
                if !occupied.insert(*c) {
                    return Err(GameError::InvalidLayout(format!(
                        "cell {c} is occupied twice"
                    )));
                }
            }
            let id = snake.id;
            if by_id.insert(id, snake).is_some() {
                return Err(GameError::InvalidLayout(format!("duplicate snake id {id}")));
            }
            bound.insert(id, agent);
        }
        if !field.contains(apple) || occupied.contains(&apple) {
            return Err(GameError::InvalidLayout(format!(
                "apple at {apple} is not on a free cell"
            )));
        }

        Ok(Self::assemble(field, by_id, bound, apple, settings))
    }

    fn assemble(
        field: Field,
        snakes: BTreeMap<SnakeId, Snake>,
        agents: BTreeMap<SnakeId, Arc<dyn Agent>>,
        apple: Coord,
        settings: GameSettings,
    ) -> Self {
        let stats = snakes
            .iter()
            .map(|(id, s)| {
                (
                    *id,
                    SnakeStats {
                        max_length: s.len(),
                        ..SnakeStats::default()
                    },
                )
            })
            .collect();
        Game {
            field,
            snakes,
            agents,
            stats,
            apple,
            ticks_remaining: settings.ticks,
            tick: 0,
            settings,
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticks_remaining > 0
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn apple(&self) -> Coord {
        self.apple
    }

    pub fn ticks_remaining(&self) -> u64 {
        self.ticks_remaining
    }

    /// Number of ticks resolved so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn snake(&self, id: SnakeId) -> Option<&Snake> {
        self.snakes.get(&id)
    }

    pub fn snakes(&self) -> impl Iterator<Item = &Snake> {
        self.snakes.values()
    }

    pub fn stats(&self, id: SnakeId) -> SnakeStats {
        self.stats.get(&id).cloned().unwrap_or_default()
    }

    /// Move the apple to a free in-bounds cell.
    pub fn place_apple(&mut self, at: Coord) -> Result<(), GameError> {
        if !self.field.contains(at) || self.snakes.values().any(|s| s.occupies(at)) {
            return Err(GameError::InvalidLayout(format!(
                "apple at {at} is not on a free cell"
            )));
        }
        self.apple = at;
        Ok(())
    }

    /// Advance exactly one tick: gather every decision concurrently, then resolve.
    pub async fn step(&mut self) -> Result<TickReport, GameError> {
        let tick_start = Instant::now();

        let requests = self.decision_requests();
        let outcomes = self.gather_decisions(requests).await;

        let mut decisions = BTreeMap::new();
        let mut forfeits = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(direction) => {
                    tracing::debug!(snake_id = %id, %direction, "Decision received");
                    metrics::AGENT_DECISIONS_TOTAL.inc();
                    decisions.insert(id, direction);
                }
                Err(e) => {
                    tracing::warn!(snake_id = %id, tick = self.tick + 1, "Move forfeited: {e}");
                    metrics::AGENT_FORFEITS_TOTAL
                        .with_label_values(&[e.reason()])
                        .inc();
                    self.stats.entry(id).or_default().forfeits += 1;
                    forfeits.push(Forfeit {
                        snake_id: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut report = self.apply_decisions(&decisions)?;
        report.forfeits = forfeits;

        let elapsed_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        metrics::GAME_TICK_DURATION_MS.observe(elapsed_ms);
        if elapsed_ms > SLOW_TICK_WARN_MS {
            tracing::warn!(tick = report.tick, elapsed_ms, "Tick exceeded budget");
        }
        Ok(report)
    }

    /// Decision requests for every snake, all computed from the current
    /// (pre-move) state.
    pub fn decision_requests(&self) -> Vec<(SnakeId, DecisionRequest)> {
        self.snakes
            .values()
            .map(|snake| {
                let head = snake.head();
                let neighborhood =
                    Neighborhood::probe(&self.field, self.snakes.values(), self.apple, head);
                (
                    snake.id,
                    DecisionRequest {
                        apple: self.apple,
                        head,
                        neighborhood,
                    },
                )
            })
            .collect()
    }

    /// Fan out one task per snake, each bounded by the decision timeout, and
    /// wait for all of them.
    async fn gather_decisions(
        &self,
        requests: Vec<(SnakeId, DecisionRequest)>,
    ) -> Vec<(SnakeId, Result<Direction, AgentError>)> {
        let timeout = self.settings.decision_timeout;
        let timeout_ms = timeout.as_millis() as u64;

        let tasks = requests.into_iter().map(|(id, request)| {
            let agent = self.agents.get(&id).cloned();
            async move {
                let Some(agent) = agent else {
                    return (id, Err(AgentError::Transport("no agent bound".into())));
                };
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let outcome = match tokio::time::timeout(timeout, agent.decide(request)).await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(AgentError::Timeout(timeout_ms)),
                    };
                    metrics::DECISION_LATENCY_MS.observe(started.elapsed().as_secs_f64() * 1000.0);
                    outcome
                });
                let outcome = handle.await.unwrap_or_else(|e| {
                    Err(AgentError::Transport(format!("decision task failed: {e}")))
                });
                (id, outcome)
            }
        });

        join_all(tasks).await
    }

    /// Mutation phase of a tick: move, commit growth, relocate the apple,
    /// resolve collisions and respawn, then count the tick down. Snakes absent
    /// from `decisions` forfeit their move and stay exactly as they were.
    pub fn apply_decisions(
        &mut self,
        decisions: &BTreeMap<SnakeId, Direction>,
    ) -> Result<TickReport, GameError> {
        if let Some(id) = decisions.keys().find(|id| !self.snakes.contains_key(*id)) {
            return Err(GameError::UnknownSnake(*id));
        }

        let apple = self.apple;
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            moves: decisions.clone(),
            ..TickReport::default()
        };

        // Move
        for (id, direction) in decisions {
            if let Some(snake) = self.snakes.get_mut(id) {
                let new_head = snake.head().offset(*direction);
                snake.advance(new_head);
            }
        }

        // Growth commit
        for id in decisions.keys() {
            let Some(snake) = self.snakes.get_mut(id) else {
                continue;
            };
            if snake.head() == apple {
                snake.commit_growth();
                report.eaten_by.push(*id);
                self.stats.entry(*id).or_default().apples_eaten += 1;
                metrics::APPLES_EATEN_TOTAL.inc();
                tracing::info!(snake_id = %id, at = %apple, length = snake.len(), "Apple eaten");
            } else {
                snake.discard_pending_tail();
            }
        }

        // Apple relocation
        if !report.eaten_by.is_empty() {
            let occupied: HashSet<Coord> = self
                .snakes
                .values()
                .flat_map(|s| s.segments())
                .copied()
                .collect();
            self.apple = random_free_cell(&self.field, &occupied, "apple")?;
        }

        // Collisions, judged against one frozen view of the post-move bodies
        let casualties: Vec<(SnakeId, DeathCause)> = decisions
            .keys()
            .filter_map(|id| self.collision_cause(*id).map(|cause| (*id, cause)))
            .collect();

        // Kill and respawn
        if !casualties.is_empty() {
            let dead: HashSet<SnakeId> = casualties.iter().map(|(id, _)| *id).collect();
            let mut occupied: HashSet<Coord> = self
                .snakes
                .values()
                .filter(|s| !dead.contains(&s.id))
                .flat_map(|s| s.segments())
                .copied()
                .collect();
            occupied.insert(self.apple);

            for (id, cause) in casualties {
                let cell = random_free_cell(&self.field, &occupied, "respawn")?;
                occupied.insert(cell);
                if let Some(snake) = self.snakes.get_mut(&id) {
                    snake.respawn(cell, self.settings.spawn_length);
                }
                self.stats.entry(id).or_default().deaths += 1;
                metrics::SNAKE_DEATHS_TOTAL
                    .with_label_values(&[cause.label()])
                    .inc();
                tracing::info!(snake_id = %id, ?cause, respawned_at = %cell, "Snake died");
                report.deaths.push(Death {
                    snake_id: id,
                    cause,
                    respawned_at: cell,
                });
            }
        }

        for snake in self.snakes.values() {
            let stats = self.stats.entry(snake.id).or_default();
            stats.max_length = stats.max_length.max(snake.len());
        }

        self.ticks_remaining = self.ticks_remaining.saturating_sub(1);
        metrics::TICKS_TOTAL.inc();
        Ok(report)
    }

    /// Collision rules for a snake that moved: out of bounds, own trailing
    /// segment, or any segment of another snake.
    fn collision_cause(&self, id: SnakeId) -> Option<DeathCause> {
        let snake = self.snakes.get(&id)?;
        let head = snake.head();
        if !self.field.contains(head) {
            return Some(DeathCause::OutOfBounds);
        }
        if snake.bites_itself() {
            return Some(DeathCause::SelfCollision);
        }
        self.snakes
            .values()
            .find(|other| other.id != id && other.occupies(head))
            .map(|other| DeathCause::Collision { with: other.id })
    }

    /// Display grid derived from the current state. Never mutates.
    pub fn render(&self) -> FieldView {
        let (h, w) = (self.field.height, self.field.width);
        let mut cells = vec![Cell::Empty; self.field.area()];
        let index = |c: Coord| (c.row * w + c.col) as usize;

        if self.field.contains(self.apple) {
            cells[index(self.apple)] = Cell::Apple;
        }
        for snake in self.snakes.values() {
            for c in snake.trailing_segments() {
                if self.field.contains(*c) {
                    cells[index(*c)] = Cell::Body(snake.id);
                }
            }
        }
        for snake in self.snakes.values() {
            let head = snake.head();
            if self.field.contains(head) {
                cells[index(head)] = Cell::Head(snake.id);
            }
        }

        FieldView {
            height: h,
            width: w,
            cells,
        }
    }

    /// Serializable snapshot for spectators.
    pub fn snapshot(&self) -> GameSnapshot {
        let snakes = self
            .snakes
            .values()
            .map(|s| SnakeSnapshot {
                id: s.id,
                body: s.segments().copied().collect(),
                length: s.len(),
                target_length: s.target_len(),
                agent: self
                    .agents
                    .get(&s.id)
                    .map(|a| a.describe())
                    .unwrap_or_default(),
                stats: self.stats(s.id),
            })
            .collect();

        GameSnapshot {
            tick: self.tick,
            ticks_remaining: self.ticks_remaining,
            field: self.field,
            apple: self.apple,
            snakes,
            rows: self.render().rows(),
        }
    }
}

/// A uniformly random in-bounds cell not in `occupied`.
fn random_free_cell(
    field: &Field,
    occupied: &HashSet<Coord>,
    purpose: &'static str,
) -> Result<Coord, GameError> {
    let free: Vec<Coord> = field.cells().filter(|c| !occupied.contains(c)).collect();
    let mut rng = rand::thread_rng();
    free.choose(&mut rng)
        .copied()
        .ok_or(GameError::BoardSaturated { purpose })
}
