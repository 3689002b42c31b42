// Game server: drives a game to completion and broadcasts state to spectators.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::metrics;

use super::config::*;
use super::game::{Game, GameError, GameSnapshot, SnakeStats, TickReport};
use super::snake::SnakeId;

/// Messages sent from the game loop to WebSocket clients.
#[derive(Clone, Serialize, Debug)]
#[serde(tag = "type")]
pub enum GameMessage {
    /// Full state after a tick (tick 0 is the starting position).
    #[serde(rename = "snapshot")]
    Snapshot(GameSnapshot),
    /// Game has ended.
    #[serde(rename = "game_end")]
    GameEnd(GameSummary),
}

/// Final standing of one snake.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct SnakeSummary {
    pub id: SnakeId,
    pub agent: String,
    pub length: usize,
    pub stats: SnakeStats,
}

/// Result of a completed (or stopped) game.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct GameSummary {
    pub ticks_played: u64,
    pub snakes: Vec<SnakeSummary>,
}

impl GameSummary {
    pub fn from_game(game: &Game) -> Self {
        let snakes = game
            .snapshot()
            .snakes
            .into_iter()
            .map(|s| SnakeSummary {
                id: s.id,
                agent: s.agent,
                length: s.length,
                stats: s.stats,
            })
            .collect();
        GameSummary {
            ticks_played: game.tick(),
            snakes,
        }
    }
}

/// Status of the game as seen by the spectator API.
#[derive(Debug, Clone, Serialize)]
pub struct GameStatus {
    pub running: bool,
    pub tick: u64,
    pub ticks_remaining: u64,
    pub start_time: Option<String>,
    pub spectators: usize,
}

/// Run a game to completion with no broadcast and no pacing.
pub async fn run_game_headless(mut game: Game) -> Result<GameSummary, GameError> {
    metrics::ACTIVE_GAMES.inc();
    let result: Result<GameSummary, GameError> = async {
        while game.is_running() {
            game.step().await?;
        }
        Ok(GameSummary::from_game(&game))
    }
    .await;
    metrics::ACTIVE_GAMES.dec();
    result
}

/// Runs one game at a time and broadcasts a snapshot per tick to
/// subscribers. The latest snapshot is cached for late joiners.
pub struct GameServer {
    broadcast_tx: broadcast::Sender<String>,
    running: Arc<AtomicBool>,
    current_tick: Arc<AtomicU64>,
    ticks_remaining: Arc<AtomicU64>,
    snapshot_json: Arc<Mutex<Option<String>>>,
    start_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}

impl GameServer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            broadcast_tx: tx,
            running: Arc::new(AtomicBool::new(false)),
            current_tick: Arc::new(AtomicU64::new(0)),
            ticks_remaining: Arc::new(AtomicU64::new(0)),
            snapshot_json: Arc::new(Mutex::new(None)),
            start_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to game messages (JSON strings).
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// The most recent snapshot message, if any tick has been published.
    pub fn snapshot_json(&self) -> Option<String> {
        self.snapshot_json.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask the running game to stop after the current tick.
    pub fn stop_game(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn spectator_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }

    pub fn status(&self) -> GameStatus {
        GameStatus {
            running: self.is_running(),
            tick: self.current_tick.load(Ordering::Relaxed),
            ticks_remaining: self.ticks_remaining.load(Ordering::Relaxed),
            start_time: self.start_time.lock().unwrap().map(|t| t.to_rfc3339()),
            spectators: self.spectator_count(),
        }
    }

    /// Drive `game` until its ticks run out or [`stop_game`](Self::stop_game)
    /// is called. `on_tick` sees every report together with the post-tick
    /// state; `tick_interval` pauses between ticks.
    pub async fn run<F>(
        &self,
        mut game: Game,
        tick_interval: Duration,
        mut on_tick: F,
    ) -> Result<GameSummary, GameError>
    where
        F: FnMut(&TickReport, &Game),
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GameError::AlreadyRunning);
        }

        *self.start_time.lock().unwrap() = Some(Utc::now());
        metrics::ACTIVE_GAMES.inc();
        tracing::info!(
            snakes = game.snakes().count(),
            ticks = game.ticks_remaining(),
            height = game.field().height,
            width = game.field().width,
            "Game started"
        );
        self.publish(&game);

        let result: Result<GameSummary, GameError> = async {
            while game.is_running() && self.running.load(Ordering::Relaxed) {
                let report = game.step().await?;
                on_tick(&report, &game);
                self.publish(&game);
                if !tick_interval.is_zero() && game.is_running() {
                    tokio::time::sleep(tick_interval).await;
                }
            }
            Ok(GameSummary::from_game(&game))
        }
        .await;

        match &result {
            Ok(summary) => {
                tracing::info!(ticks_played = summary.ticks_played, "Game finished");
                let end = GameMessage::GameEnd(summary.clone());
                if let Ok(json) = serde_json::to_string(&end) {
                    let _ = self.broadcast_tx.send(json);
                }
            }
            Err(e) => tracing::error!(tick = game.tick(), "Game aborted: {e}"),
        }

        metrics::ACTIVE_GAMES.dec();
        self.running.store(false, Ordering::Relaxed);
        result
    }

    fn publish(&self, game: &Game) {
        self.current_tick.store(game.tick(), Ordering::Relaxed);
        self.ticks_remaining
            .store(game.ticks_remaining(), Ordering::Relaxed);

        let msg = GameMessage::Snapshot(game.snapshot());
        match serde_json::to_string(&msg) {
            Ok(json) => {
                *self.snapshot_json.lock().unwrap() = Some(json.clone());
                // No subscribers is not an error.
                let _ = self.broadcast_tx.send(json);
            }
            Err(e) => tracing::error!("Failed to serialize snapshot: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, GreedyAgent};
    use crate::engine::game::GameSettings;
    use crate::engine::grid::Field;

    fn small_game(ticks: u64) -> Game {
        let agents: Vec<Arc<dyn Agent>> = vec![Arc::new(GreedyAgent), Arc::new(GreedyAgent)];
        let settings = GameSettings {
            ticks,
            ..GameSettings::default()
        };
        Game::new(Field::new(6, 6), agents, settings).unwrap()
    }

    #[test]
    fn test_game_server_new() {
        let server = GameServer::new();
        assert!(!server.is_running());
        assert!(server.snapshot_json().is_none());
        let status = server.status();
        assert_eq!(status.tick, 0);
        assert!(status.start_time.is_none());
    }

    #[tokio::test]
    async fn test_run_broadcasts_every_tick() {
        let server = GameServer::new();
        let mut rx = server.subscribe();
        let mut seen = Vec::new();

        let summary = server
            .run(small_game(5), Duration::ZERO, |report, _| seen.push(report.tick))
            .await
            .unwrap();

        assert_eq!(summary.ticks_played, 5);
        assert_eq!(summary.snakes.len(), 2);
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert!(!server.is_running());

        let mut types = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
            types.push(v["type"].as_str().unwrap().to_string());
        }
        // Tick 0 plus five ticks, then the end message.
        assert_eq!(types.len(), 7);
        assert!(types[..6].iter().all(|t| t == "snapshot"));
        assert_eq!(types[6], "game_end");

        let cached: serde_json::Value =
            serde_json::from_str(&server.snapshot_json().unwrap()).unwrap();
        assert_eq!(cached["tick"], 5);
        assert_eq!(cached["ticks_remaining"], 0);
        let status = server.status();
        assert_eq!(status.tick, 5);
        assert!(status.start_time.is_some());
    }

    #[tokio::test]
    async fn test_zero_ticks_publishes_start_only() {
        let server = GameServer::new();
        let summary = server
            .run(small_game(0), Duration::ZERO, |_, _| panic!("no tick expected"))
            .await
            .unwrap();
        assert_eq!(summary.ticks_played, 0);
        assert!(server.snapshot_json().is_some());
    }

    #[tokio::test]
    async fn test_stop_game_ends_early() {
        let server = Arc::new(GameServer::new());
        let stopper = server.clone();
        let summary = server
            .run(small_game(50), Duration::from_millis(1), move |report, _| {
                if report.tick == 3 {
                    stopper.stop_game();
                }
            })
            .await
            .unwrap();
        assert_eq!(summary.ticks_played, 3);
    }

    #[tokio::test]
    async fn test_headless() {
        let summary = run_game_headless(small_game(10)).await.unwrap();
        assert_eq!(summary.ticks_played, 10);
        for snake in &summary.snakes {
            assert!(snake.stats.max_length >= snake.length);
        }
    }
}
