// End-to-end engine scenarios driven through in-process agents.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::seq::SliceRandom;

use snake_arena::agent::{Agent, AgentError, DecisionRequest, FnAgent, GreedyAgent};
use snake_arena::engine::game::{DeathCause, Game, GameSettings};
use snake_arena::engine::grid::{Coord, Direction, Field};
use snake_arena::engine::snake::{Snake, SnakeId};

fn fixed(direction: Direction) -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(direction.as_str(), move |_: &DecisionRequest| {
        Ok(direction)
    }))
}

fn settings(ticks: u64) -> GameSettings {
    GameSettings {
        ticks,
        ..GameSettings::default()
    }
}

/// Every live segment is in bounds, no cell is shared, and the apple sits on a free cell.
fn assert_board_consistent(game: &Game) {
    let field = game.field();
    let mut seen = HashSet::new();
    for snake in game.snakes() {
        for c in snake.segments() {
            assert!(field.contains(*c), "segment {c} of snake {} out of bounds", snake.id);
            assert!(seen.insert(*c), "cell {c} shared after tick {}", game.tick());
        }
    }
    assert!(field.contains(game.apple()));
    assert!(!seen.contains(&game.apple()), "apple on a snake at tick {}", game.tick());
}

#[tokio::test]
async fn single_snake_grows_after_reaching_apple() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let agent: Arc<dyn Agent> = Arc::new(FnAgent::new("right-then-up", move |_: &DecisionRequest| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(if n < 3 { Direction::Right } else { Direction::Up })
    }));
    let snake = Snake::from_body(SnakeId(0), (0..3).map(|c| Coord::new(0, c))).unwrap();
    let mut game =
        Game::with_snakes(Field::new(10, 10), vec![(snake, agent)], Coord::new(5, 5), settings(20))
            .unwrap();

    for _ in 0..3 {
        game.step().await.unwrap();
    }
    let snake = game.snake(SnakeId(0)).unwrap();
    assert_eq!(snake.head(), Coord::new(0, 5));
    assert_eq!(snake.len(), 3);

    game.place_apple(Coord::new(4, 5)).unwrap();
    for _ in 0..3 {
        let report = game.step().await.unwrap();
        assert!(report.eaten_by.is_empty());
    }
    assert_eq!(game.snake(SnakeId(0)).unwrap().len(), 3);

    let report = game.step().await.unwrap();
    assert_eq!(report.eaten_by, vec![SnakeId(0)]);
    let snake = game.snake(SnakeId(0)).unwrap();
    assert_eq!(snake.head(), Coord::new(4, 5));
    assert_eq!(snake.len(), 4);
    assert_eq!(snake.target_len(), 4);
    assert_ne!(game.apple(), Coord::new(4, 5));
    assert!(!snake.occupies(game.apple()));
    assert_eq!(game.stats(SnakeId(0)).apples_eaten, 1);
    assert_board_consistent(&game);
}

#[tokio::test]
async fn head_on_collision_kills_both() {
    let a = Snake::spawn(SnakeId(0), Coord::new(2, 0), 1);
    let b = Snake::spawn(SnakeId(1), Coord::new(2, 2), 1);
    let mut game = Game::with_snakes(
        Field::new(5, 5),
        vec![(a, fixed(Direction::Right)), (b, fixed(Direction::Left))],
        Coord::new(4, 4),
        settings(10),
    )
    .unwrap();

    let report = game.step().await.unwrap();
    assert_eq!(report.deaths.len(), 2);
    assert_eq!(
        report.deaths[0].cause,
        DeathCause::Collision { with: SnakeId(1) }
    );
    assert_eq!(
        report.deaths[1].cause,
        DeathCause::Collision { with: SnakeId(0) }
    );
    let cells: Vec<Coord> = report.deaths.iter().map(|d| d.respawned_at).collect();
    assert_ne!(cells[0], cells[1]);
    for (death, id) in report.deaths.iter().zip([SnakeId(0), SnakeId(1)]) {
        assert_eq!(death.snake_id, id);
        let snake = game.snake(id).unwrap();
        assert_eq!(snake.segments().copied().collect::<Vec<_>>(), vec![death.respawned_at]);
        assert_ne!(death.respawned_at, game.apple());
    }
    assert_board_consistent(&game);
}

#[tokio::test]
async fn leaving_through_column_zero_respawns_same_tick() {
    let snake = Snake::from_body(SnakeId(0), [Coord::new(3, 1), Coord::new(3, 0)]).unwrap();
    let mut game = Game::with_snakes(
        Field::new(6, 6),
        vec![(snake, fixed(Direction::Left))],
        Coord::new(5, 5),
        settings(10),
    )
    .unwrap();

    let report = game.step().await.unwrap();
    assert_eq!(report.deaths.len(), 1);
    assert_eq!(report.deaths[0].cause, DeathCause::OutOfBounds);
    let snake = game.snake(SnakeId(0)).unwrap();
    assert_eq!(snake.len(), 1);
    assert_eq!(snake.head(), report.deaths[0].respawned_at);
    assert!(game.field().contains(snake.head()));
    assert_eq!(game.stats(SnakeId(0)).deaths, 1);
}

/// Answers `up` immediately, except on one chosen call where it stalls.
struct StallingAgent {
    calls: AtomicUsize,
    stall_on: usize,
    stall_for: Duration,
}

impl Agent for StallingAgent {
    fn decide(&self, _request: DecisionRequest) -> BoxFuture<'_, Result<Direction, AgentError>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let stall = if n == self.stall_on {
            Some(self.stall_for)
        } else {
            None
        };
        Box::pin(async move {
            if let Some(d) = stall {
                tokio::time::sleep(d).await;
            }
            Ok(Direction::Up)
        })
    }

    fn describe(&self) -> String {
        "stalling".to_string()
    }
}

#[tokio::test]
async fn timed_out_agent_forfeits_only_its_own_move() {
    let mut snakes: Vec<(Snake, Arc<dyn Agent>)> = (0..3)
        .map(|i| {
            let snake = Snake::spawn(SnakeId(i), Coord::new(0, 2 * i as i32), 3);
            (snake, fixed(Direction::Up))
        })
        .collect();
    let staller: Arc<dyn Agent> = Arc::new(StallingAgent {
        calls: AtomicUsize::new(0),
        stall_on: 7,
        stall_for: Duration::from_millis(500),
    });
    snakes.push((Snake::spawn(SnakeId(3), Coord::new(0, 6), 3), staller));

    let mut game = Game::with_snakes(
        Field::new(20, 20),
        snakes,
        Coord::new(19, 19),
        GameSettings {
            ticks: 10,
            spawn_length: 3,
            decision_timeout: Duration::from_millis(50),
        },
    )
    .unwrap();

    for _ in 0..6 {
        let report = game.step().await.unwrap();
        assert!(report.forfeits.is_empty());
    }

    let before = game.snake(SnakeId(3)).unwrap().clone();
    let others_before: BTreeMap<SnakeId, Coord> = (0..3)
        .map(|i| (SnakeId(i), game.snake(SnakeId(i)).unwrap().head()))
        .collect();

    let report = game.step().await.unwrap();
    assert_eq!(report.tick, 7);
    assert_eq!(report.forfeits.len(), 1);
    assert_eq!(report.forfeits[0].snake_id, SnakeId(3));
    assert!(report.forfeits[0].reason.contains("within 50 ms"));
    assert!(!report.moves.contains_key(&SnakeId(3)));
    assert_eq!(game.snake(SnakeId(3)).unwrap(), &before);
    for (id, head) in others_before {
        assert_eq!(game.snake(id).unwrap().head(), head.offset(Direction::Up));
    }
    assert_eq!(game.stats(SnakeId(3)).forfeits, 1);

    // The agent recovers on the next tick.
    let report = game.step().await.unwrap();
    assert!(report.forfeits.is_empty());
    assert_eq!(
        game.snake(SnakeId(3)).unwrap().head(),
        before.head().offset(Direction::Up)
    );
}

#[tokio::test]
async fn greedy_agents_never_share_cells() {
    let agents: Vec<Arc<dyn Agent>> = (0..4).map(|_| Arc::new(GreedyAgent) as Arc<dyn Agent>).collect();
    let mut game = Game::new(Field::new(8, 8), agents, settings(200)).unwrap();
    assert_board_consistent(&game);
    while game.is_running() {
        game.step().await.unwrap();
        assert_board_consistent(&game);
    }
    assert_eq!(game.tick(), 200);
    let eaten: u32 = (0..4).map(|i| game.stats(SnakeId(i)).apples_eaten).sum();
    assert!(eaten > 0);
}

#[test]
fn random_walks_keep_growth_and_respawn_rules() {
    let mut rng = rand::thread_rng();
    let agents: Vec<Arc<dyn Agent>> = (0..3).map(|_| fixed(Direction::Up)).collect();
    let mut game = Game::new(Field::new(7, 9), agents, settings(500)).unwrap();

    while game.is_running() {
        let apple = game.apple();
        let before: BTreeMap<SnakeId, (usize, usize)> = game
            .snakes()
            .map(|s| (s.id, (s.len(), s.target_len())))
            .collect();
        let decisions: BTreeMap<SnakeId, Direction> = before
            .keys()
            .map(|id| (*id, *Direction::ALL.choose(&mut rng).unwrap()))
            .collect();

        let report = game.apply_decisions(&decisions).unwrap();
        assert_board_consistent(&game);

        let dead: HashSet<SnakeId> = report.deaths.iter().map(|d| d.snake_id).collect();
        let mut respawns = HashSet::new();
        for death in &report.deaths {
            assert!(game.field().contains(death.respawned_at));
            assert!(respawns.insert(death.respawned_at));
        }

        for snake in game.snakes() {
            if dead.contains(&snake.id) {
                assert_eq!(snake.len(), 1);
                continue;
            }
            let (len, target) = before[&snake.id];
            let ate = report.eaten_by.contains(&snake.id);
            assert_eq!(ate, snake.head() == apple);
            if len == target {
                let expected = if ate { len + 1 } else { len };
                assert_eq!(snake.len(), expected, "tick {}", report.tick);
            }
        }
    }
}

#[test]
fn up_then_down_is_identity() {
    let c = Coord::new(4, 7);
    assert_eq!(c.offset(Direction::Up).offset(Direction::Down), c);
    assert_eq!(c.offset(Direction::Left).offset(Direction::Right), c);
}

#[test]
fn render_is_idempotent() {
    let agents: Vec<Arc<dyn Agent>> = (0..2).map(|_| fixed(Direction::Up)).collect();
    let game = Game::new(Field::new(5, 7), agents, settings(5)).unwrap();
    let first = game.render().to_string();
    assert_eq!(game.render().to_string(), first);
    assert_eq!(first.lines().count(), 7);
    assert_eq!(first.lines().next().unwrap(), "-------------");
}
