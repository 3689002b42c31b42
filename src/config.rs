// Application configuration, loaded from a JSON file, environment variables and CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::config::*;
use crate::engine::game::GameSettings;
use crate::engine::grid::Field;

/// Startup configuration errors. Fatal: no game is constructed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("field dimensions must be positive, got {height}x{width}")]
    NonPositiveDimensions { height: i32, width: i32 },
    #[error("at least one player is required")]
    NoPlayers,
    #[error("{players} players requested but the field only has {starts} starting positions")]
    TooManyPlayers { players: usize, starts: usize },
    #[error("a {height}x{width} field cannot hold {players} snakes and an apple")]
    FieldTooSmall {
        height: i32,
        width: i32,
        players: usize,
    },
    #[error("spawn length must be at least 1")]
    ZeroSpawnLength,
}

/// Check that a field of `height` x `width` can host `players` snakes plus the apple.
pub fn validate_layout(
    height: i32,
    width: i32,
    players: usize,
    spawn_length: usize,
) -> Result<(), ConfigError> {
    if height <= 0 || width <= 0 {
        return Err(ConfigError::NonPositiveDimensions { height, width });
    }
    if players == 0 {
        return Err(ConfigError::NoPlayers);
    }
    if spawn_length == 0 {
        return Err(ConfigError::ZeroSpawnLength);
    }
    let starts = Field::new(height, width).perimeter().len();
    if players > starts {
        return Err(ConfigError::TooManyPlayers { players, starts });
    }
    if (height as usize) * (width as usize) < players + 1 {
        return Err(ConfigError::FieldTooSmall {
            height,
            width,
            players,
        });
    }
    Ok(())
}

// --- JSON file layout ---

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    field: Option<FieldSection>,
    players: Option<PlayersSection>,
    ticks: Option<u64>,
    decision_timeout_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    spawn_length: Option<usize>,
    spectator_port: Option<u16>,
    local: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldSection {
    height: Option<i32>,
    width: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayersSection {
    number: Option<usize>,
    hostname: Option<String>,
    start_port: Option<u16>,
}

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "game_config.json";

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of rows (the `x` axis of the agent protocol).
    pub field_height: i32,
    /// Number of columns (the `y` axis of the agent protocol).
    pub field_width: i32,
    pub players: usize,
    /// Host every agent listens on.
    pub hostname: String,
    /// Agent `n` listens on `start_port + n`.
    pub start_port: u16,
    pub ticks: u64,
    pub decision_timeout_ms: u64,
    /// Pause between ticks, for watching the field.
    pub tick_interval_ms: u64,
    pub spawn_length: usize,
    /// Serve the spectator API on this port when set.
    pub spectator_port: Option<u16>,
    /// Run the reference strategy in-process instead of calling HTTP agents.
    pub local_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            field_height: 10,
            field_width: 10,
            players: 2,
            hostname: "localhost".to_string(),
            start_port: 8000,
            ticks: DEFAULT_TICKS,
            decision_timeout_ms: DEFAULT_DECISION_TIMEOUT_MS,
            tick_interval_ms: 0,
            spawn_length: DEFAULT_SPAWN_LENGTH,
            spectator_port: None,
            local_mode: false,
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the JSON file, then environment
    /// variables, then CLI flags.
    ///
    /// File: `--config <path>` or `SNAKE_CONFIG`, else `game_config.json` if present.
    ///
    /// Environment variables:
    /// - `SNAKE_FIELD_HEIGHT`, `SNAKE_FIELD_WIDTH`
    /// - `SNAKE_PLAYERS`, `SNAKE_AGENT_HOST`, `SNAKE_START_PORT`
    /// - `SNAKE_TICKS`, `SNAKE_DECISION_TIMEOUT_MS`, `SNAKE_TICK_INTERVAL_MS`
    /// - `SNAKE_SPAWN_LENGTH`, `SNAKE_SPECTATOR_PORT`
    /// - `SNAKE_LOCAL_MODE` - `true` or `1`
    ///
    /// CLI flags: `--ticks N`, `--players N`, `--spectator-port P`, `--local`.
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        let env = |key: &str| std::env::var(key).ok();
        Self::load_from(&args, env)
    }

    /// `load` with injectable arguments and environment lookup.
    pub fn load_from<E>(args: &[String], env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        let explicit_path = Self::parse_cli_value(args, "--config").or_else(|| env("SNAKE_CONFIG"));
        match explicit_path {
            Some(path) => config.apply_file(Path::new(&path))?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    config.apply_file(default)?;
                }
            }
        }

        if let Some(v) = env("SNAKE_FIELD_HEIGHT") {
            config.field_height = parse_value("SNAKE_FIELD_HEIGHT", &v)?;
        }
        if let Some(v) = env("SNAKE_FIELD_WIDTH") {
            config.field_width = parse_value("SNAKE_FIELD_WIDTH", &v)?;
        }
        if let Some(v) = env("SNAKE_PLAYERS") {
            config.players = parse_value("SNAKE_PLAYERS", &v)?;
        }
        if let Some(v) = env("SNAKE_AGENT_HOST") {
            config.hostname = v;
        }
        if let Some(v) = env("SNAKE_START_PORT") {
            config.start_port = parse_value("SNAKE_START_PORT", &v)?;
        }
        if let Some(v) = env("SNAKE_TICKS") {
            config.ticks = parse_value("SNAKE_TICKS", &v)?;
        }
        if let Some(v) = env("SNAKE_DECISION_TIMEOUT_MS") {
            config.decision_timeout_ms = parse_value("SNAKE_DECISION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env("SNAKE_TICK_INTERVAL_MS") {
            config.tick_interval_ms = parse_value("SNAKE_TICK_INTERVAL_MS", &v)?;
        }
        if let Some(v) = env("SNAKE_SPAWN_LENGTH") {
            config.spawn_length = parse_value("SNAKE_SPAWN_LENGTH", &v)?;
        }
        if let Some(v) = env("SNAKE_SPECTATOR_PORT") {
            config.spectator_port = Some(parse_value("SNAKE_SPECTATOR_PORT", &v)?);
        }
        if let Some(v) = env("SNAKE_LOCAL_MODE") {
            config.local_mode = v.eq_ignore_ascii_case("true") || v == "1";
        }

        // CLI flags take precedence
        if let Some(v) = Self::parse_cli_value(args, "--ticks") {
            config.ticks = parse_value("--ticks", &v)?;
        }
        if let Some(v) = Self::parse_cli_value(args, "--players") {
            config.players = parse_value("--players", &v)?;
        }
        if let Some(v) = Self::parse_cli_value(args, "--spectator-port") {
            config.spectator_port = Some(parse_value("--spectator-port", &v)?);
        }
        if args.iter().any(|a| a == "--local") {
            config.local_mode = true;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(field) = file.field {
            self.field_height = field.height.unwrap_or(self.field_height);
            self.field_width = field.width.unwrap_or(self.field_width);
        }
        if let Some(players) = file.players {
            self.players = players.number.unwrap_or(self.players);
            if let Some(host) = players.hostname {
                self.hostname = host;
            }
            self.start_port = players.start_port.unwrap_or(self.start_port);
        }
        self.ticks = file.ticks.unwrap_or(self.ticks);
        self.decision_timeout_ms = file.decision_timeout_ms.unwrap_or(self.decision_timeout_ms);
        self.tick_interval_ms = file.tick_interval_ms.unwrap_or(self.tick_interval_ms);
        self.spawn_length = file.spawn_length.unwrap_or(self.spawn_length);
        self.spectator_port = file.spectator_port.or(self.spectator_port);
        self.local_mode = file.local.unwrap_or(self.local_mode);
    }

    /// Reject configurations no game can be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_layout(
            self.field_height,
            self.field_width,
            self.players,
            self.spawn_length,
        )?;
        if self.start_port as usize + self.players - 1 > u16::MAX as usize {
            return Err(ConfigError::InvalidValue {
                key: "start_port".into(),
                value: self.start_port.to_string(),
            });
        }
        Ok(())
    }

    pub fn field(&self) -> Field {
        Field::new(self.field_height, self.field_width)
    }

    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            ticks: self.ticks,
            spawn_length: self.spawn_length,
            decision_timeout: Duration::from_millis(self.decision_timeout_ms),
        }
    }

    /// Port of the agent bound to snake `index`.
    pub fn agent_port(&self, index: usize) -> u16 {
        self.start_port.saturating_add(index as u16)
    }

    /// Parse a CLI flag value like `--ticks 50`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
