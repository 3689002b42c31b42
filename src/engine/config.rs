// Engine constants

/// Length a freshly spawned or respawned snake grows toward.
pub const DEFAULT_SPAWN_LENGTH: usize = 3;

/// Default number of ticks in a game.
pub const DEFAULT_TICKS: u64 = 100;

/// Default bound on a single agent decision request (milliseconds).
pub const DEFAULT_DECISION_TIMEOUT_MS: u64 = 500;

// Occupancy wire encoding
pub const WIRE_EMPTY: &str = "_";
pub const WIRE_SNAKE: &str = "S";
pub const WIRE_OUT_OF_BOUNDS: &str = "X";

// Field print glyphs
pub const GLYPH_EMPTY: char = '_';
pub const GLYPH_APPLE: char = 'A';
pub const GLYPH_BODY: char = 'o';

/// Broadcast channel capacity for spectator messages.
pub const BROADCAST_CAPACITY: usize = 256;

/// Warn when a tick (decision gathering included) exceeds this many milliseconds.
pub const SLOW_TICK_WARN_MS: f64 = 2_000.0;
