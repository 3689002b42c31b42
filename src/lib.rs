//! Multiplayer snake arena: a tick-driven engine that asks remote HTTP agents
//! for a move each tick, resolves growth and collisions, and streams the field
//! to spectators.

pub mod agent;
pub mod api;
pub mod config;
pub mod engine;
pub mod metrics;
