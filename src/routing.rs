// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Routing Conventions
//!
//! Well-known exchange names, routing key prefixes and the payload types that
//! travel on them. Routing keys follow `<prefix>.<username>`; subscribers bind
//! with `<prefix>.*` on the topic exchange.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Direct exchange carrying control signals (exact key match)
pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";
/// Topic exchange carrying gameplay events (pattern key match)
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";
/// Exchange receiving every message a queue discards
pub const EXCHANGE_PERIL_DEAD_LETTER: &str = "peril_dlx";
/// Queue bound to the dead-letter exchange
pub const QUEUE_PERIL_DEAD_LETTER: &str = "peril_dlq";

pub const PAUSE_KEY: &str = "pause";
pub const ARMY_MOVES_PREFIX: &str = "army_moves";
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";
pub const GAME_LOG_SLUG: &str = "game_logs";

/// Builds a per-player routing key, e.g. `army_moves.alice`.
pub fn player_key(prefix: &str, username: &str) -> String {
    format!("{prefix}.{username}")
}

/// Builds a topic binding matching every player under `prefix`.
pub fn any_player(prefix: &str) -> String {
    format!("{prefix}.*")
}

/// Pause/resume signal published on the direct exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayingState {
    pub is_paused: bool,
}

/// Entry published on `game_logs.<username>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    pub current_time: SystemTime,
    pub message: String,
    pub username: String,
}
