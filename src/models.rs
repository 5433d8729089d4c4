//! Data models for the scoring service.
//!
//! This module contains the records kept by the store, the request
//! payloads accepted over HTTP and the result structures returned to
//! the front-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest tile id (7 honors after 27 suited tiles).
pub const MAX_TILE_ID: u8 = 33;

/// Inclusive range a vote point must fall in.
pub const MIN_POINT: i32 = 0;
pub const MAX_POINT: i32 = 100;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular participant, can vote.
    #[default]
    User,
    /// Can create and delete problems.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Parse a stored role string. Unknown values fall back to `User`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: i64,
    pub email: String,
    /// Stored as given; never serialized in responses.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

/// Signup payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A quiz item: a hand configuration users score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "ID")]
    pub id: i64,
    /// JSON array of tile ids, e.g. `"[0,1,2,9]"`.
    pub hand_tiles: String,
    /// JSON array of dora indicator tile ids.
    pub dora_tiles: String,
    /// Seat wind, e.g. `"East"`.
    pub wind: String,
    /// Round, e.g. `"East-1"`.
    pub round: String,
    /// Points held by the player.
    pub score: i32,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

/// Problem creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProblem {
    pub hand_tiles: String,
    #[serde(default = "empty_tiles")]
    pub dora_tiles: String,
    #[serde(default)]
    pub wind: String,
    #[serde(default)]
    pub round: String,
    #[serde(default)]
    pub score: i32,
}

fn empty_tiles() -> String {
    "[]".to_string()
}

impl NewProblem {
    /// Check that both tile strings are JSON arrays of valid tile ids.
    pub fn validate(&self) -> Result<(), String> {
        let hand = parse_tiles(&self.hand_tiles).map_err(|e| format!("hand_tiles: {}", e))?;
        if hand.is_empty() {
            return Err("hand_tiles: hand must contain at least one tile".to_string());
        }
        parse_tiles(&self.dora_tiles).map_err(|e| format!("dora_tiles: {}", e))?;
        Ok(())
    }
}

/// Parse a JSON tile array such as `"[0,1,27]"`.
pub fn parse_tiles(raw: &str) -> Result<Vec<u8>, String> {
    let ids: Vec<i64> =
        serde_json::from_str(raw).map_err(|e| format!("not a JSON array of integers ({})", e))?;

    ids.into_iter()
        .map(|id| {
            u8::try_from(id)
                .ok()
                .filter(|id| *id <= MAX_TILE_ID)
                .ok_or_else(|| format!("tile id {} out of range 0-{}", id, MAX_TILE_ID))
        })
        .collect()
}

/// A single user's score for a problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "ID")]
    pub id: i64,
    pub problem_id: i64,
    pub user_id: i64,
    /// Score in `[0, 100]`.
    pub point: i32,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

/// Vote payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVote {
    pub problem_id: i64,
    pub user_id: i64,
    pub point: i32,
}

impl NewVote {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_POINT..=MAX_POINT).contains(&self.point) {
            return Err(format!(
                "point must be between {} and {}, got {}",
                MIN_POINT, MAX_POINT, self.point
            ));
        }
        Ok(())
    }
}

/// One histogram bucket of the result screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Label, e.g. `"50-59"` or `"100"`.
    pub range: String,
    /// Number of votes in the bucket.
    pub count: usize,
}

/// Everything the result screen shows for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Mean of all votes, one decimal.
    pub average: f64,
    /// Population standard deviation, one decimal.
    pub std_dev: f64,
    /// The caller's own score, echoed back.
    pub user_score: i32,
    /// T-score of `user_score`, one decimal.
    pub user_dev: f64,
    pub vote_count: usize,
    pub histogram: Vec<HistogramBin>,
}

/// Voting history of one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserVoteStats {
    pub user_id: i64,
    pub total_votes: usize,
    pub average_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<i32>,
    pub votes: Vec<Vote>,
}
