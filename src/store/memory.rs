//! In-memory repository.
//!
//! Keeps every table in a `BTreeMap` behind one lock so ids come back in
//! insertion order. Used by `--in-memory` runs and by the tests.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{Repository, StoreError, StoreResult};
use crate::models::{NewProblem, NewUser, NewVote, Problem, User, Vote};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    problems: BTreeMap<i64, Problem>,
    votes: BTreeMap<i64, Vote>,
    sequences: Sequences,
}

/// One id counter per table, starting at 1.
#[derive(Debug, Default)]
struct Sequences {
    users: i64,
    problems: i64,
    votes: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Repository that lives for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write();

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }

        let id = next(&mut tables.sequences.users);
        let record = User {
            id,
            email: user.email,
            password: user.password,
            name: user.name,
            role: user.role.unwrap_or_default(),
            created_at: Utc::now(),
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: i64) -> StoreResult<User> {
        self.tables
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        self.tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().users.values().cloned().collect())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write();
        tables.users.remove(&id).ok_or(StoreError::NotFound)?;
        tables.votes.retain(|_, v| v.user_id != id);
        Ok(())
    }

    async fn create_problem(&self, problem: NewProblem) -> StoreResult<Problem> {
        let mut tables = self.tables.write();
        let id = next(&mut tables.sequences.problems);
        let record = Problem {
            id,
            hand_tiles: problem.hand_tiles,
            dora_tiles: problem.dora_tiles,
            wind: problem.wind,
            round: problem.round,
            score: problem.score,
            created_at: Utc::now(),
        };
        tables.problems.insert(id, record.clone());
        Ok(record)
    }

    async fn get_problem(&self, id: i64) -> StoreResult<Problem> {
        self.tables
            .read()
            .problems
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_problems(&self) -> StoreResult<Vec<Problem>> {
        Ok(self.tables.read().problems.values().cloned().collect())
    }

    async fn count_problems(&self) -> StoreResult<i64> {
        Ok(self.tables.read().problems.len() as i64)
    }

    async fn delete_problem(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write();
        tables.problems.remove(&id).ok_or(StoreError::NotFound)?;
        tables.votes.retain(|_, v| v.problem_id != id);
        Ok(())
    }

    async fn create_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let mut tables = self.tables.write();
        let id = next(&mut tables.sequences.votes);
        let record = Vote {
            id,
            problem_id: vote.problem_id,
            user_id: vote.user_id,
            point: vote.point,
            created_at: Utc::now(),
        };
        tables.votes.insert(id, record.clone());
        Ok(record)
    }

    async fn votes_for_problem(&self, problem_id: i64) -> StoreResult<Vec<Vote>> {
        Ok(self
            .tables
            .read()
            .votes
            .values()
            .filter(|v| v.problem_id == problem_id)
            .cloned()
            .collect())
    }

    async fn votes_for_user(&self, user_id: i64) -> StoreResult<Vec<Vote>> {
        Ok(self
            .tables
            .read()
            .votes
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }
}
