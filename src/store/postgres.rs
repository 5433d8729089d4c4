//! PostgreSQL repository.
//!
//! Plain `sqlx` queries against three tables. The schema is created on
//! connect when missing; votes reference their problem and user with
//! `ON DELETE CASCADE`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use super::{Repository, StoreError, StoreResult};
use crate::models::{NewProblem, NewUser, NewVote, Problem, Role, User, Vote};

const SCHEMA: [&str; 3] = [
    r"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        role TEXT NOT NULL DEFAULT 'user',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS problems (
        id BIGSERIAL PRIMARY KEY,
        hand_tiles TEXT NOT NULL,
        dora_tiles TEXT NOT NULL,
        wind TEXT NOT NULL DEFAULT '',
        round TEXT NOT NULL DEFAULT '',
        score INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS votes (
        id BIGSERIAL PRIMARY KEY,
        problem_id BIGINT NOT NULL REFERENCES problems(id) ON DELETE CASCADE,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        point INTEGER NOT NULL CHECK (point BETWEEN 0 AND 100),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
];

/// Repository backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and make sure the tables exist.
    pub async fn connect(options: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self::new(pool);
        store.migrate().await.context("Failed to migrate database")?;
        info!("Database migrated");

        Ok(store)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        name: row.try_get("name")?,
        role: Role::from_db(&role),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn problem_from_row(row: &PgRow) -> Result<Problem, sqlx::Error> {
    Ok(Problem {
        id: row.try_get("id")?,
        hand_tiles: row.try_get("hand_tiles")?,
        dora_tiles: row.try_get("dora_tiles")?,
        wind: row.try_get("wind")?,
        round: row.try_get("round")?,
        score: row.try_get("score")?,
        created_at: row.try_get("created_at")?,
    })
}

fn vote_from_row(row: &PgRow) -> Result<Vote, sqlx::Error> {
    Ok(Vote {
        id: row.try_get("id")?,
        problem_id: row.try_get("problem_id")?,
        user_id: row.try_get("user_id")?,
        point: row.try_get("point")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Map a unique violation to `Conflict`, a dangling reference or missing
/// row to `NotFound`, anything else to `Database`.
fn classify(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(format!("{} already exists", what));
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound;
        }
    }

    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Database(other),
    }
}

fn expect_deleted(rows: u64) -> StoreResult<()> {
    if rows == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl Repository for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query(
            r"
            INSERT INTO users (email, password, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password, name, role, created_at
            ",
        )
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.name)
        .bind(user.role.unwrap_or_default().to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "user"))?;

        let user = user_from_row(&row)?;
        debug!("User {} created", user.id);
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> StoreResult<User> {
        let row = sqlx::query(
            "SELECT id, email, password, name, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(user_from_row(&row)?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        let row = sqlx::query(
            "SELECT id, email, password, name, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(user_from_row(&row)?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, email, password, name, role, created_at FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        expect_deleted(result.rows_affected())
    }

    async fn create_problem(&self, problem: NewProblem) -> StoreResult<Problem> {
        let row = sqlx::query(
            r"
            INSERT INTO problems (hand_tiles, dora_tiles, wind, round, score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, hand_tiles, dora_tiles, wind, round, score, created_at
            ",
        )
        .bind(&problem.hand_tiles)
        .bind(&problem.dora_tiles)
        .bind(&problem.wind)
        .bind(&problem.round)
        .bind(problem.score)
        .fetch_one(&self.pool)
        .await?;

        let problem = problem_from_row(&row)?;
        debug!("Problem {} created", problem.id);
        Ok(problem)
    }

    async fn get_problem(&self, id: i64) -> StoreResult<Problem> {
        let row = sqlx::query(
            r"
            SELECT id, hand_tiles, dora_tiles, wind, round, score, created_at
            FROM problems WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(problem_from_row(&row)?)
    }

    async fn list_problems(&self) -> StoreResult<Vec<Problem>> {
        let rows = sqlx::query(
            r"
            SELECT id, hand_tiles, dora_tiles, wind, round, score, created_at
            FROM problems ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(problem_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count_problems(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM problems")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_problem(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM problems WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        expect_deleted(result.rows_affected())
    }

    async fn create_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let row = sqlx::query(
            r"
            INSERT INTO votes (problem_id, user_id, point)
            VALUES ($1, $2, $3)
            RETURNING id, problem_id, user_id, point, created_at
            ",
        )
        .bind(vote.problem_id)
        .bind(vote.user_id)
        .bind(vote.point)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "vote"))?;

        let vote = vote_from_row(&row)?;
        debug!("Vote {} saved for problem {}", vote.id, vote.problem_id);
        Ok(vote)
    }

    async fn votes_for_problem(&self, problem_id: i64) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query(
            r"
            SELECT id, problem_id, user_id, point, created_at
            FROM votes WHERE problem_id = $1
            ",
        )
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(vote_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn votes_for_user(&self, user_id: i64) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query(
            r"
            SELECT id, problem_id, user_id, point, created_at
            FROM votes WHERE user_id = $1 ORDER BY id ASC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(vote_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
