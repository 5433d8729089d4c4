//! Persistence layer.
//!
//! Handlers talk to a [`Repository`]; two implementations exist, one
//! backed by PostgreSQL and one kept in process memory.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::{Credentials, NewProblem, NewUser, NewVote, Problem, User, Vote};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised by a repository.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Create/read/delete operations over users, problems and votes.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: i64) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Removes the user and every vote they cast.
    async fn delete_user(&self, id: i64) -> StoreResult<()>;

    async fn create_problem(&self, problem: NewProblem) -> StoreResult<Problem>;
    async fn get_problem(&self, id: i64) -> StoreResult<Problem>;
    /// All problems, ascending by id.
    async fn list_problems(&self) -> StoreResult<Vec<Problem>>;
    async fn count_problems(&self) -> StoreResult<i64>;
    /// Removes the problem and every vote cast on it.
    async fn delete_problem(&self, id: i64) -> StoreResult<()>;

    async fn create_vote(&self, vote: NewVote) -> StoreResult<Vote>;
    async fn votes_for_problem(&self, problem_id: i64) -> StoreResult<Vec<Vote>>;
    async fn votes_for_user(&self, user_id: i64) -> StoreResult<Vec<Vote>>;
}

/// Outcome of a login attempt.
#[derive(Debug)]
pub enum LoginError {
    UnknownEmail,
    WrongPassword,
    Store(StoreError),
}

/// Look up the account and compare the password as stored.
pub async fn authenticate(repo: &dyn Repository, input: &Credentials) -> Result<User, LoginError> {
    let user = match repo.find_user_by_email(&input.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(LoginError::UnknownEmail),
        Err(e) => return Err(LoginError::Store(e)),
    };

    if user.password != input.password {
        return Err(LoginError::WrongPassword);
    }

    Ok(user)
}

/// Problem inserted into an empty store on startup.
pub fn sample_problem() -> NewProblem {
    NewProblem {
        hand_tiles: "[0,1,2,9,10,11,18,19,20,27,27,31,31,32]".to_string(),
        dora_tiles: "[28]".to_string(),
        wind: "East".to_string(),
        round: "East-1".to_string(),
        score: 25000,
    }
}

/// Insert the sample problem when no problem exists yet.
pub async fn seed_if_empty(repo: &dyn Repository) -> StoreResult<bool> {
    if repo.count_problems().await? > 0 {
        return Ok(false);
    }

    info!("Seeding initial data...");
    let problem = repo.create_problem(sample_problem()).await?;
    info!("Sample problem {} created", problem.id);
    Ok(true)
}
