//! HTTP handlers.
//!
//! Each handler parses its input, calls the repository and, for result
//! requests, hands the vote snapshot to the aggregator.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{error::ApiError, AppState};
use crate::analysis::{aggregate_votes, user_vote_stats};
use crate::models::{
    AggregateResult, Credentials, NewProblem, NewUser, NewVote, Problem, User, UserVoteStats,
};
use crate::store::{authenticate, LoginError};

type ApiResult<T> = Result<T, ApiError>;

/// Parse a numeric path segment.
fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} ID", what)))
}

/// Unwrap a JSON body, turning extractor failures into `BadRequest`.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Read an optional integer query parameter.
fn query_int(params: &HashMap<String, String>, key: &str) -> ApiResult<Option<i64>> {
    match params.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {}: {}", key, raw))),
    }
}

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "status": "ok", "service": env!("CARGO_PKG_NAME") }))
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}

/// `POST /signup`
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let input = body(payload)?;

    if input.email.trim().is_empty() || input.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let user = state
        .repo
        .create_user(input)
        .await
        .map_err(|e| ApiError::from_store(e, "User"))?;

    info!("User {} signed up", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let input = body(payload)?;

    match authenticate(state.repo.as_ref(), &input).await {
        Ok(user) => {
            debug!("User {} logged in", user.id);
            Ok(Json(user))
        }
        Err(LoginError::UnknownEmail) => Err(ApiError::Unauthorized("User not found")),
        Err(LoginError::WrongPassword) => {
            warn!("Failed login for {}", input.email);
            Err(ApiError::Unauthorized("Invalid password"))
        }
        Err(LoginError::Store(e)) => Err(ApiError::from_store(e, "User")),
    }
}

/// `GET /users`
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = state
        .repo
        .list_users()
        .await
        .map_err(|e| ApiError::from_store(e, "User"))?;
    Ok(Json(users))
}

/// `DELETE /users/{id}`, dropping the user's votes too.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&raw, "user")?;

    state
        .repo
        .delete_user(id)
        .await
        .map_err(|e| ApiError::from_store(e, "User"))?;

    info!("User {} deleted", id);
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

/// `GET /users/{id}/votes`
pub async fn user_votes(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<UserVoteStats>> {
    let id = parse_id(&raw, "user")?;
    let map_err = |e| ApiError::from_store(e, "User");

    state.repo.find_user(id).await.map_err(map_err)?;
    let votes = state.repo.votes_for_user(id).await.map_err(map_err)?;

    Ok(Json(user_vote_stats(id, votes)))
}

/// `GET /problems`
pub async fn list_problems(State(state): State<AppState>) -> ApiResult<Json<Vec<Problem>>> {
    let problems = state
        .repo
        .list_problems()
        .await
        .map_err(|e| ApiError::from_store(e, "Problem"))?;
    Ok(Json(problems))
}

/// `POST /problems`
pub async fn create_problem(
    State(state): State<AppState>,
    payload: Result<Json<NewProblem>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Problem>)> {
    let input = body(payload)?;
    input.validate().map_err(ApiError::BadRequest)?;

    let problem = state
        .repo
        .create_problem(input)
        .await
        .map_err(|e| ApiError::from_store(e, "Problem"))?;

    info!("Problem {} created", problem.id);
    Ok((StatusCode::CREATED, Json(problem)))
}

/// `GET /problems/{id}`
pub async fn get_problem(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Problem>> {
    let id = parse_id(&raw, "problem")?;

    let problem = state
        .repo
        .get_problem(id)
        .await
        .map_err(|e| ApiError::from_store(e, "Problem"))?;
    Ok(Json(problem))
}

/// `DELETE /problems/{id}`
pub async fn delete_problem(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&raw, "problem")?;

    state
        .repo
        .delete_problem(id)
        .await
        .map_err(|e| ApiError::from_store(e, "Problem"))?;

    info!("Problem {} deleted", id);
    Ok(Json(json!({ "message": "Problem deleted successfully" })))
}

/// `POST /votes`
pub async fn cast_vote(
    State(state): State<AppState>,
    payload: Result<Json<NewVote>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = body(payload)?;
    input.validate().map_err(ApiError::BadRequest)?;

    state
        .repo
        .get_problem(input.problem_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Problem"))?;
    state
        .repo
        .find_user(input.user_id)
        .await
        .map_err(|e| ApiError::from_store(e, "User"))?;

    let vote = state
        .repo
        .create_vote(input)
        .await
        .map_err(|e| ApiError::from_store(e, "Vote"))?;

    debug!(
        "User {} voted {} on problem {}",
        vote.user_id, vote.point, vote.problem_id
    );
    Ok((StatusCode::CREATED, Json(json!({ "message": "Vote casted!" }))))
}

/// `GET /results?problem_id=1&my_score=80`
pub async fn results(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<AggregateResult>> {
    let problem_id = query_int(&params, "problem_id")?
        .ok_or_else(|| ApiError::BadRequest("problem_id is required".to_string()))?;

    problem_result(&state, problem_id, &params).await
}

/// `GET /problems/{id}/result?my_score=80`
pub async fn problem_result_by_path(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<AggregateResult>> {
    let problem_id = parse_id(&raw, "problem")?;
    problem_result(&state, problem_id, &params).await
}

async fn problem_result(
    state: &AppState,
    problem_id: i64,
    params: &HashMap<String, String>,
) -> ApiResult<Json<AggregateResult>> {
    let my_score = query_int(params, "my_score")?.unwrap_or(0);
    let my_score = i32::try_from(my_score)
        .map_err(|_| ApiError::BadRequest(format!("Invalid my_score: {}", my_score)))?;
    let map_err = |e| ApiError::from_store(e, "Problem");

    state.repo.get_problem(problem_id).await.map_err(map_err)?;
    let votes = state
        .repo
        .votes_for_problem(problem_id)
        .await
        .map_err(map_err)?;

    let result = aggregate_votes(&votes, my_score);
    debug!(
        "Problem {}: {} votes, average {}, user_dev {}",
        problem_id, result.vote_count, result.average, result.user_dev
    );
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12", "user").unwrap(), 12);
        assert!(parse_id("abc", "user").is_err());
        assert!(parse_id("", "problem").is_err());
    }

    #[test]
    fn test_query_int() {
        let mut params = HashMap::new();
        assert_eq!(query_int(&params, "my_score").unwrap(), None);

        params.insert("my_score".to_string(), "80".to_string());
        assert_eq!(query_int(&params, "my_score").unwrap(), Some(80));

        params.insert("my_score".to_string(), "".to_string());
        assert_eq!(query_int(&params, "my_score").unwrap(), None);

        params.insert("my_score".to_string(), "eighty".to_string());
        assert!(query_int(&params, "my_score").is_err());
    }
}
