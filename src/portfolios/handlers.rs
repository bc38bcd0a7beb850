use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    portfolios::{
        dto::{CreatePortfolioRequest, EnhanceRequest, Pagination, SearchParams, UpdatePortfolioRequest},
        repo::{self, Portfolio},
        services::{apply_update, clamp_limit, enhance_portfolio},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/portfolios/public", get(list_public))
        .route("/portfolios/search", get(search))
        .route("/portfolios/:id", get(get_portfolio))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/portfolios", post(create_portfolio))
        .route("/portfolios/user", get(list_own))
        .route(
            "/portfolios/:id",
            axum::routing::put(update_portfolio).delete(delete_portfolio),
        )
        .route("/portfolios/enhance", post(enhance))
}

/// Load a portfolio and require `owner` to own it. NotFound outranks
/// Forbidden: a missing resource never reveals ownership.
async fn find_owned(state: &AppState, id: Uuid, owner: Uuid) -> Result<Portfolio, ApiError> {
    let portfolio = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("portfolio"))?;
    if portfolio.user_id != owner {
        warn!(portfolio_id = %id, user_id = %owner, "ownership check failed");
        return Err(ApiError::Forbidden("portfolio belongs to another user"));
    }
    Ok(portfolio)
}

#[instrument(skip(state, payload))]
pub async fn create_portfolio(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePortfolioRequest>,
) -> Result<(StatusCode, Json<Portfolio>), ApiError> {
    if payload.name.trim().is_empty() || payload.title.trim().is_empty() {
        return Err(ApiError::Validation("name and title are required".into()));
    }

    let portfolio = repo::insert(&state.db, user_id, payload).await?;
    info!(portfolio_id = %portfolio.id, user_id = %user_id, "portfolio created");
    Ok((StatusCode::CREATED, Json(portfolio)))
}

/// By-id reads are public regardless of the visibility flag; `is_public`
/// gates only listing and search.
#[instrument(skip(state))]
pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Portfolio>, ApiError> {
    let portfolio = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("portfolio"))?;
    Ok(Json(portfolio))
}

#[instrument(skip(state))]
pub async fn list_own(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Portfolio>>, ApiError> {
    let portfolios = repo::list_by_user(&state.db, user_id).await?;
    Ok(Json(portfolios))
}

#[instrument(skip(state, payload))]
pub async fn update_portfolio(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePortfolioRequest>,
) -> Result<Json<Portfolio>, ApiError> {
    let mut portfolio = find_owned(&state, id, user_id).await?;
    apply_update(&mut portfolio, payload);
    let portfolio = repo::update(&state.db, &portfolio).await?;
    info!(portfolio_id = %id, user_id = %user_id, "portfolio updated");
    Ok(Json(portfolio))
}

#[instrument(skip(state))]
pub async fn delete_portfolio(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    find_owned(&state, id, user_id).await?;
    repo::delete(&state.db, id).await?;
    info!(portfolio_id = %id, user_id = %user_id, "portfolio deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_public(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Portfolio>>, ApiError> {
    let limit = clamp_limit(p.limit);
    let portfolios = repo::list_public(&state.db, limit, p.offset.max(0)).await?;
    Ok(Json(portfolios))
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(p): Query<SearchParams>,
) -> Result<Json<Vec<Portfolio>>, ApiError> {
    let query = p.q.trim();
    if query.is_empty() {
        return Err(ApiError::Validation("search query is required".into()));
    }
    let limit = clamp_limit(p.limit);
    let portfolios = repo::search(&state.db, query, limit, p.offset.max(0)).await?;
    Ok(Json(portfolios))
}

#[instrument(skip(state, payload))]
pub async fn enhance(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<EnhanceRequest>,
) -> Result<Json<Portfolio>, ApiError> {
    let mut portfolio = find_owned(&state, payload.portfolio_id, user_id).await?;

    enhance_portfolio(
        state.ai.as_ref(),
        &mut portfolio,
        &payload.fields,
        payload.context.as_ref(),
    )
    .await?;

    let portfolio = repo::update(&state.db, &portfolio).await?;
    info!(portfolio_id = %portfolio.id, user_id = %user_id, "portfolio enhanced");
    Ok(Json(portfolio))
}
