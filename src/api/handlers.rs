use crate::api::{AppState, AuthUser};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::search::{AdvancedQuery, SortOrder};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const AVATAR_SIZE: u32 = 128;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        search_enabled: state.search.is_enabled(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub search_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

// Users

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub about_me: Option<String>,
    pub avatar: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            avatar: user.avatar(AVATAR_SIZE),
            id: user.id,
            username: user.username,
            about_me: user.about_me,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub review_count: u64,
    pub whiskies_tried: Vec<Whisky>,
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterUser>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    request.validate()?;

    let user = state.db.write(move |w| w.create_user(&request)).await?;
    tracing::info!(user_id = user.id, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Public profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let user = state
        .db
        .user_by_username(&username)?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))?;

    let review_count = state.db.review_count_by(user.id)?;
    let whiskies_tried = state.db.tried_whiskies(user.id)?;

    Ok(Json(ProfileResponse {
        user: UserResponse::from(user),
        review_count,
        whiskies_tried,
    }))
}

/// Edit the caller's own profile
pub async fn edit_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<EditProfile>,
) -> Result<Json<UserResponse>> {
    request.validate()?;

    let user_id = user.id;
    let updated = state
        .db
        .write(move |w| w.update_profile(user_id, &request))
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

// Distilleries

#[derive(Debug, Serialize)]
pub struct DistilleryDetail {
    #[serde(flatten)]
    pub distillery: Distillery,
    pub whiskies: Vec<Whisky>,
}

/// All distilleries, by name
pub async fn list_distilleries(State(state): State<AppState>) -> Result<Json<Vec<Distillery>>> {
    Ok(Json(state.db.distilleries()?))
}

pub async fn add_distillery(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<DistilleryInput>,
) -> Result<(StatusCode, Json<Distillery>)> {
    request.validate()?;

    let distillery = state.db.write(move |w| w.add_distillery(&request)).await?;
    tracing::info!(distillery_id = distillery.id, user_id = user.id, "Distillery added");

    Ok((StatusCode::CREATED, Json(distillery)))
}

pub async fn get_distillery(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DistilleryDetail>> {
    let distillery = state
        .db
        .distillery(id)?
        .ok_or_else(|| AppError::NotFound(format!("Distillery {} not found", id)))?;
    let whiskies = state.db.whiskies_of(id)?;

    Ok(Json(DistilleryDetail {
        distillery,
        whiskies,
    }))
}

pub async fn edit_distillery(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<DistilleryInput>,
) -> Result<Json<Distillery>> {
    request.validate()?;
    let distillery = state
        .db
        .write(move |w| w.update_distillery(id, &request))
        .await?;
    Ok(Json(distillery))
}

pub async fn add_whisky(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(distillery_id): Path<i64>,
    Json(request): Json<WhiskyInput>,
) -> Result<(StatusCode, Json<Whisky>)> {
    request.validate()?;
    let whisky = state
        .db
        .write(move |w| w.add_whisky(distillery_id, &request))
        .await?;
    Ok((StatusCode::CREATED, Json(whisky)))
}

// Whiskies

#[derive(Debug, Serialize)]
pub struct WhiskyDetail {
    #[serde(flatten)]
    pub whisky: Whisky,
    pub full_name: String,
    pub reviews: Page<Review>,
}

/// Whisky with its reviews, newest first
pub async fn get_whisky(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<WhiskyDetail>> {
    let whisky = find_whisky(&state, id)?;
    let pagination = state.search.pagination(params.page, params.per_page);
    let reviews = state.db.recent_reviews(Some(id), pagination)?;

    Ok(Json(WhiskyDetail {
        full_name: whisky.full_name(),
        whisky,
        reviews,
    }))
}

pub async fn edit_whisky(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<WhiskyInput>,
) -> Result<Json<Whisky>> {
    request.validate()?;
    let whisky = state.db.write(move |w| w.update_whisky(id, &request)).await?;
    Ok(Json(whisky))
}

#[derive(Debug, Serialize)]
pub struct TriedResponse {
    pub whisky_id: i64,
    pub tried: bool,
}

/// Flip the caller's "tried" mark on a whisky
pub async fn toggle_tried(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TriedResponse>> {
    find_whisky(&state, id)?;
    let user_id = user.id;
    let tried = state
        .db
        .write(move |w| w.toggle_whisky_tried(user_id, id))
        .await?;

    Ok(Json(TriedResponse {
        whisky_id: id,
        tried,
    }))
}

pub async fn submit_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(whisky_id): Path<i64>,
    Json(request): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>)> {
    request.validate()?;
    find_whisky(&state, whisky_id)?;

    let author_id = user.id;
    let review_id = state
        .db
        .write(move |w| w.create_review(author_id, whisky_id, &request))
        .await?;
    tracing::info!(review_id, whisky_id, author_id, "Review submitted");

    Ok((StatusCode::CREATED, Json(find_review(&state, review_id)?)))
}

// Reviews

/// Every review, newest first
pub async fn explore(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Review>>> {
    let pagination = state.search.pagination(params.page, params.per_page);
    Ok(Json(state.db.recent_reviews(None, pagination)?))
}

pub async fn edit_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<ReviewInput>,
) -> Result<Json<Review>> {
    request.validate()?;
    ensure_author(&find_review(&state, id)?, &user)?;

    state.db.write(move |w| w.update_review(id, &request)).await?;
    Ok(Json(find_review(&state, id)?))
}

pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ensure_author(&find_review(&state, id)?, &user)?;

    state.db.write(move |w| w.delete_review(id)).await?;
    tracing::info!(review_id = id, "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Search

#[derive(Debug, Default, Deserialize)]
pub struct SimpleSearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub sort: SortOrder,
    pub tag: Option<String>,
}

/// `q` supports `@tag` filters and `-word` exclusions
pub async fn simple_search(
    State(state): State<AppState>,
    Query(params): Query<SimpleSearchParams>,
) -> Result<Json<Page<Review>>> {
    let pagination = state.search.pagination(params.page, params.per_page);
    let tag = params.tag.as_deref().filter(|t| !t.trim().is_empty());

    let page = state
        .search
        .simple_search(&params.q, pagination, params.sort, tag)
        .await?;
    Ok(Json(page))
}

// Spelled out rather than flattening AdvancedQuery: query-string
// deserialization cannot parse numbers through `#[serde(flatten)]`.
#[derive(Debug, Default, Deserialize)]
pub struct AdvancedSearchParams {
    pub review: Option<String>,
    pub score_lower: Option<i64>,
    #[serde(alias = "score_greater")]
    pub score_upper: Option<i64>,
    pub author: Option<String>,
    pub whisky: Option<String>,
    pub tags: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl AdvancedSearchParams {
    fn query(&self) -> AdvancedQuery {
        AdvancedQuery {
            review: self.review.clone(),
            score_lower: self.score_lower,
            score_upper: self.score_upper,
            author: self.author.clone(),
            whisky: self.whisky.clone(),
            tags: self.tags.clone(),
        }
    }
}

pub async fn advanced_search(
    State(state): State<AppState>,
    Query(params): Query<AdvancedSearchParams>,
) -> Result<Json<Page<Review>>> {
    let pagination = state.search.pagination(params.page, params.per_page);
    let page = state
        .search
        .advanced_search(&params.query(), pagination, params.sort)
        .await?;
    Ok(Json(page))
}

// Helpers

fn find_whisky(state: &AppState, id: i64) -> Result<Whisky> {
    state
        .db
        .whisky(id)?
        .ok_or_else(|| AppError::NotFound(format!("Whisky {} not found", id)))
}

fn find_review(state: &AppState, id: i64) -> Result<Review> {
    state
        .db
        .review(id)?
        .ok_or_else(|| AppError::NotFound(format!("Review {} not found", id)))
}

fn ensure_author(review: &Review, user: &User) -> Result<()> {
    if review.author_id != user.id {
        return Err(AppError::Authorization(
            "Only the author may change this review".to_string(),
        ));
    }
    Ok(())
}
