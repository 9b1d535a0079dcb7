//! Tag and review API endpoints.
//!
//! Tags and reviews share one handler core parameterized by
//! [`AttributeKind`]; the route functions below are the two instantiations.
//! Attributes have no create endpoint: rows come into existence through book
//! reconciliation.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::models::{Attribute, AttributeKind, UpdateAttributeRequest, User};
use crate::AppState;

/// Query parameters for attribute listing.
#[derive(Debug, Deserialize)]
pub struct AttributeListQuery {
    /// When `1`, list only attributes linked to at least one of the
    /// requester's books.
    #[serde(default)]
    pub assigned_only: Option<u8>,
}

async fn list_attributes(
    state: AppState,
    user: User,
    kind: AttributeKind,
    query: AttributeListQuery,
) -> ApiResult<Vec<Attribute>> {
    let assigned_only = query.assigned_only == Some(1);
    let attributes = state
        .repo
        .list_attributes(kind, user.id, assigned_only)
        .await?;
    success(attributes)
}

async fn update_attribute(
    state: AppState,
    user: User,
    kind: AttributeKind,
    id: i64,
    request: UpdateAttributeRequest,
) -> ApiResult<Attribute> {
    let attribute = state
        .repo
        .update_attribute(kind, id, user.id, &request.name)
        .await?;
    success(attribute)
}

async fn delete_attribute(
    state: AppState,
    user: User,
    kind: AttributeKind,
    id: i64,
) -> ApiResult<()> {
    state.repo.delete_attribute(kind, id, user.id).await?;
    success(())
}

/// GET /api/tags - List the requester's tags.
pub async fn list_tags(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AttributeListQuery>,
) -> ApiResult<Vec<Attribute>> {
    list_attributes(state, user, AttributeKind::Tag, query).await
}

/// PATCH /api/tags/:id - Rename a tag.
pub async fn update_tag(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAttributeRequest>,
) -> ApiResult<Attribute> {
    update_attribute(state, user, AttributeKind::Tag, id, request).await
}

/// DELETE /api/tags/:id - Delete a tag, keeping the books it was linked to.
pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    delete_attribute(state, user, AttributeKind::Tag, id).await
}

/// GET /api/reviews - List the requester's reviews.
pub async fn list_reviews(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AttributeListQuery>,
) -> ApiResult<Vec<Attribute>> {
    list_attributes(state, user, AttributeKind::Review, query).await
}

/// PATCH /api/reviews/:id - Rename a review.
pub async fn update_review(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAttributeRequest>,
) -> ApiResult<Attribute> {
    update_attribute(state, user, AttributeKind::Review, id, request).await
}

/// DELETE /api/reviews/:id - Delete a review, keeping the books it was linked to.
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    delete_attribute(state, user, AttributeKind::Review, id).await
}
