//! Handlers for `/profiles` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/profiles` | Optional `?status=`, `?site=`, `?segment=`, `?q=`, `?limit=`, `?offset=` |
//! | `GET`  | `/profiles/:id` | 404 if not found |
//! | `GET`  | `/profiles/:id/events` | Recent activity, newest first |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use trellis_core::{
  profile::{Profile, ProfileStatus},
  store::{HubStore, ProfileQuery, StoredEvent},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Free-text filter over email and first name.
  pub q:       Option<String>,
  pub status:  Option<ProfileStatus>,
  pub site:    Option<String>,
  pub segment: Option<String>,
  pub limit:   Option<usize>,
  pub offset:  Option<usize>,
}

/// `GET /profiles[?status=...][&site=...][&segment=...][&q=...]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Profile>>, ApiError>
where
  S: HubStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let query = ProfileQuery {
    text:    params.q,
    status:  params.status,
    site:    params.site,
    segment: params.segment,
    limit:   params.limit,
    offset:  params.offset,
  };

  let profiles = state
    .store
    .list_profiles(&query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(profiles))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /profiles/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError>
where
  S: HubStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let profile = state
    .store
    .get_profile(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("profile {id} not found")))?;
  Ok(Json(profile))
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EventsParams {
  pub limit: Option<usize>,
}

/// `GET /profiles/:id/events[?limit=...]`
pub async fn events<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<EventsParams>,
) -> Result<Json<Vec<StoredEvent>>, ApiError>
where
  S: HubStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  // 404 for unknown profiles rather than an empty list.
  state
    .store
    .get_profile(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("profile {id} not found")))?;

  let events = state
    .store
    .list_events(id, params.limit.unwrap_or(50))
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(events))
}
