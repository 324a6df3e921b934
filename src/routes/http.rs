//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs basic request/result info.

use std::sync::Arc;
use axum::{extract::{State, Query}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::analytics::{spawn_export, ExportForm};
use crate::protocol::*;
use crate::state::AppState;
use crate::logic::*;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_achievements(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LanguageQuery>,
) -> impl IntoResponse {
  let language = q.language.unwrap_or_default();
  let list: Vec<AchievementOut> = achievement_catalog(&state, language)
    .into_iter()
    .map(|(id, title)| AchievementOut { id, title })
    .collect();
  info!(target: "wayfinder_backend", lang = language.code(), count = list.len(), "HTTP achievements served");
  Json(list)
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len(), lang = body.language.code()))]
pub async fn http_post_translate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TranslateIn>,
) -> impl IntoResponse {
  let translation = do_translate(&state, &body.text, body.language).await;
  Json(TranslateOut { translation })
}

/// Accepts the export and returns at once; delivery happens in the background.
#[instrument(level = "info", skip(state, body), fields(score = body.score))]
pub async fn http_post_export(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ExportForm>,
) -> impl IntoResponse {
  let queued = spawn_export(state.http.clone(), &state.analytics, body);
  info!(target: "analytics", %queued, "HTTP export accepted");
  Json(ExportOut { ok: true })
}
