//! HTTP API handlers for Cyclewise.
//!
//! # Privacy Guarantees
//!
//! Handlers log only the opaque `user_id`, counts, phase names, and error
//! messages. Symptom labels, notes, allergies, health conditions, and
//! generated insight text never reach the logs.
//!
//! Users are identified by the `user_id` path segment, which the
//! authentication layer in front of this service is expected to issue and
//! enforce.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::aggregation::compute_symptom_analysis;
use crate::insights::{InsightReport, TextGenerator, generate_insights};
use crate::model::{
    CycleStatus, LoggedSymptom, ProfileRequest, SymptomAnalysis, SymptomRequest, UserProfile,
};
use crate::phase::compute_cycle_status;
use crate::storage::Storage;

/// How many symptoms `GET /users/:user_id/symptoms` returns.
const LATEST_SYMPTOMS_LIMIT: u32 = 7;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,

    /// Text generator for insights; `None` disables the insights endpoint.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Days of symptom history fed into analyses and insights.
    pub symptom_window_days: u32,
}

/// Error body for rejected requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response for `GET /users/:user_id/symptoms`.
#[derive(Debug, Serialize)]
pub struct SymptomsResponse {
    pub symptoms: Vec<LoggedSymptom>,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users/:user_id/profile", put(put_profile).get(get_profile))
        .route("/users/:user_id/cycle-status", get(get_cycle_status))
        .route(
            "/users/:user_id/symptoms",
            get(get_symptoms).post(post_symptom),
        )
        .route("/users/:user_id/symptoms/analysis", get(get_symptom_analysis))
        .route("/users/:user_id/insights", post(post_insights))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load a profile or map the failure to a status code.
async fn load_profile(state: &AppState, user_id: &str) -> Result<UserProfile, StatusCode> {
    match state.storage.get_profile(user_id).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => {
            info!(user_id = %user_id, "Profile not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to load profile");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// PUT /users/:user_id/profile - Create or replace a profile.
///
/// # Request Body
///
/// ```json
/// {
///     "age": 29,
///     "last_period_date": "2026-03-01T08:00:00Z",
///     "cycle_length": 28,
///     "cycle_regularity": "regular",
///     "period_length": 5,
///     "allergies": ["peanuts"],
///     "preferences": {"diet": "vegetarian", "culture": "", "exercise": ["yoga"], "language": "en"},
///     "health": {"has_conditions": false, "conditions": "", "goals": "more energy"}
/// }
/// ```
///
/// Every field is optional.
#[instrument(skip(state, request))]
pub async fn put_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<UserProfile>, StatusCode> {
    let profile = UserProfile::from_request(&user_id, request, Utc::now());

    match state.storage.upsert_profile(&profile).await {
        Ok(stored) => {
            info!(user_id = %user_id, "Profile saved");
            Ok(Json(stored))
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to save profile");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /users/:user_id/profile - Fetch a stored profile.
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, StatusCode> {
    load_profile(&state, &user_id).await.map(Json)
}

/// GET /users/:user_id/cycle-status - Current phase and countdowns.
///
/// # Response
///
/// ```json
/// {
///     "current_phase": {"name": "Follicular", "start_day": 6, "duration": 6, "...": "..."},
///     "day_of_cycle": 11,
///     "next_period_in_days": 18,
///     "is_irregular": false,
///     "phase_start_date": "2026-03-10T09:30:00Z",
///     "phase_end_date": "2026-03-15T09:30:00Z",
///     "days_until_next_phase": 0,
///     "next_phase": {"name": "Ovulatory", "...": "..."}
/// }
/// ```
///
/// Users without a last period date get the `Tracking` placeholder with
/// `day_of_cycle` 0.
#[instrument(skip(state))]
pub async fn get_cycle_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CycleStatus>, StatusCode> {
    let profile = load_profile(&state, &user_id).await?;
    let status = compute_cycle_status(&profile.cycle, Utc::now());

    info!(
        user_id = %user_id,
        phase = %status.current_phase.name,
        day_of_cycle = status.day_of_cycle,
        "Cycle status computed"
    );
    Ok(Json(status))
}

/// POST /users/:user_id/symptoms - Log a symptom.
///
/// # Request Body
///
/// ```json
/// {
///     "type": "Cramps",
///     "category": "physical",
///     "severity": 2,
///     "date": "2026-03-14T20:00:00Z",
///     "notes": ""
/// }
/// ```
///
/// `date` defaults to server time. Category must be `physical`,
/// `emotional` or `other`; severity must be 1-3.
///
/// # Response
///
/// `201 Created` with the stored symptom, `400 Bad Request` on validation
/// failure, `404 Not Found` if the user has no profile.
#[instrument(skip(state, request))]
pub async fn post_symptom(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<SymptomRequest>,
) -> Response {
    let (observation, notes) = match request.validate(Utc::now()) {
        Ok(valid) => valid,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Rejected symptom");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    if let Err(status) = load_profile(&state, &user_id).await {
        return status.into_response();
    }

    match state
        .storage
        .insert_symptom(&user_id, &observation, &notes)
        .await
    {
        Ok(logged) => {
            // PRIVACY: the symptom label and notes are not logged
            info!(
                user_id = %user_id,
                category = observation.category.as_str(),
                severity = observation.severity,
                "Symptom logged"
            );
            (StatusCode::CREATED, Json(logged)).into_response()
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to log symptom");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /users/:user_id/symptoms - The most recent symptoms, newest first.
#[instrument(skip(state))]
pub async fn get_symptoms(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SymptomsResponse>, StatusCode> {
    load_profile(&state, &user_id).await?;

    match state
        .storage
        .latest_symptoms(&user_id, LATEST_SYMPTOMS_LIMIT)
        .await
    {
        Ok(symptoms) => {
            info!(user_id = %user_id, count = symptoms.len(), "Symptoms listed");
            Ok(Json(SymptomsResponse { symptoms }))
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to list symptoms");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /users/:user_id/symptoms/analysis - Summary of the recent window.
///
/// # Response
///
/// ```json
/// {
///     "most_common": ["Cramps", "Headache"],
///     "severity_trends": {"Cramps": 2.5, "Headache": 1.0},
///     "categories": {"physical": ["Cramps", "Cramps", "Headache"], "emotional": [], "other": []}
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_symptom_analysis(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SymptomAnalysis>, StatusCode> {
    load_profile(&state, &user_id).await?;

    match compute_symptom_analysis(
        &state.storage,
        &user_id,
        state.symptom_window_days,
        Utc::now(),
    )
    .await
    {
        Ok(analysis) => {
            info!(
                user_id = %user_id,
                symptom_types = analysis.severity_trends.len(),
                "Symptom analysis computed"
            );
            Ok(Json(analysis))
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to analyze symptoms");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /users/:user_id/insights - Generate personalised wellness insights.
///
/// # Response
///
/// ```json
/// {
///     "insights": {"nutrition plan": ["..."], "cycle insights": ["..."]},
///     "cycle_context": {"phase": "Luteal", "day_of_cycle": 20, "next_period_in_days": 9, "symptom_analysis": {}},
///     "timestamp": "2026-03-15T09:30:00Z",
///     "next_update_recommended": "2026-03-16T09:30:00Z"
/// }
/// ```
///
/// Returns `503 Service Unavailable` when no text generator is configured.
#[instrument(skip(state))]
pub async fn post_insights(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<InsightReport>, StatusCode> {
    let generator = state.generator.as_ref().ok_or_else(|| {
        warn!("Insights not configured");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let profile = load_profile(&state, &user_id).await?;
    let now = Utc::now();
    let status = compute_cycle_status(&profile.cycle, now);

    let analysis =
        match compute_symptom_analysis(&state.storage, &user_id, state.symptom_window_days, now)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to analyze symptoms");
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

    match generate_insights(generator.as_ref(), &profile, &status, analysis, now).await {
        Ok(report) => {
            info!(
                user_id = %user_id,
                phase = %status.current_phase.name,
                section_count = report.insights.len(),
                "Insights generated"
            );
            Ok(Json(report))
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Failed to generate insights");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
