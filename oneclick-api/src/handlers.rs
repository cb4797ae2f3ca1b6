//! API request handlers

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use oneclick_core::{ActionError, FormEvent, FormEventArgs};
use oneclick_engine::RuleList;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct RuleSummary {
    pub id: String,
    pub name: String,
    pub work_item_type: String,
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub work_item_type_enabled: bool,
    pub loading: bool,
    pub rules: Vec<RuleSummary>,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub dispatched: FormEvent,
    pub last_error: Option<ActionError>,
}

#[derive(Debug, Serialize)]
pub struct LastErrorResponse {
    pub last_error: Option<ActionError>,
    /// Display form of the error
    pub message: Option<String>,
}

impl LastErrorResponse {
    fn new(last_error: Option<ActionError>) -> Self {
        let message = last_error.as_ref().map(ToString::to_string);
        Self {
            last_error,
            message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub old_index: usize,
    pub new_index: usize,
}

fn rules_response(state: &AppState, rules: RuleList) -> RulesResponse {
    RulesResponse {
        work_item_type_enabled: state.dispatcher.engine().work_item_type_enabled(),
        loading: state.dispatcher.is_loading(),
        rules: rules
            .iter()
            .map(|r| RuleSummary {
                id: r.id().to_string(),
                name: r.name().to_string(),
                work_item_type: r.work_item_type().to_string(),
                project_id: r.project_id().to_string(),
            })
            .collect(),
    }
}

// ==================== Form Event Handlers ====================

/// Deliver a lifecycle event to the form's rules
pub async fn dispatch_event(
    State(state): State<Arc<AppState>>,
    Path(event): Path<String>,
    args: Option<Json<FormEventArgs>>,
) -> Result<impl IntoResponse, ApiError> {
    let event: FormEvent = event.parse()?;
    let args = args.map(|Json(args)| args).unwrap_or_default();

    state.dispatcher.on_event(event, args).await?;
    tracing::debug!("Dispatched {} event", event);

    Ok(Json(DispatchResponse {
        dispatched: event,
        last_error: state.dispatcher.last_error(),
    }))
}

pub async fn get_form_fields(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.form.fields())
}

// ==================== Rule Handlers ====================

/// Rules currently held by the dispatcher
pub async fn list_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(rules_response(&state, state.dispatcher.rules()))
}

/// Reload rules from the server, bypassing the local cache
pub async fn refresh_rules(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rules = state.dispatcher.refresh().await?;
    tracing::info!("Refreshed {} rules", rules.len());
    Ok(Json(rules_response(&state, rules)))
}

pub async fn reorder_rules(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rules = state.dispatcher.reorder(req.old_index, req.new_index)?;
    Ok(Json(rules_response(&state, rules)))
}

/// Run a single rule regardless of its triggers
pub async fn execute_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let error = state.dispatcher.execute_rule(&id).await?;
    Ok(Json(LastErrorResponse::new(error)))
}

// ==================== Error Slot Handlers ====================

pub async fn get_last_error(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LastErrorResponse::new(state.dispatcher.last_error()))
}

pub async fn clear_last_error(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.dispatcher.clear_error();
    Json(LastErrorResponse::new(None))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "oneclick"
    }))
}
