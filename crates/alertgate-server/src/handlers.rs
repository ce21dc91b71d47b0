//! HTTP request handlers.

use std::sync::Arc;

use alertgate_core::{
    AlertEvent, IncidentReport, WebhookMessage, WireAlert, find_active, finish_incident,
    record_incident,
};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

/// Action name reported for alerts that could not be decided.
pub const REJECTED: &str = "rejected";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Outcome for one alert of a webhook batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertDecision {
    /// The alert's name, when it had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alertname: Option<String>,
    /// The action taken, or `rejected`.
    pub action: String,
    /// Suppression reason or rejection cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Response to `POST /webhook`.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Always `ok`.
    pub result: &'static str,
    /// One entry per alert, in request order.
    pub decisions: Vec<AlertDecision>,
}

/// Response to the incident endpoints.
#[derive(Debug, Serialize)]
pub struct IncidentResponse {
    /// Records written to the store.
    pub alerts: Vec<WireAlert>,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> GatewayResult<T> {
    serde_json::from_slice(body).map_err(|e| GatewayError::InvalidJson(e.to_string()))
}

/// Handle GET /health - health check endpoint.
pub async fn health_check(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle POST /webhook - decide on every alert of an Alertmanager batch.
///
/// Side effects are spawned; the response reports decisions only.
pub async fn receive_webhook(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> GatewayResult<Json<WebhookResponse>> {
    let message: WebhookMessage = parse_body(&body)?;
    let now = Utc::now();

    info!(
        alerts = message.alerts.len(),
        receiver = message.receiver.as_deref().unwrap_or(""),
        "received webhook"
    );

    let mut decisions = Vec::with_capacity(message.alerts.len());
    for wire in &message.alerts {
        decisions.push(decide_alert(&state, &message, wire, now).await);
    }

    Ok(Json(WebhookResponse {
        result: "ok",
        decisions,
    }))
}

async fn decide_alert(
    state: &GatewayState,
    envelope: &WebhookMessage,
    wire: &WireAlert,
    now: DateTime<Utc>,
) -> AlertDecision {
    let alertname = wire.alertname().map(str::to_string);

    let event = match AlertEvent::try_from(wire.clone()) {
        Ok(event) => event,
        Err(e) => {
            warn!(alert = alertname.as_deref().unwrap_or(""), error = %e, "rejected alert");
            return rejected(alertname, &e);
        }
    };

    let prior = match state.prior_state(&event).await {
        Ok(prior) => prior,
        Err(e) => {
            warn!(alert = %event.name(), error = %e, "rejected alert with unreadable state");
            return rejected(alertname, &e);
        }
    };

    let rules = state.resolver().resolve_for(&event);
    let action = state.engine().decide(&event, Some(&prior), &rules, now);

    info!(
        alert = %event.name(),
        rules = %event.rule_name(),
        action = action.kind(),
        reason = action.suppress_reason().map(|r| r.as_str()),
        "decision"
    );

    // The tasks outlive the request.
    state.track(state.dispatcher().dispatch(&action, &event, envelope));

    AlertDecision {
        alertname,
        action: action.kind().to_string(),
        reason: action.suppress_reason().map(|r| r.as_str().to_string()),
    }
}

fn rejected(alertname: Option<String>, err: &alertgate_core::AlertError) -> AlertDecision {
    AlertDecision {
        alertname,
        action: REJECTED.to_string(),
        reason: Some(err.to_string()),
    }
}

/// Handle POST /alerts - record incidents reported by monitored systems.
pub async fn record_incidents(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> GatewayResult<Json<IncidentResponse>> {
    let reports: Vec<IncidentReport> = parse_body(&body)?;
    let now = Utc::now();

    let mut records = Vec::with_capacity(reports.len());
    for report in &reports {
        let active = state.store().active(&report.name, None).await?;
        records.push(record_incident(report, find_active(&active, &report.name), now)?);
    }

    state.store().post(&records).await?;
    info!(count = records.len(), "recorded incidents");

    Ok(Json(IncidentResponse { alerts: records }))
}

/// Handle DELETE /alerts - finish the active alerts named by the reports.
pub async fn finish_incidents(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> GatewayResult<Json<IncidentResponse>> {
    let reports: Vec<IncidentReport> = parse_body(&body)?;
    let now = Utc::now();

    let mut records = Vec::with_capacity(reports.len());
    for report in &reports {
        let active = state.store().active(&report.name, None).await?;
        match find_active(&active, &report.name) {
            Some(existing) => records.push(finish_incident(report, existing, now)),
            None => info!(alert = %report.name, "no active alert to finish"),
        }
    }

    state.store().post(&records).await?;
    info!(count = records.len(), "finished incidents");

    Ok(Json(IncidentResponse { alerts: records }))
}
