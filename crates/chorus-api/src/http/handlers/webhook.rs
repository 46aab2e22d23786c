//! Webhook receiver handler.
//!
//! Verifies the HMAC-SHA256 signature over `nonce || body` before any byte
//! of the payload is parsed, decodes the envelope, and runs the message
//! pipeline. Every handled disposition returns 200; only verification and
//! parse failures surface as 401/400.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use secrecy::ExposeSecret;
use uuid::Uuid;

use chorus_core::pipeline::PipelineOutcome;
use chorus_infra::dispatch::{NONCE_HEADER, SIGNATURE_HEADER};
use chorus_infra::webhook::signature;
use chorus_types::error::WebhookError;
use chorus_types::webhook::InboundMessage;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /webhook - Receive an inbound platform message.
pub async fn receive_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    let nonce = headers
        .get(NONCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingNonce)?;

    signature::verify(
        state.config.webhook.secret.expose_secret().as_bytes(),
        nonce,
        &body,
        signature_header,
    )?;

    let message = InboundMessage::from_bytes(&body)?;

    tracing::info!(
        room_token = %message.room_token,
        message_id = %message.message_id,
        "webhook accepted"
    );

    let outcome = state.pipeline.handle(&message).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(
        serde_json::json!({
            "outcome": outcome_label(outcome),
            "room_token": message.room_token,
        }),
        request_id,
        elapsed,
    ))
}

fn outcome_label(outcome: PipelineOutcome) -> &'static str {
    match outcome {
        PipelineOutcome::Replied => "replied",
        PipelineOutcome::Onboarding => "onboarding",
        PipelineOutcome::Reset => "reset",
        PipelineOutcome::Redirected => "redirected",
        PipelineOutcome::Ignored => "ignored",
        PipelineOutcome::NoPersona => "no_persona",
        PipelineOutcome::CompletionFailed => "completion_failed",
    }
}
