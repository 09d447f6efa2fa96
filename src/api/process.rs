//! Utterance processing endpoint

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::intent::Intent;

/// JSON request body
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub text: String,
}

/// Form request body, as sent by simple HTML clients
#[derive(Debug, Deserialize)]
pub struct ProcessForm {
    #[serde(default)]
    pub text_input: Option<String>,
}

/// Processing result
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub response: String,
    pub transcription: String,
    pub action_taken: bool,
    pub intent: Intent,
}

/// Process API errors
#[derive(Debug)]
pub enum ProcessError {
    BadRequest(String),
    UnsupportedMediaType,
}

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                "expected application/json or application/x-www-form-urlencoded".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

/// Handle one utterance submitted as JSON `{text}` or form field `text_input`
async fn process(
    State(state): State<Arc<ApiState>>,
    request: Request,
) -> Result<Json<ProcessResponse>, ProcessError> {
    let text = read_text(request, &state).await?;
    if text.trim().is_empty() {
        return Err(ProcessError::BadRequest("No input".to_string()));
    }

    let reply = state.assistant.handle(&text).await;

    Ok(Json(ProcessResponse {
        response: reply.reply_text,
        transcription: reply.transcription,
        action_taken: reply.action_taken,
        intent: reply.intent,
    }))
}

async fn read_text(request: Request, state: &Arc<ApiState>) -> Result<String, ProcessError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(body) = Json::<ProcessRequest>::from_request(request, state)
            .await
            .map_err(|e| ProcessError::BadRequest(e.body_text()))?;
        Ok(body.text)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(body) = Form::<ProcessForm>::from_request(request, state)
            .await
            .map_err(|e| ProcessError::BadRequest(e.body_text()))?;
        Ok(body.text_input.unwrap_or_default())
    } else {
        Err(ProcessError::UnsupportedMediaType)
    }
}

/// Build the processing router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/process", post(process))
        .with_state(state)
}
