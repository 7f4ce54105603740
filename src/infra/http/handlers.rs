use axum::{
    Json,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{Artifact, ConversionRequest, PayloadKind};

use super::{
    HttpState,
    error::{ConvertHttpError, ErrorReport},
};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const ATTACHMENT_DISPOSITION: &str = "attachment; filename=\"converted.pdf\"";
const SOURCE: &str = "infra::http::convert";

#[derive(Debug, Deserialize)]
struct JsonSubmission {
    html: Option<String>,
}

/// `POST /convert`: accept a document (raw body or `{"html": ...}`),
/// run it through the pipeline, and return the PDF as an attachment.
pub async fn convert(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return ConvertHttpError::payload_too_large(state.converter.max_payload_bytes())
                .into_response();
        }
        Err(_) => {
            return ConvertHttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            )
            .into_response();
        }
    };

    let request = match decode_submission(&headers, body) {
        Ok(request) => request,
        Err(response) => return *response,
    };

    match state.converter.convert(request).await {
        Ok(artifact) => artifact_response(artifact),
        Err(err) => ConvertHttpError::from(err).into_response(),
    }
}

/// `GET /health`: probe the rendering engine.
pub async fn health(State(state): State<HttpState>) -> Response {
    match state.converter.engine().probe().await {
        Ok(available) => Json(json!({
            "status": "healthy",
            "engine_available": available,
        }))
        .into_response(),
        Err(err) => {
            let mut response = (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "error": err.to_string(),
                    "engine_available": false,
                })),
            )
                .into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// `GET /`: service description for humans and smoke tests.
pub async fn index(State(state): State<HttpState>) -> Json<serde_json::Value> {
    let max_mb = state.converter.max_payload_bytes() / (1024 * 1024);
    Json(json!({
        "name": "stampa",
        "description": "Convert HTML to PDF using an external rendering engine",
        "endpoints": {
            "POST /convert": "Convert HTML to PDF",
            "GET /health": "Rendering engine liveness probe",
            "GET /": "API information",
        },
        "usage": {
            "content_type": "text/html or application/json",
            "max_size": format!("{max_mb}MB"),
            "example_json": {
                "html": "<!DOCTYPE html><html><head><title>Test</title></head><body><h1>Hello World</h1></body></html>",
            },
        },
    }))
}

fn decode_submission(
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ConversionRequest, Box<Response>> {
    if body.is_empty() {
        return Err(bad_request("Empty request body"));
    }

    if !is_json_submission(headers) {
        return Ok(ConversionRequest::new(body, PayloadKind::Raw));
    }

    let submission: JsonSubmission = serde_json::from_slice(&body)
        .map_err(|_| bad_request("Request body is not valid JSON"))?;
    let html = submission
        .html
        .ok_or_else(|| bad_request("Missing \"html\" field in JSON body"))?;

    Ok(ConversionRequest::new(
        html.into_bytes(),
        PayloadKind::Json,
    ))
}

fn is_json_submission(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

fn bad_request(message: &'static str) -> Box<Response> {
    Box::new(ConvertHttpError::new(SOURCE, StatusCode::BAD_REQUEST, message).into_response())
}

fn artifact_response(artifact: Artifact) -> Response {
    let mut response = (StatusCode::OK, artifact.into_bytes()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PDF_CONTENT_TYPE),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(ATTACHMENT_DISPOSITION),
    );
    response
}
