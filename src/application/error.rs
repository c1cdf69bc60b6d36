use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        admission::AdmissionError,
        clip::{FetchError, RendererError},
        decode::DecodeError,
        rewrite::RewriteError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Application specific status block used for clip failures.
pub mod status {
    use axum::http::StatusCode;

    pub const UPSTREAM_FETCH_FAILED: u16 = 701;
    pub const NO_EXTRACTION_RESULT: u16 = 702;
    pub const DISALLOWED_SCHEME: u16 = 703;
    pub const MALFORMED_URL: u16 = 704;
    pub const VALIDATION_FAILED: u16 = 705;
    pub const PRESET_NOT_FOUND: u16 = 706;
    /// Client went away before a renderer slot was granted.
    pub const CLIENT_CLOSED_REQUEST: u16 = 499;

    pub fn code(value: u16) -> StatusCode {
        StatusCode::from_u16(value).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Every way a clip request can fail.
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("source page answered with non-success status {status}")]
    UpstreamFetchFailed { status: u16 },
    #[error("no result elements for given selectors")]
    NoExtractionResult,
    #[error("disallowed url scheme `{scheme}`")]
    DisallowedScheme { scheme: String },
    #[error("malformed url: {0}")]
    MalformedUrl(#[source] url::ParseError),
    #[error("url is required")]
    MissingUrl,
    #[error(transparent)]
    Validation(DomainError),
    #[error("preset not found: {0}")]
    PresetNotFound(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("request body is empty")]
    EmptyBody,
    #[error("json unmarshal failed: {0}")]
    DecodeFailed(#[source] serde_json::Error),
    #[error("renderer reported a failure after producing output: {detail}")]
    RendererIgnorable { detail: String },
    #[error("renderer produced no output: {detail}")]
    RendererFatal { detail: String },
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error("failed to rewrite document: {0}")]
    Rewrite(#[source] RewriteError),
    #[error(transparent)]
    Fetch(FetchError),
    #[error("request cancelled before a renderer slot was granted")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClipError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClipError::UpstreamFetchFailed { .. } => "upstream_fetch_failed",
            ClipError::NoExtractionResult => "no_extraction_result",
            ClipError::DisallowedScheme { .. } => "disallowed_scheme",
            ClipError::MalformedUrl(_) => "malformed_url",
            ClipError::MissingUrl => "missing_url",
            ClipError::Validation(_) => "validation_failed",
            ClipError::PresetNotFound(_) => "preset_not_found",
            ClipError::MethodNotAllowed => "method_not_allowed",
            ClipError::EmptyBody => "empty_body",
            ClipError::DecodeFailed(_) => "decode_failed",
            ClipError::RendererIgnorable { .. } => "renderer_ignorable",
            ClipError::RendererFatal { .. } => "renderer_fatal",
            ClipError::Renderer(_) => "renderer",
            ClipError::Rewrite(_) => "rewrite",
            ClipError::Fetch(_) => "fetch",
            ClipError::Cancelled => "cancelled",
            ClipError::Internal(_) => "internal",
        }
    }
}

impl From<DomainError> for ClipError {
    fn from(error: DomainError) -> Self {
        ClipError::Validation(error)
    }
}

impl From<DecodeError> for ClipError {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::MethodNotAllowed => ClipError::MethodNotAllowed,
            DecodeError::EmptyBody => ClipError::EmptyBody,
            DecodeError::Json(err) => ClipError::DecodeFailed(err),
            DecodeError::Field(err) => ClipError::Validation(err),
        }
    }
}

impl From<RewriteError> for ClipError {
    fn from(error: RewriteError) -> Self {
        match error {
            RewriteError::NoExtractionResult => ClipError::NoExtractionResult,
            other => ClipError::Rewrite(other),
        }
    }
}

impl From<FetchError> for ClipError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Status { status } => ClipError::UpstreamFetchFailed { status },
            other => ClipError::Fetch(other),
        }
    }
}

impl From<AdmissionError> for ClipError {
    fn from(error: AdmissionError) -> Self {
        match error {
            AdmissionError::Cancelled => ClipError::Cancelled,
            AdmissionError::Closed => ClipError::internal(error.to_string()),
        }
    }
}

/// How a failed clip request is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Respond {
        status: StatusCode,
        message: String,
    },
    /// The artifact was delivered; the failure is only logged.
    Ignore,
    /// Nothing is written beyond an empty status line.
    Abort,
}

fn respond(status: StatusCode, message: impl Into<String>) -> Disposition {
    Disposition::Respond {
        status,
        message: message.into(),
    }
}

fn standard(status: StatusCode) -> Disposition {
    respond(status, status.canonical_reason().unwrap_or("Unknown Status"))
}

/// Map an error to its response. This is the only place status codes are chosen.
pub fn classify(error: &ClipError) -> Disposition {
    match error {
        ClipError::UpstreamFetchFailed { .. } => respond(
            status::code(status::UPSTREAM_FETCH_FAILED),
            "server returned non 2xx status for requested url",
        ),
        ClipError::NoExtractionResult => respond(
            status::code(status::NO_EXTRACTION_RESULT),
            "no result elements for given selectors",
        ),
        ClipError::DisallowedScheme { .. } => respond(
            status::code(status::DISALLOWED_SCHEME),
            "bad URL scheme: only http and https are supported",
        ),
        ClipError::MalformedUrl(_) => respond(status::code(status::MALFORMED_URL), "malformed url"),
        ClipError::MissingUrl => respond(StatusCode::BAD_REQUEST, "url is required"),
        ClipError::Validation(err) => respond(status::code(status::VALIDATION_FAILED), err.public_message()),
        ClipError::PresetNotFound(name) => {
            respond(status::code(status::PRESET_NOT_FOUND), format!("preset not found: {name}"))
        }
        ClipError::MethodNotAllowed => standard(StatusCode::METHOD_NOT_ALLOWED),
        ClipError::EmptyBody => respond(StatusCode::BAD_REQUEST, "request body is empty"),
        ClipError::DecodeFailed(_) => respond(StatusCode::BAD_REQUEST, "bad json value"),
        ClipError::RendererIgnorable { .. } => Disposition::Ignore,
        ClipError::Cancelled => Disposition::Abort,
        ClipError::RendererFatal { .. }
        | ClipError::Renderer(_)
        | ClipError::Rewrite(_)
        | ClipError::Fetch(_)
        | ClipError::Internal(_) => standard(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Process level failures outside the request path.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Clip(#[from] ClipError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl IntoResponse for ClipError {
    fn into_response(self) -> Response {
        match classify(&self) {
            Disposition::Respond { status, message } => {
                let report = ErrorReport::from_error("application::error::ClipError", status, &self);
                let mut response = (
                    status,
                    [(axum::http::header::CONTENT_TYPE, "text/plain")],
                    message,
                )
                    .into_response();
                report.attach(&mut response);
                response
            }
            Disposition::Ignore => StatusCode::OK.into_response(),
            Disposition::Abort => {
                let status = status::code(status::CLIENT_CLOSED_REQUEST);
                let mut response = status.into_response();
                ErrorReport::from_error("application::error::ClipError", status, &self)
                    .attach(&mut response);
                response
            }
        }
    }
}
