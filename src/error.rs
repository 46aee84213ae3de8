use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Everything the generation endpoint can answer with besides a portrait.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("no image provided")]
    MissingImage,
    #[error("invalid image format")]
    InvalidImageFormat,
    #[error("generation failed, no content returned")]
    NoContent,
    #[error("no image produced")]
    NoImageProduced { details: String },
    #[error("{message}")]
    Provider {
        message: &'static str,
        details: String,
    },
}

impl GenerateError {
    /// Wraps a provider-boundary failure, classifying the raw message into
    /// a user-facing one. The raw text is kept as diagnostic detail.
    pub fn provider(err: &anyhow::Error) -> Self {
        let raw = format!("{err:#}");
        GenerateError::Provider {
            message: classify_provider_error(&raw),
            details: raw,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            GenerateError::MissingImage | GenerateError::InvalidImageFormat => {
                (StatusCode::BAD_REQUEST, None)
            }
            GenerateError::NoContent => (StatusCode::INTERNAL_SERVER_ERROR, None),
            GenerateError::NoImageProduced { details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some(details.clone()))
            }
            GenerateError::Provider { details, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some(details.clone()))
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// One row of the classification table. A row matches when any `needles_any`
/// entry appears in the lowercased message and every `needles_all` entry does.
struct ProviderErrorRule {
    needles_any: &'static [&'static str],
    needles_all: &'static [&'static str],
    message: &'static str,
}

// Evaluated top to bottom, first match wins.
const PROVIDER_ERROR_RULES: &[ProviderErrorRule] = &[
    ProviderErrorRule {
        needles_any: &["api key", "unauthorized"],
        needles_all: &[],
        message: "generation service is not configured correctly",
    },
    ProviderErrorRule {
        needles_any: &["rate limit", "quota"],
        needles_all: &[],
        message: "too many requests, please retry later",
    },
    ProviderErrorRule {
        needles_any: &[],
        needles_all: &["image", "large"],
        message: "image too large (>5MB)",
    },
    ProviderErrorRule {
        needles_any: &["invalid", "format"],
        needles_all: &[],
        message: "invalid image format, use JPG/PNG",
    },
];

const GENERIC_PROVIDER_ERROR: &str = "generation failed";

fn classify_provider_error(raw: &str) -> &'static str {
    let lowered = raw.to_lowercase();
    for rule in PROVIDER_ERROR_RULES {
        let any_hit = rule.needles_any.is_empty()
            || rule.needles_any.iter().any(|needle| lowered.contains(needle));
        let all_hit = rule.needles_all.iter().all(|needle| lowered.contains(needle));
        if any_hit && all_hit {
            return rule.message;
        }
    }
    GENERIC_PROVIDER_ERROR
}
