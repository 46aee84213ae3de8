use axum::extract::State;
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::GenerateError;
use crate::llm::{ResponsePart, SourceImage};
use crate::state::AppState;

static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/(\w+);base64,(.+)$").expect("valid data url regex"));

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub image: String,
    pub text: Option<String>,
}

/// Splits a `data:image/<subtype>;base64,<payload>` string into the MIME
/// type and the untouched payload. The payload is not re-validated as
/// base64; a corrupt one surfaces as a provider error.
fn parse_image_data_url(image: &str) -> Option<SourceImage> {
    let captures = DATA_URL_RE.captures(image)?;
    Some(SourceImage {
        mime_type: format!("image/{}", &captures[1]),
        data: captures[2].to_string(),
    })
}

/// Single pass over the provider's parts, later parts overwriting earlier
/// ones of the same kind. Inline parts come back as full data URLs.
fn fold_parts(parts: Vec<ResponsePart>) -> (Option<String>, Option<String>) {
    let mut image = None;
    let mut text = None;
    for part in parts {
        match part {
            ResponsePart::Inline { mime_type, data } => {
                image = Some(format!("data:{mime_type};base64,{data}"));
            }
            ResponsePart::Text(value) => text = Some(value),
        }
    }
    (image, text)
}

pub async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, GenerateError> {
    if request.image.is_empty() {
        return Err(GenerateError::MissingImage);
    }

    let source =
        parse_image_data_url(&request.image).ok_or(GenerateError::InvalidImageFormat)?;
    info!(
        "Generating portrait from a {} upload ({} base64 chars)",
        source.mime_type,
        source.data.len()
    );

    let parts = state.generator.generate(&source).await.map_err(|err| {
        error!("Portrait generation failed: {err:#}");
        GenerateError::provider(&err)
    })?;
    let Some(parts) = parts else {
        return Err(GenerateError::NoContent);
    };

    let (image, text) = fold_parts(parts);
    let Some(image) = image else {
        return Err(GenerateError::NoImageProduced {
            details: text.unwrap_or_else(|| "unknown error".to_string()),
        });
    };

    info!("Portrait generated ({} data-url chars)", image.len());
    Ok(Json(GenerateResponse { image, text }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::llm::PortraitGenerator;

    const PIXEL_PNG_PAYLOAD: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    enum StubReply {
        Parts(Option<Vec<ResponsePart>>),
        Failure(String),
    }

    struct StubGenerator {
        reply: StubReply,
        seen: Mutex<Option<SourceImage>>,
    }

    impl StubGenerator {
        fn parts(parts: Vec<ResponsePart>) -> Self {
            StubGenerator {
                reply: StubReply::Parts(Some(parts)),
                seen: Mutex::new(None),
            }
        }

        fn no_parts() -> Self {
            StubGenerator {
                reply: StubReply::Parts(None),
                seen: Mutex::new(None),
            }
        }

        fn failing(message: &str) -> Self {
            StubGenerator {
                reply: StubReply::Failure(message.to_string()),
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl PortraitGenerator for StubGenerator {
        async fn generate(&self, image: &SourceImage) -> Result<Option<Vec<ResponsePart>>> {
            *self.seen.lock().unwrap() = Some(image.clone());
            match &self.reply {
                StubReply::Parts(parts) => Ok(parts.clone()),
                StubReply::Failure(message) => Err(anyhow!("{message}")),
            }
        }
    }

    fn app(generator: Arc<StubGenerator>) -> Router {
        Router::new()
            .route("/api/generate", post(generate_handler))
            .with_state(AppState::new(generator))
    }

    async fn post_generate(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        let response = app.oneshot(request).await.expect("handler ran");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body read")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).expect("json body");
        (status, value)
    }

    fn pixel_data_url() -> String {
        format!("data:image/png;base64,{PIXEL_PNG_PAYLOAD}")
    }

    #[test]
    fn parses_the_pixel_png_data_url_without_touching_the_payload() {
        let source = parse_image_data_url(&pixel_data_url()).expect("parses");
        assert_eq!(source.mime_type, "image/png");
        assert_eq!(source.data, PIXEL_PNG_PAYLOAD);
    }

    #[test]
    fn rejects_strings_that_are_not_data_urls() {
        assert!(parse_image_data_url("not-an-image").is_none());
        assert!(parse_image_data_url("data:image/png;base64,").is_none());
        assert!(parse_image_data_url("data:text/plain;base64,QUJD").is_none());
        assert!(parse_image_data_url("data:image/png;QUJD").is_none());
    }

    #[test]
    fn jpeg_subtype_becomes_the_mime_type() {
        let source = parse_image_data_url("data:image/jpeg;base64,QUJD").expect("parses");
        assert_eq!(source.mime_type, "image/jpeg");
        assert_eq!(source.data, "QUJD");
    }

    #[test]
    fn later_parts_of_each_kind_overwrite_earlier_ones() {
        let (image, text) = fold_parts(vec![
            ResponsePart::Inline {
                mime_type: "image/png".to_string(),
                data: "Zmlyc3Q=".to_string(),
            },
            ResponsePart::Text("draft".to_string()),
            ResponsePart::Inline {
                mime_type: "image/png".to_string(),
                data: "c2Vjb25k".to_string(),
            },
            ResponsePart::Text("final".to_string()),
        ]);
        assert_eq!(image.as_deref(), Some("data:image/png;base64,c2Vjb25k"));
        assert_eq!(text.as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn missing_image_field_is_a_400() {
        let app = app(Arc::new(StubGenerator::no_parts()));
        let (status, body) = post_generate(app, json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no image provided");
    }

    #[tokio::test]
    async fn empty_image_field_is_a_400() {
        let app = app(Arc::new(StubGenerator::no_parts()));
        let (status, body) = post_generate(app, json!({ "image": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no image provided");
    }

    #[tokio::test]
    async fn malformed_image_string_is_a_400() {
        let app = app(Arc::new(StubGenerator::no_parts()));
        let (status, body) = post_generate(app, json!({ "image": "not-an-image" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid image format");
    }

    #[tokio::test]
    async fn forwards_the_exact_mime_type_and_payload_to_the_provider() {
        let generator = Arc::new(StubGenerator::parts(vec![ResponsePart::Inline {
            mime_type: "image/png".to_string(),
            data: "cmVzdWx0".to_string(),
        }]));
        let app = app(generator.clone());

        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"], "data:image/png;base64,cmVzdWx0");
        assert_eq!(body["text"], Value::Null);

        let seen = generator.seen.lock().unwrap().clone().expect("provider called");
        assert_eq!(seen.mime_type, "image/png");
        assert_eq!(seen.data, PIXEL_PNG_PAYLOAD);
    }

    #[tokio::test]
    async fn absent_part_list_is_a_500_no_content() {
        let app = app(Arc::new(StubGenerator::no_parts()));
        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "generation failed, no content returned");
    }

    #[tokio::test]
    async fn text_only_reply_is_a_500_with_the_text_as_details() {
        let app = app(Arc::new(StubGenerator::parts(vec![ResponsePart::Text(
            "safety filters declined this image".to_string(),
        )])));
        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "no image produced");
        assert_eq!(body["details"], "safety filters declined this image");
    }

    #[tokio::test]
    async fn empty_part_list_reports_an_unknown_error_detail() {
        let app = app(Arc::new(StubGenerator::parts(Vec::new())));
        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "no image produced");
        assert_eq!(body["details"], "unknown error");
    }

    #[tokio::test]
    async fn the_last_inline_part_wins() {
        let app = app(Arc::new(StubGenerator::parts(vec![
            ResponsePart::Inline {
                mime_type: "image/png".to_string(),
                data: "Zmlyc3Q=".to_string(),
            },
            ResponsePart::Inline {
                mime_type: "image/jpeg".to_string(),
                data: "c2Vjb25k".to_string(),
            },
        ])));
        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"], "data:image/jpeg;base64,c2Vjb25k");
    }

    #[tokio::test]
    async fn success_carries_the_accompanying_text() {
        let app = app(Arc::new(StubGenerator::parts(vec![
            ResponsePart::Text("happy new year".to_string()),
            ResponsePart::Inline {
                mime_type: "image/png".to_string(),
                data: "cG9ydHJhaXQ=".to_string(),
            },
        ])));
        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"], "data:image/png;base64,cG9ydHJhaXQ=");
        assert_eq!(body["text"], "happy new year");
    }

    #[tokio::test]
    async fn rate_limited_provider_errors_classify_to_the_throttling_message() {
        let app = app(Arc::new(StubGenerator::failing(
            "Gemini request failed with status 429: Rate limit exceeded",
        )));
        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "too many requests, please retry later");
        assert!(body["details"]
            .as_str()
            .expect("details string")
            .contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn unclassified_provider_errors_fall_back_to_the_generic_message() {
        let app = app(Arc::new(StubGenerator::failing("connection reset by peer")));
        let (status, body) = post_generate(app, json!({ "image": pixel_data_url() })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "generation failed");
        assert_eq!(body["details"], "connection reset by peer");
    }
}
