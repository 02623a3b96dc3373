use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpResponse, ResponseError};
use bytes::Bytes;
use futures::StreamExt;
use providers::{GenerateRequest, Generator};
use relay_core::llm::GenerateError;
use serde_json::json;
use tracing::warn;

pub const GREETING: &str = "Welcome to relay";

#[get("/ct")]
pub async fn ct() -> HttpResponse {
    HttpResponse::Ok().json(json!({"success": true, "message": GREETING}))
}

/// Streams the generated text as newline-delimited JSON: one
/// `{"delta": ...}` object per fragment. A failure after streaming has
/// begun appends a final `{"error": ...}` line and ends the stream.
#[post("/generate")]
pub async fn generate(
    req: web::Json<GenerateRequest>,
    generator: web::Data<Generator>,
) -> Result<HttpResponse, ApiError> {
    let mut fragments = generator.generate(req.into_inner()).await.map_err(ApiError)?;
    let body = async_stream::stream! {
        while let Some(item) = fragments.next().await {
            match item {
                Ok(delta) => {
                    yield Ok::<_, std::convert::Infallible>(frame(json!({"delta": delta})));
                }
                Err(e) => {
                    warn!(target:"server::generate","stream aborted: {e}");
                    yield Ok(frame(json!({"error": e.to_string()})));
                    break;
                }
            }
        }
    };
    Ok(HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .streaming(body))
}

fn frame(v: serde_json::Value) -> Bytes {
    let mut line = v.to_string();
    line.push('\n');
    Bytes::from(line)
}

#[derive(Debug)]
pub struct ApiError(pub GenerateError);

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            GenerateError::InvalidRequest(_)
            | GenerateError::MissingCredential(_)
            | GenerateError::UnsupportedModel(_) => StatusCode::BAD_REQUEST,
            GenerateError::EmptyResponse => StatusCode::BAD_GATEWAY,
            GenerateError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(json!({"success": false, "error": self.0.to_string()}))
    }
}
