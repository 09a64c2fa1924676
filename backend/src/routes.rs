use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde_json::json;
use shared::HealthResponse;
use uuid::Uuid;

use crate::analysis::{AnalyzeError, AssessmentError, AssessmentPipeline, DecodeError};
use crate::model::ModelRegistry;
use crate::notify::{Attachment, TelegramNotifier};

const UPLOAD_FIELD: &str = "file";
const FALLBACK_FILENAME: &str = "image.jpg";

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub pipeline: AssessmentPipeline,
    pub notifier: Option<Arc<TelegramNotifier>>,
    pub send_by_default: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Internal server error: {0}")]
    Assessment(#[from] AssessmentError),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AnalyzeError> for ServiceError {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::Decode(e) => ServiceError::Decode(e),
            AnalyzeError::Assessment(e) => ServiceError::Assessment(e),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) | ServiceError::Decode(_) => StatusCode::BAD_REQUEST,
            ServiceError::Assessment(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/analyze_image").route(web::post().to(analyze_image)));
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Image Analysis API is up and running" }))
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        models_loaded: state.registry.is_loaded(),
    })
}

struct Upload {
    bytes: Vec<u8>,
    filename: String,
}

async fn read_upload(payload: &mut Multipart) -> Result<Upload, ServiceError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| ServiceError::BadRequest(format!("Malformed multipart body: {}", e)))?;
            }
            continue;
        }
        let is_image = field
            .content_type()
            .map(|mime| mime.essence_str().starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ServiceError::BadRequest("File must be an image".to_string()));
        }
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk
                .map_err(|e| ServiceError::BadRequest(format!("Failed to read upload: {}", e)))?;
            bytes.extend_from_slice(&data);
        }
        return Ok(Upload { bytes, filename });
    }
    Err(ServiceError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

async fn analyze_image(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let request_id = Uuid::new_v4();
    let Upload { bytes, filename } = read_upload(&mut payload).await.map_err(|e| {
        warn!("[{}] Rejected upload: {}", request_id, e);
        e
    })?;
    info!(
        "[{}] Assessing '{}' ({} bytes)",
        request_id,
        filename,
        bytes.len()
    );

    let pipeline = state.pipeline.clone();
    let declared = filename.clone();
    let (outcome, bytes) = web::block(move || {
        let outcome = pipeline.assess_bytes(&bytes, &declared);
        (outcome, bytes)
    })
    .await
    .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let report = outcome.map_err(|e| {
        error!("[{}] Assessment failed: {}", request_id, e);
        ServiceError::from(e)
    })?;
    info!(
        "[{}] {} / defects: {} / {}",
        request_id,
        report.quality(),
        report.defects(),
        report.color().color_name()
    );

    if state.send_by_default {
        if let Some(notifier) = state.notifier.clone() {
            let report = report.clone();
            let attachment = Attachment {
                bytes,
                filename: if filename.is_empty() {
                    FALLBACK_FILENAME.to_string()
                } else {
                    filename
                },
            };
            actix_web::rt::spawn(async move {
                if let Err(e) = notifier.send_report(&report, Some(attachment)).await {
                    warn!("[{}] Telegram notification failed: {}", request_id, e);
                }
            });
        }
    }

    Ok(HttpResponse::Ok().json(report.to_response()))
}
