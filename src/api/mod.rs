// src/api/mod.rs
use std::sync::Arc;

use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{web, App, Error, HttpResponse, HttpServer};
use chrono::Utc;
use futures_util::stream::StreamExt;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::chunker::SplitPolicy;
use crate::config::ApiConfig;
use crate::llm_provider::LlmProvider;
use crate::processor::{self, ProcessOptions};

/// Single-page form UI, embedded so the binary is self-contained.
const INDEX_PAGE: &str = include_str!("ui.html");

/// Shared handles for the handlers. The provider is constructed once in
/// `main` and passed in; nothing here is a process-wide global.
pub struct AppState {
    pub provider: Arc<dyn LlmProvider>,
}

/// Generate a short request ID for correlation
fn generate_request_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

pub async fn index_page() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_PAGE))
}

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let request_id = generate_request_id();
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "model": state.provider.model_name(),
        "timestamp": Utc::now().to_rfc3339(),
        "request_id": request_id
    })))
}

/// Everything the form can carry, collected from the multipart stream.
#[derive(Default)]
struct Submission {
    text: String,
    file_text: Option<String>,
    policy_kind: String,
    limit: Option<usize>,
    with_summary: bool,
}

/// A user-facing rejection, distinct from provider failures.
enum SubmissionError {
    NotUtf8,
    BadExtension,
}

async fn collect_submission(
    mut payload: Multipart,
) -> Result<Result<Submission, SubmissionError>, Error> {
    let mut submission = Submission::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let name = field
            .content_disposition()
            .as_ref()
            .and_then(|cd| cd.get_name())
            .unwrap_or_default()
            .to_string();
        let filename = field
            .content_disposition()
            .as_ref()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.extend_from_slice(&chunk?);
        }

        match name.as_str() {
            "file" => {
                if data.is_empty() {
                    continue;
                }
                if let Some(filename) = &filename {
                    let ext = std::path::Path::new(filename)
                        .extension()
                        .and_then(|s| s.to_str())
                        .unwrap_or("");
                    if !ext.eq_ignore_ascii_case("txt") {
                        return Ok(Err(SubmissionError::BadExtension));
                    }
                }
                match String::from_utf8(data) {
                    Ok(content) => submission.file_text = Some(content),
                    Err(_) => return Ok(Err(SubmissionError::NotUtf8)),
                }
            }
            "text" => {
                submission.text = String::from_utf8_lossy(&data).into_owned();
            }
            "policy" => {
                submission.policy_kind = String::from_utf8_lossy(&data).trim().to_string();
            }
            "limit" => {
                submission.limit = String::from_utf8_lossy(&data).trim().parse().ok();
            }
            "with_summary" => {
                let value = String::from_utf8_lossy(&data).trim().to_lowercase();
                submission.with_summary = matches!(value.as_str(), "on" | "true" | "1");
            }
            _ => {}
        }
    }

    Ok(Ok(submission))
}

/// POST /process — multipart form: pasted text or an uploaded UTF-8 .txt
/// file, a split policy plus threshold, and the context-summary flag.
/// Responds with the fully assembled output; there is no partial result.
pub async fn process_submission(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let request_id = generate_request_id();

    let submission = match collect_submission(payload).await? {
        Ok(submission) => submission,
        Err(SubmissionError::NotUtf8) => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "status": "error",
                "message": "Не удалось прочитать файл как UTF-8. Вставьте текст в поле ввода.",
                "request_id": request_id
            })));
        }
        Err(SubmissionError::BadExtension) => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "status": "error",
                "message": "Поддерживаются только файлы .txt.",
                "request_id": request_id
            })));
        }
    };

    // An uploaded file wins over the paste box.
    let input = submission
        .file_text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&submission.text);

    if input.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "status": "error",
            "message": "Пожалуйста, введите текст для обработки.",
            "request_id": request_id
        })));
    }

    let kind = if submission.policy_kind.is_empty() {
        "whole"
    } else {
        submission.policy_kind.as_str()
    };
    let Some(policy) = SplitPolicy::from_parts(kind, submission.limit) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "status": "error",
            "message": format!("Неизвестная стратегия разбиения: {}", kind),
            "request_id": request_id
        })));
    };

    info!(
        request_id = %request_id,
        policy = ?policy,
        input_chars = input.chars().count(),
        with_summary = submission.with_summary,
        "Processing submission"
    );

    let options = ProcessOptions {
        with_summary: submission.with_summary,
    };
    match processor::process_document(state.provider.as_ref(), input, &policy, options).await {
        Ok(report) => Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "chunks": report.chunks,
            "output": report.output,
            "request_id": request_id
        }))),
        Err(e) => {
            error!(request_id = %request_id, "Processing failed: {}", e);
            Ok(HttpResponse::BadGateway().json(json!({
                "status": "error",
                "message": format!("Ошибка при обработке текста: {}", e),
                "request_id": request_id
            })))
        }
    }
}

pub fn start_api_server(
    config: &ApiConfig,
    provider: Arc<dyn LlmProvider>,
) -> impl std::future::Future<Output = std::io::Result<()>> {
    let bind_addr = config.bind_addr();
    let state = web::Data::new(AppState { provider });

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .route("/", web::get().to(index_page))
            .route("/health", web::get().to(health_check))
            .route("/process", web::post().to(process_submission))
    })
    .bind(bind_addr.clone())
    .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", bind_addr, e))
    .run()
}
