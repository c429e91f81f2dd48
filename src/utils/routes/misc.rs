use actix_web::{get, post, web, Error, HttpResponse};
use actix_multipart::Multipart;
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::structures::AppState;

// Resumes and branding images. Anything outside the allow-list is refused.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "png", "jpg", "jpeg", "gif", "webp"];

fn allowed_extension(filename: &str) -> Option<String> {
    let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Some(extension)
    } else {
        None
    }
}

#[post("/api/v1/upload")]
pub async fn upload(state: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, Error> {
    if let Err(e) = fs::create_dir_all(&state.upload_dir) {
        tracing::error!("failed to create upload directory: {}", e);
        return Ok(HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": "Failed to create uploads directory"
        })));
    }

    let mut stored_filename = String::new();

    while let Some(field) = payload.next().await {
        let mut field = field?;
        let content_disposition = field.content_disposition();
        let original_filename = content_disposition
            .get_filename()
            .unwrap_or("unknown_file")
            .to_string();

        let extension = match allowed_extension(&original_filename) {
            Some(extension) => extension,
            None => {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": "File type not allowed"
                })))
            }
        };

        stored_filename = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        let filepath = state.upload_dir.join(&stored_filename);
        tracing::info!("storing upload {} as {}", original_filename, stored_filename);

        let mut file = match fs::File::create(&filepath) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!("failed to create upload file: {}", e);
                return Ok(HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "error": "Failed to store file"
                })));
            }
        };

        while let Some(chunk) = field.next().await {
            let data = match chunk {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!("failed to read upload chunk: {}", e);
                    return Ok(HttpResponse::InternalServerError().json(json!({
                        "success": false,
                        "error": "Failed to read upload"
                    })));
                }
            };
            if let Err(e) = file.write_all(&data) {
                tracing::error!("failed to write upload chunk: {}", e);
                return Ok(HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "error": "Failed to store file"
                })));
            }
        }
    }

    if stored_filename.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "No file in request"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "file_url": format!("/uploads/{}", stored_filename)
    })))
}

#[get("/uploads/{filename}")]
pub async fn serve_file(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let filename = path.into_inner();
    // Stored names are uuid.ext, anything else never resolves
    if filename.contains('/') || filename.contains("..") {
        return HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "File not found"
        }));
    }

    let filepath = state.upload_dir.join(&filename);
    match fs::read(&filepath) {
        Ok(file_content) => {
            let content_type = match Path::new(&filename).extension().and_then(|e| e.to_str()) {
                Some("jpg") | Some("jpeg") => "image/jpeg",
                Some("png") => "image/png",
                Some("gif") => "image/gif",
                Some("webp") => "image/webp",
                Some("pdf") => "application/pdf",
                Some("doc") => "application/msword",
                Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                _ => "application/octet-stream",
            };

            HttpResponse::Ok().content_type(content_type).body(file_content)
        }
        Err(_) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "File not found"
        })),
    }
}

#[get("/health_check")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now().timestamp()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert_eq!(allowed_extension("resume.PDF").as_deref(), Some("pdf"));
        assert_eq!(allowed_extension("photo.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("script.sh"), None);
        assert_eq!(allowed_extension("no_extension"), None);
    }
}
