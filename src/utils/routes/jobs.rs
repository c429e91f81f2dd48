use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::activity;
use crate::db::Database;
use crate::enums::JobStatus;
use crate::jobs::{Job, NewJob};
use crate::sessions::{self, ScopeError};
use crate::structures::AppState;

#[derive(Deserialize)]
pub struct JobListQuery {
    company_id: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
pub struct ScopeQuery {
    company_id: Option<String>,
}

fn open_db(state: &AppState) -> Result<Database, HttpResponse> {
    Database::open(&state.db_path).map_err(|e| {
        tracing::error!("database connection failed: {}", e);
        HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": format!("Database error: {}", e)
        }))
    })
}

fn scope_error_response(err: ScopeError) -> HttpResponse {
    match err {
        ScopeError::Unauthenticated => HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Authentication required"
        })),
        ScopeError::Forbidden => HttpResponse::Forbidden().json(json!({
            "success": false,
            "error": "Not allowed for this role"
        })),
        ScopeError::MissingCompany => HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "company_id is required"
        })),
    }
}

#[get("/api/v1/jobs")]
pub async fn list_jobs(state: web::Data<AppState>, req: HttpRequest, query: web::Query<JobListQuery>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (_, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match JobStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": format!("Unknown status: {}", raw)
                }))
            }
        },
    };

    match Job::list_for_company(&db, &company_id, status) {
        Ok(jobs) => HttpResponse::Ok().json(json!({
            "success": true,
            "jobs": jobs
        })),
        Err(e) => {
            tracing::error!("failed to list jobs: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch jobs"
            }))
        }
    }
}

#[get("/api/v1/jobs/{id}")]
pub async fn get_job(state: web::Data<AppState>, req: HttpRequest, path: web::Path<String>, query: web::Query<ScopeQuery>) -> impl Responder {
    let id = path.into_inner();
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (_, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    match Job::get_scoped(&db, &company_id, &id) {
        Ok(Some(job)) => HttpResponse::Ok().json(json!({
            "success": true,
            "job": job
        })),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Job not found"
        })),
        Err(e) => {
            tracing::error!("failed to fetch job: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch job"
            }))
        }
    }
}

#[post("/api/v1/jobs")]
pub async fn create_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ScopeQuery>,
    body: web::Json<NewJob>,
) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (ctx, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    if body.title.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Job title is required"
        }));
    }

    match Job::insert(&db, &company_id, &body) {
        Ok(job) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "create", "job", &format!("created draft job {}", job.title));
            HttpResponse::Ok().json(json!({
                "success": true,
                "job": job
            }))
        }
        Err(e) => {
            tracing::error!("failed to create job: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to create job"
            }))
        }
    }
}

#[put("/api/v1/jobs/{id}")]
pub async fn update_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
    body: web::Json<NewJob>,
) -> impl Responder {
    let id = path.into_inner();
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (ctx, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    match Job::update(&db, &company_id, &id, &body) {
        Ok(true) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "update", "job", &format!("updated job {}", body.title));
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Job updated successfully"
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Job not found"
        })),
        Err(e) => {
            tracing::error!("failed to update job: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update job"
            }))
        }
    }
}

// Publishing and closing share the forward-only status rules.
async fn transition_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    id: String,
    requested_company: Option<String>,
    next: JobStatus,
) -> HttpResponse {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (ctx, company_id) = match sessions::admin_scope(&db, &state, &req, requested_company.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    let job = match Job::get_scoped(&db, &company_id, &id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({
                "success": false,
                "error": "Job not found"
            }))
        }
        Err(e) => {
            tracing::error!("failed to fetch job: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch job"
            }));
        }
    };

    let current = match JobStatus::parse(&job.status) {
        Some(current) => current,
        None => {
            tracing::error!("job {} carries unknown status {}", job.id, job.status);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update job"
            }));
        }
    };

    if !current.can_transition_to(next) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": format!("Cannot move a {} job to {}", current.as_str(), next.as_str())
        }));
    }

    match Job::set_status(&db, &company_id, &id, next) {
        Ok(_) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "update", "job", &format!("moved job {} to {}", job.title, next.as_str()));
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": format!("Job {}", next.as_str())
            }))
        }
        Err(e) => {
            tracing::error!("failed to update job status: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update job"
            }))
        }
    }
}

#[post("/api/v1/jobs/{id}/publish")]
pub async fn publish_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    transition_job(state, req, path.into_inner(), query.into_inner().company_id, JobStatus::Published).await
}

#[post("/api/v1/jobs/{id}/close")]
pub async fn close_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    transition_job(state, req, path.into_inner(), query.into_inner().company_id, JobStatus::Closed).await
}

#[delete("/api/v1/jobs/{id}")]
pub async fn delete_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    let id = path.into_inner();
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (ctx, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    match Job::delete(&db, &company_id, &id) {
        Ok(true) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "delete", "job", "deleted a job and its applications");
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Job deleted successfully"
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Job not found"
        })),
        Err(e) => {
            tracing::error!("failed to delete job: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to delete job"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use crate::companies::seed_company;
    use crate::jobs::seed_job;
    use crate::sessions::Session;
    use crate::structures::{test_state, AccessGrant};
    use crate::users::User;
    use uuid::Uuid;

    fn temp_state() -> AppState {
        let mut state = test_state();
        state.db_path = std::env::temp_dir().join(format!("makarid-test-{}.db", Uuid::new_v4()));
        state
    }

    fn admin_session(db: &Database, company_id: &str) -> Session {
        let admin = User::insert(db, company_id, "admin@acme.example", "hash", "Admin", "admin").unwrap();
        Session::mint(
            db,
            &AccessGrant {
                company_id: company_id.to_string(),
                company_name: "Acme".to_string(),
                company_logo: None,
                role: "admin".to_string(),
                user_table: "users".to_string(),
                user_id: admin.id,
            },
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn publish_then_close_walks_the_pipeline() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let session = admin_session(&db, &acme.id);
        let job = seed_job(&db, &acme.id, "Backend Engineer");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(publish_job)
                .service(close_job),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/jobs/{}/publish", job.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        // Closing a published job is allowed, re-publishing a closed one is not
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/jobs/{}/close", job.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/jobs/{}/publish", job.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn closing_a_draft_is_an_invalid_transition() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let session = admin_session(&db, &acme.id);
        let job = seed_job(&db, &acme.id, "Backend Engineer");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(close_job),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/jobs/{}/close", job.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Cannot move a draft job to closed");
    }
}
