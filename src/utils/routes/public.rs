use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::activity;
use crate::applications::{Application, NewApplication};
use crate::companies::Company;
use crate::db::Database;
use crate::enums::JobStatus;
use crate::jobs::Job;
use crate::structures::{self, AppState};

#[derive(Deserialize)]
pub struct ResolveQuery {
    host: String,
}

fn no_tenant() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "tenant": null
    }))
}

// Maps the incoming hostname to a tenant. Product domains short-circuit
// before any lookup, and every failure collapses to the same no-tenant
// payload: the page renders as if on the default domain, nothing retries.
#[get("/api/v1/public/resolve")]
pub async fn resolve_tenant(state: web::Data<AppState>, query: web::Query<ResolveQuery>) -> impl Responder {
    if structures::is_product_domain(&query.host, &state.product_domains) {
        return no_tenant();
    }

    let db = match Database::open(&state.db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!("tenant resolution skipped, database unavailable: {}", e);
            return no_tenant();
        }
    };

    match Company::resolve_host(&db, &query.host) {
        Ok(Some(company)) => HttpResponse::Ok().json(json!({
            "success": true,
            "tenant": {
                "slug": company.slug,
                "name": company.name,
                "logo": company.logo,
                "brand_color": company.brand_color,
                "page_type": company.page_type
            }
        })),
        Ok(None) => no_tenant(),
        Err(e) => {
            tracing::warn!("tenant resolution failed for {}: {}", query.host, e);
            no_tenant()
        }
    }
}

fn load_active_company(db: &Database, slug: &str) -> Result<Company, HttpResponse> {
    match Company::get_by_slug(db, slug) {
        Ok(Some(company)) if company.active => Ok(company),
        Ok(_) => Err(HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Company not found"
        }))),
        Err(e) => {
            tracing::error!("company lookup failed: {}", e);
            Err(HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch company"
            })))
        }
    }
}

#[get("/api/v1/public/companies/{slug}")]
pub async fn company_profile(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let slug = path.into_inner();
    let db = match Database::open(&state.db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("database connection failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let company = match load_active_company(&db, &slug) {
        Ok(company) => company,
        Err(resp) => return resp,
    };

    HttpResponse::Ok().json(json!({
        "success": true,
        "company": {
            "slug": company.slug,
            "name": company.name,
            "logo": company.logo,
            "description": company.description,
            "culture": company.culture,
            "benefits": company.benefits,
            "gallery": company.gallery,
            "brand_color": company.brand_color,
            "page_type": company.page_type
        }
    }))
}

#[get("/api/v1/public/companies/{slug}/jobs")]
pub async fn company_jobs(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let slug = path.into_inner();
    let db = match Database::open(&state.db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("database connection failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let company = match load_active_company(&db, &slug) {
        Ok(company) => company,
        Err(resp) => return resp,
    };

    match Job::list_published(&db, &company.id) {
        Ok(jobs) => HttpResponse::Ok().json(json!({
            "success": true,
            "jobs": jobs
        })),
        Err(e) => {
            tracing::error!("failed to list public jobs: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch jobs"
            }))
        }
    }
}

#[get("/api/v1/public/jobs/{id}")]
pub async fn public_job(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let db = match Database::open(&state.db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("database connection failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // Drafts and closed postings are invisible out here
    match Job::get_published(&db, &id) {
        Ok(Some(job)) => {
            let company = Company::get(&db, &job.company_id).ok().flatten();
            HttpResponse::Ok().json(json!({
                "success": true,
                "job": job,
                "company": company.map(|c| json!({
                    "slug": c.slug,
                    "name": c.name,
                    "logo": c.logo
                }))
            }))
        }
        Ok(None) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Job not found"
        })),
        Err(e) => {
            tracing::error!("failed to fetch public job: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch job"
            }))
        }
    }
}

#[post("/api/v1/public/jobs/{id}/apply")]
pub async fn apply(state: web::Data<AppState>, path: web::Path<String>, body: web::Json<NewApplication>) -> impl Responder {
    let id = path.into_inner();
    let db = match Database::open(&state.db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("database connection failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if body.applicant_name.trim().is_empty() || !body.applicant_email.contains('@') {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Name and a valid email are required"
        }));
    }

    let job = match Job::get(&db, &id) {
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

    match JobStatus::parse(&job.status) {
        Some(JobStatus::Published) => {}
        Some(JobStatus::Closed) => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "This job is no longer accepting applications"
            }))
        }
        // Drafts are not public, their existence is not acknowledged
        _ => {
            return HttpResponse::NotFound().json(json!({
                "success": false,
                "error": "Job not found"
            }))
        }
    }

    match Application::insert(&db, &job.id, &job.company_id, &body) {
        Ok(application) => {
            activity::record(
                &db,
                Some(&job.company_id),
                &application.applicant_email,
                "create",
                "application",
                &format!("applied to {}", job.title),
            );
            HttpResponse::Ok().json(json!({
                "success": true,
                "application_id": application.id,
                "message": "Application submitted successfully"
            }))
        }
        Err(e) => {
            tracing::error!("failed to store application: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to submit application"
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
    use crate::structures::test_state;
    use uuid::Uuid;

    fn temp_state() -> AppState {
        let mut state = test_state();
        state.db_path = std::env::temp_dir().join(format!("makarid-test-{}.db", Uuid::new_v4()));
        state
    }

    #[actix_web::test]
    async fn product_domains_resolve_without_touching_the_database() {
        // A database path that cannot be opened proves the short-circuit
        let mut state = test_state();
        state.db_path = std::env::temp_dir();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(resolve_tenant),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/public/resolve?host=app.makar.id")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert!(body["tenant"].is_null());

        // Unknown hosts on a broken database still collapse to no-tenant
        let req = test::TestRequest::get()
            .uri("/api/v1/public/resolve?host=careers.acme.example")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert!(body["tenant"].is_null());
    }

    #[actix_web::test]
    async fn custom_domains_resolve_to_their_tenant() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        seed_company(&db, "Acme", "acme", Some("careers.acme.example"));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(resolve_tenant),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/public/resolve?host=careers.acme.example")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["tenant"]["slug"], "acme");
        assert_eq!(body["tenant"]["page_type"], "careers");
    }

    #[actix_web::test]
    async fn applying_to_a_closed_job_is_rejected() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let job = seed_job(&db, &acme.id, "Role");
        Job::set_status(&db, &acme.id, &job.id, JobStatus::Published).unwrap();
        Job::set_status(&db, &acme.id, &job.id, JobStatus::Closed).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(apply),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/public/jobs/{}/apply", job.id))
            .set_json(json!({
                "applicant_name": "Sam",
                "applicant_email": "sam@example.com",
                "answers": {"motivation": "hi"}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "This job is no longer accepting applications");
    }

    #[actix_web::test]
    async fn draft_jobs_are_invisible_to_candidates() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let draft = seed_job(&db, &acme.id, "Hidden role");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(public_job)
                .service(apply),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/public/jobs/{}", draft.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/public/jobs/{}/apply", draft.id))
            .set_json(json!({"applicant_name": "Sam", "applicant_email": "sam@example.com"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn published_jobs_accept_applications() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let job = seed_job(&db, &acme.id, "Open role");
        Job::set_status(&db, &acme.id, &job.id, JobStatus::Published).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(apply),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/public/jobs/{}/apply", job.id))
            .set_json(json!({
                "applicant_name": "Sam",
                "applicant_email": "sam@example.com",
                "answers": {"portfolio": "https://sam.example"}
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);

        let stored = Application::list(&db, &acme.id, &Default::default()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, "pending");
        assert_eq!(stored[0].answers["portfolio"], "https://sam.example");
    }
}
