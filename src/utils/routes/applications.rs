use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::activity;
use crate::applications::{Application, ApplicationFilter};
use crate::db::Database;
use crate::enums::ApplicationStatus;
use crate::sessions::{self, ScopeError};
use crate::structures::AppState;

#[derive(Deserialize)]
pub struct ApplicationListQuery {
    company_id: Option<String>,
    job_id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    trash: bool,
}

#[derive(Deserialize)]
pub struct ScopeQuery {
    company_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    status: String,
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

#[get("/api/v1/applications")]
pub async fn list_applications(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ApplicationListQuery>,
) -> impl Responder {
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
        Some(raw) => match ApplicationStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": format!("Unknown status: {}", raw)
                }))
            }
        },
    };

    let filter = ApplicationFilter {
        job_id: query.job_id.clone(),
        status,
        trashed: query.trash,
    };

    match Application::list(&db, &company_id, &filter) {
        Ok(applications) => HttpResponse::Ok().json(json!({
            "success": true,
            "applications": applications
        })),
        Err(e) => {
            tracing::error!("failed to list applications: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch applications"
            }))
        }
    }
}

#[get("/api/v1/applications/{id}")]
pub async fn get_application(
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
    let (_, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    match Application::get_scoped(&db, &company_id, &id) {
        Ok(Some(application)) => HttpResponse::Ok().json(json!({
            "success": true,
            "application": application
        })),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Application not found"
        })),
        Err(e) => {
            tracing::error!("failed to fetch application: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch application"
            }))
        }
    }
}

#[put("/api/v1/applications/{id}/status")]
pub async fn update_application_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
    body: web::Json<UpdateStatusRequest>,
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

    let next = match ApplicationStatus::parse(&body.status) {
        Some(next) => next,
        None => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": format!("Unknown status: {}", body.status)
            }))
        }
    };

    let application = match Application::get_scoped(&db, &company_id, &id) {
        Ok(Some(application)) => application,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({
                "success": false,
                "error": "Application not found"
            }))
        }
        Err(e) => {
            tracing::error!("failed to fetch application: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch application"
            }));
        }
    };

    if application.trashed {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Restore the application before changing its status"
        }));
    }

    let current = match ApplicationStatus::parse(&application.status) {
        Some(current) => current,
        None => {
            tracing::error!("application {} carries unknown status {}", application.id, application.status);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update application"
            }));
        }
    };

    if !current.can_transition_to(next) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": format!("Cannot move a {} application to {}", current.as_str(), next.as_str())
        }));
    }

    match Application::set_status(&db, &company_id, &id, next) {
        Ok(_) => {
            activity::record(
                &db,
                Some(&company_id),
                &ctx.user_id,
                "update",
                "application",
                &format!("moved {} to {}", application.applicant_email, next.as_str()),
            );
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": format!("Application marked {}", next.as_str())
            }))
        }
        Err(e) => {
            tracing::error!("failed to update application status: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update application"
            }))
        }
    }
}

#[post("/api/v1/applications/{id}/trash")]
pub async fn trash_application(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    set_trashed(state, req, path.into_inner(), query.into_inner().company_id, true).await
}

#[post("/api/v1/applications/{id}/restore")]
pub async fn restore_application(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
) -> impl Responder {
    set_trashed(state, req, path.into_inner(), query.into_inner().company_id, false).await
}

async fn set_trashed(
    state: web::Data<AppState>,
    req: HttpRequest,
    id: String,
    requested_company: Option<String>,
    trashed: bool,
) -> HttpResponse {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (ctx, company_id) = match sessions::admin_scope(&db, &state, &req, requested_company.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    match Application::set_trashed(&db, &company_id, &id, trashed) {
        Ok(true) => {
            let verb = if trashed { "moved to trash" } else { "restored" };
            activity::record(&db, Some(&company_id), &ctx.user_id, "update", "application", &format!("{} an application", verb));
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": format!("Application {}", verb)
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Application not found"
        })),
        Err(e) => {
            tracing::error!("failed to update application: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update application"
            }))
        }
    }
}

#[delete("/api/v1/applications/{id}")]
pub async fn delete_application(
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

    match Application::delete_trashed(&db, &company_id, &id) {
        Ok(true) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "delete", "application", "permanently deleted an application");
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Application deleted permanently"
            }))
        }
        // Only trashed applications can be removed for good
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Application not found in trash"
        })),
        Err(e) => {
            tracing::error!("failed to delete application: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to delete application"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use crate::applications::seed_application;
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
    async fn backwards_status_moves_are_rejected() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let session = admin_session(&db, &acme.id);
        let job = seed_job(&db, &acme.id, "Role");
        let application = seed_application(&db, &job.id, &acme.id, "a@example.com");
        Application::set_status(&db, &acme.id, &application.id, ApplicationStatus::Interview).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(update_application_status),
        )
        .await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/applications/{}/status", application.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .set_json(json!({"status": "pending"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Cannot move a interview application to pending");
    }

    #[actix_web::test]
    async fn trash_restore_and_permanent_delete_flow() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let session = admin_session(&db, &acme.id);
        let job = seed_job(&db, &acme.id, "Role");
        let application = seed_application(&db, &job.id, &acme.id, "a@example.com");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(trash_application)
                .service(delete_application)
                .service(list_applications),
        )
        .await;

        // Permanent delete straight away is refused, the trash is the only way out
        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/applications/{}", application.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/applications/{}/trash", application.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::get()
            .uri("/api/v1/applications?trash=true")
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["applications"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/applications/{}", application.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }
}
