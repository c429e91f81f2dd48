use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::activity;
use crate::applications::Application;
use crate::db::Database;
use crate::jobs::Job;
use crate::sessions::{self, ScopeError};
use crate::structures::AppState;
use crate::users::User;

#[derive(Deserialize)]
pub struct LogListQuery {
    company_id: Option<String>,
    action: Option<String>,
    resource_type: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
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

// The activity feed is read-only. Tenant admins see their own company,
// the console sees everything and may narrow by company.
#[get("/api/v1/logs")]
pub async fn list_logs(state: web::Data<AppState>, req: HttpRequest, query: web::Query<LogListQuery>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let ctx = match sessions::resolve_request(&db, &state, &req) {
        Some(ctx) => ctx,
        None => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Authentication required"
            }))
        }
    };

    let company_id = match ctx.role.as_str() {
        "admin" => ctx.company_id.clone(),
        "superadmin" => query.company_id.clone(),
        _ => {
            return HttpResponse::Forbidden().json(json!({
                "success": false,
                "error": "Not allowed for this role"
            }))
        }
    };

    let log_query = activity::LogQuery {
        company_id,
        action: query.action.clone().filter(|a| !a.is_empty()),
        resource_type: query.resource_type.clone().filter(|r| !r.is_empty()),
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };

    match activity::list(&db, &log_query) {
        Ok(logs) => HttpResponse::Ok().json(json!({
            "success": true,
            "logs": logs
        })),
        Err(e) => {
            tracing::error!("failed to list activity logs: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch activity logs"
            }))
        }
    }
}

fn status_counts(counts: Vec<(String, i64)>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (status, count) in counts {
        map.insert(status, json!(count));
    }
    serde_json::Value::Object(map)
}

// One payload with every number the dashboard renders.
#[get("/api/v1/stats")]
pub async fn dashboard_stats(state: web::Data<AppState>, req: HttpRequest, query: web::Query<ScopeQuery>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (_, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => {
            return match err {
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
    };

    let jobs = Job::count_by_status(&db, &company_id);
    let applications = Application::count_by_status(&db, &company_id);
    let users = User::list_for_company(&db, &company_id).map(|u| u.len());
    let activity_entries = activity::count_for_company(&db, &company_id);

    match (jobs, applications, users, activity_entries) {
        (Ok(jobs), Ok(applications), Ok(users), Ok(activity_entries)) => HttpResponse::Ok().json(json!({
            "success": true,
            "stats": {
                "jobs": status_counts(jobs),
                "applications": status_counts(applications),
                "users": users,
                "activity_entries": activity_entries
            }
        })),
        _ => {
            tracing::error!("failed to assemble dashboard stats for {}", company_id);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch statistics"
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
    use crate::enums::JobStatus;
    use crate::jobs::seed_job;
    use crate::sessions::Session;
    use crate::structures::{test_state, AccessGrant};
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
    async fn stats_cover_jobs_applications_and_users() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let session = admin_session(&db, &acme.id);
        let job = seed_job(&db, &acme.id, "Role");
        Job::set_status(&db, &acme.id, &job.id, JobStatus::Published).unwrap();
        seed_application(&db, &job.id, &acme.id, "a@example.com");
        seed_application(&db, &job.id, &acme.id, "b@example.com");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(dashboard_stats),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/stats")
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["stats"]["jobs"]["published"], 1);
        assert_eq!(body["stats"]["applications"]["pending"], 2);
        assert_eq!(body["stats"]["users"], 1);
    }

    #[actix_web::test]
    async fn tenant_admins_cannot_read_other_feeds() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let beta = seed_company(&db, "Beta", "beta", None);
        let session = admin_session(&db, &acme.id);
        activity::record(&db, Some(&acme.id), "jo", "create", "job", "acme entry");
        activity::record(&db, Some(&beta.id), "sam", "create", "job", "beta entry");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(list_logs),
        )
        .await;

        // company_id in the query is ignored for tenant admins
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/logs?company_id={}", beta.id))
            .insert_header(("Authorization", format!("Bearer {}", session.token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let logs = body["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["description"], "acme entry");
    }
}
