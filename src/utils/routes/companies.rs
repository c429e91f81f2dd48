use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::Deserialize;
use serde_json::json;

use crate::activity;
use crate::companies::{Company, NewCompany};
use crate::db::Database;
use crate::enc;
use crate::enums::PageType;
use crate::structures::AppState;
use crate::superadmins::Superadmin;

#[derive(Deserialize)]
pub struct SetActiveRequest {
    active: bool,
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

// Console routes are bearer-only: the token must be a live console JWT
// for an operator that still exists.
fn require_superadmin(db: &Database, state: &AppState, auth: &BearerAuth) -> Result<Superadmin, HttpResponse> {
    let unauthorized = || {
        HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Invalid authorization token"
        }))
    };

    let admin_id = match enc::verify_console_token(auth.token(), &state.jwt_secret) {
        Some(admin_id) => admin_id,
        None => return Err(unauthorized()),
    };
    match Superadmin::get(db, &admin_id) {
        Ok(Some(admin)) => Ok(admin),
        _ => Err(unauthorized()),
    }
}

fn validate_company_payload(body: &NewCompany) -> Option<HttpResponse> {
    if body.name.trim().is_empty() || body.slug.trim().is_empty() {
        return Some(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Company name and slug are required"
        })));
    }
    if let Some(page_type) = &body.page_type {
        if PageType::parse(page_type).is_none() {
            return Some(HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": format!("Unknown page type: {}", page_type)
            })));
        }
    }
    None
}

#[get("/api/v1/companies")]
pub async fn list_companies(state: web::Data<AppState>, auth: BearerAuth) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_superadmin(&db, &state, &auth) {
        return resp;
    }

    match Company::list(&db) {
        Ok(companies) => HttpResponse::Ok().json(json!({
            "success": true,
            "companies": companies
        })),
        Err(e) => {
            tracing::error!("failed to list companies: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch companies"
            }))
        }
    }
}

#[post("/api/v1/companies")]
pub async fn create_company(state: web::Data<AppState>, auth: BearerAuth, body: web::Json<NewCompany>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let admin = match require_superadmin(&db, &state, &auth) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };
    if let Some(resp) = validate_company_payload(&body) {
        return resp;
    }

    match Company::insert(&db, &body) {
        Ok(company) => {
            activity::record(&db, Some(&company.id), &admin.email, "create", "company", &format!("created company {}", company.name));
            HttpResponse::Ok().json(json!({
                "success": true,
                "company": company
            }))
        }
        Err(e) => {
            tracing::warn!("failed to create company: {}", e);
            HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "Failed to create company, the slug or domain may already be taken"
            }))
        }
    }
}

#[put("/api/v1/companies/{id}")]
pub async fn update_company(
    state: web::Data<AppState>,
    auth: BearerAuth,
    path: web::Path<String>,
    body: web::Json<NewCompany>,
) -> impl Responder {
    let id = path.into_inner();
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let admin = match require_superadmin(&db, &state, &auth) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };
    if let Some(resp) = validate_company_payload(&body) {
        return resp;
    }

    match Company::update(&db, &id, &body) {
        Ok(true) => {
            activity::record(&db, Some(&id), &admin.email, "update", "company", &format!("updated company {}", body.name));
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Company updated successfully"
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Company not found"
        })),
        Err(e) => {
            tracing::error!("failed to update company: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update company"
            }))
        }
    }
}

#[put("/api/v1/companies/{id}/active")]
pub async fn set_company_active(
    state: web::Data<AppState>,
    auth: BearerAuth,
    path: web::Path<String>,
    body: web::Json<SetActiveRequest>,
) -> impl Responder {
    let id = path.into_inner();
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let admin = match require_superadmin(&db, &state, &auth) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };

    match Company::set_active(&db, &id, body.active) {
        Ok(true) => {
            let verb = if body.active { "activated" } else { "deactivated" };
            activity::record(&db, Some(&id), &admin.email, "update", "company", &format!("{} company", verb));
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": format!("Company {}", verb)
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Company not found"
        })),
        Err(e) => {
            tracing::error!("failed to toggle company: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update company"
            }))
        }
    }
}

#[delete("/api/v1/companies/{id}")]
pub async fn delete_company(state: web::Data<AppState>, auth: BearerAuth, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let admin = match require_superadmin(&db, &state, &auth) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };

    match Company::delete(&db, &id) {
        Ok(true) => {
            activity::record(&db, Some(&id), &admin.email, "delete", "company", "deleted company and its data");
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Company deleted successfully"
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Company not found"
        })),
        Err(e) => {
            tracing::error!("failed to delete company: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to delete company"
            }))
        }
    }
}
