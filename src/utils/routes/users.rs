use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::Deserialize;
use serde_json::json;

use crate::activity;
use crate::db::Database;
use crate::enc;
use crate::sessions::{self, ScopeError};
use crate::structures::AppState;
use crate::superadmins::Superadmin;
use crate::users::{NewUser, User};

#[derive(Deserialize)]
pub struct ScopeQuery {
    company_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    name: String,
    role: String,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    active: bool,
}

#[derive(Deserialize)]
pub struct NewSuperadminRequest {
    email: String,
    password: String,
    name: String,
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

fn valid_tenant_role(role: &str) -> bool {
    matches!(role, "admin" | "employee")
}

#[get("/api/v1/users")]
pub async fn list_users(state: web::Data<AppState>, req: HttpRequest, query: web::Query<ScopeQuery>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (_, company_id) = match sessions::admin_scope(&db, &state, &req, query.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    match User::list_for_company(&db, &company_id) {
        Ok(users) => HttpResponse::Ok().json(json!({
            "success": true,
            "users": users
        })),
        Err(e) => {
            tracing::error!("failed to list users: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch users"
            }))
        }
    }
}

#[post("/api/v1/users")]
pub async fn create_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NewUser>,
) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let (ctx, company_id) = match sessions::admin_scope(&db, &state, &req, body.company_id.as_deref()) {
        Ok(scope) => scope,
        Err(err) => return scope_error_response(err),
    };

    if !valid_tenant_role(&body.role) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": format!("Unknown role: {}", body.role)
        }));
    }
    if body.email.trim().is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Email and password are required"
        }));
    }

    let hash = match enc::hash_password(&body.password, &state.hash_secret) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("password hashing failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to create user"
            }));
        }
    };

    match User::insert(&db, &company_id, &body.email, &hash, &body.name, &body.role) {
        Ok(user) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "create", "user", &format!("added {} as {}", user.email, user.role));
            HttpResponse::Ok().json(json!({
                "success": true,
                "user": user
            }))
        }
        Err(e) => {
            tracing::warn!("failed to create user: {}", e);
            HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "Failed to create user, the email may already exist for this company"
            }))
        }
    }
}

#[put("/api/v1/users/{id}")]
pub async fn update_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
    body: web::Json<UpdateUserRequest>,
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

    if !valid_tenant_role(&body.role) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": format!("Unknown role: {}", body.role)
        }));
    }

    match User::update(&db, &company_id, &id, &body.name, &body.role) {
        Ok(true) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "update", "user", "updated a user");
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "User updated successfully"
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "User not found"
        })),
        Err(e) => {
            tracing::error!("failed to update user: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update user"
            }))
        }
    }
}

#[put("/api/v1/users/{id}/active")]
pub async fn set_user_active(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ScopeQuery>,
    body: web::Json<SetActiveRequest>,
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

    match User::set_active(&db, &company_id, &id, body.active) {
        Ok(true) => {
            let verb = if body.active { "activated" } else { "deactivated" };
            activity::record(&db, Some(&company_id), &ctx.user_id, "update", "user", &format!("{} a user", verb));
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": format!("User {}", verb)
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "User not found"
        })),
        Err(e) => {
            tracing::error!("failed to toggle user: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to update user"
            }))
        }
    }
}

#[delete("/api/v1/users/{id}")]
pub async fn delete_user(
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

    match User::delete(&db, &company_id, &id) {
        Ok(true) => {
            activity::record(&db, Some(&company_id), &ctx.user_id, "delete", "user", "removed a user");
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "User deleted successfully"
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "User not found"
        })),
        Err(e) => {
            tracing::error!("failed to delete user: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to delete user"
            }))
        }
    }
}

fn require_console(db: &Database, state: &AppState, auth: &BearerAuth) -> Result<Superadmin, HttpResponse> {
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

#[get("/api/v1/superadmins")]
pub async fn list_superadmins(state: web::Data<AppState>, auth: BearerAuth) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_console(&db, &state, &auth) {
        return resp;
    }

    match Superadmin::list(&db) {
        Ok(superadmins) => HttpResponse::Ok().json(json!({
            "success": true,
            "superadmins": superadmins
        })),
        Err(e) => {
            tracing::error!("failed to list superadmins: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to fetch superadmins"
            }))
        }
    }
}

#[post("/api/v1/superadmins")]
pub async fn create_superadmin(state: web::Data<AppState>, auth: BearerAuth, body: web::Json<NewSuperadminRequest>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let actor = match require_console(&db, &state, &auth) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };

    if body.email.trim().is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Email and password are required"
        }));
    }

    let hash = match enc::hash_password(&body.password, &state.hash_secret) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("password hashing failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to create superadmin"
            }));
        }
    };

    match Superadmin::insert(&db, &body.email, &hash, &body.name) {
        Ok(admin) => {
            activity::record(&db, None, &actor.email, "create", "superadmin", &format!("added operator {}", admin.email));
            HttpResponse::Ok().json(json!({
                "success": true,
                "superadmin": admin
            }))
        }
        Err(e) => {
            tracing::warn!("failed to create superadmin: {}", e);
            HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "Failed to create superadmin, the email may already exist"
            }))
        }
    }
}

#[delete("/api/v1/superadmins/{id}")]
pub async fn delete_superadmin(state: web::Data<AppState>, auth: BearerAuth, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };
    let actor = match require_console(&db, &state, &auth) {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };

    // Operators cannot remove their own account
    if actor.id == id {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "You cannot delete your own account"
        }));
    }

    match Superadmin::delete(&db, &id) {
        Ok(true) => {
            activity::record(&db, None, &actor.email, "delete", "superadmin", "removed an operator");
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Superadmin deleted successfully"
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Superadmin not found"
        })),
        Err(e) => {
            tracing::error!("failed to delete superadmin: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to delete superadmin"
            }))
        }
    }
}
