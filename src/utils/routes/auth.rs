use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use actix_web::cookie::Cookie;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::companies::Company;
use crate::db::Database;
use crate::enc;
use crate::activity;
use crate::sessions::{self, LoginOutcome, SelectOutcome, Session};
use crate::structures::AppState;
use crate::superadmins::Superadmin;
use crate::users::User;

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct SelectCompanyRequest {
    selection_token: String,
    company_id: String,
    role: String,
    user_table: String,
    user_id: String,
}

#[derive(Deserialize)]
pub struct GoogleCallbackRequest {
    session_id: String,
}

#[derive(Deserialize)]
struct GoogleProfile {
    email: String,
    #[serde(default)]
    verified: bool,
}

#[derive(Deserialize)]
pub struct TwofaValidateRequest {
    pending_token: String,
    code: String,
}

#[derive(Deserialize)]
pub struct TwofaEnableRequest {
    code: String,
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

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(sessions::SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .finish()
}

// Both login flavors and the chooser path answer through the same shapes:
// a minted session plus redirect, or the grouped chooser payload.
fn login_outcome_response(db: &Database, email: &str, outcome: LoginOutcome) -> HttpResponse {
    match outcome {
        LoginOutcome::Invalid => {
            tracing::info!("login attempt failed for {}", email);
            HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Invalid email or password"
            }))
        }
        LoginOutcome::Single { session, redirect } => {
            tracing::info!("login for {} resolved to a single grant", email);
            activity::record(db, session.company_id.as_deref(), email, "login", "session", "signed in");
            HttpResponse::Ok().cookie(session_cookie(&session.token)).json(json!({
                "success": true,
                "session": {
                    "token": session.token,
                    "role": session.role,
                    "company_id": session.company_id
                },
                "redirect": redirect
            }))
        }
        LoginOutcome::Multiple { selection_token, companies } => {
            tracing::info!("login for {} spans {} companies, presenting chooser", email, companies.len());
            HttpResponse::Ok().json(json!({
                "success": true,
                "requires_selection": true,
                "selection_token": selection_token,
                "companies": companies
            }))
        }
    }
}

// Tenant users: one credential may open several (company, role) doors.
#[post("/api/v1/auth/unified-login")]
pub async fn unified_login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let grants = match sessions::collect_grants(&db, &body.email, |hash| {
        enc::verify_password(&body.password, hash, &state.hash_secret).unwrap_or(false)
    }) {
        Ok(grants) => grants,
        Err(e) => {
            tracing::error!("grant lookup failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }));
        }
    };

    match sessions::login_with_grants(&db, &body.email, grants) {
        Ok(outcome) => login_outcome_response(&db, &body.email, outcome),
        Err(e) => {
            tracing::error!("session resolution failed: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }))
        }
    }
}

#[post("/api/v1/auth/select-company")]
pub async fn select_company(state: web::Data<AppState>, body: web::Json<SelectCompanyRequest>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let outcome = sessions::select_grant(
        &db,
        &body.selection_token,
        &body.company_id,
        &body.role,
        &body.user_table,
        &body.user_id,
    );

    match outcome {
        Ok(SelectOutcome::Selected { session, redirect }) => {
            activity::record(&db, session.company_id.as_deref(), &session.user_id, "login", "session", "selected a company");
            HttpResponse::Ok().cookie(session_cookie(&session.token)).json(json!({
                "success": true,
                "session": {
                    "token": session.token,
                    "role": session.role,
                    "company_id": session.company_id
                },
                "redirect": redirect
            }))
        }
        Ok(SelectOutcome::Mismatch) => HttpResponse::Forbidden().json(json!({
            "success": false,
            "error": "Selection does not match an offered grant"
        })),
        Ok(SelectOutcome::UnknownOrExpired) => HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Selection expired, please log in again"
        })),
        Err(e) => {
            tracing::error!("company selection failed: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to complete selection"
            }))
        }
    }
}

// The OAuth provider hands the client a one-time session identifier, the
// server swaps it for a verified email and joins the normal grant flow.
#[post("/api/v1/auth/google/callback")]
pub async fn google_callback(state: web::Data<AppState>, body: web::Json<GoogleCallbackRequest>) -> impl Responder {
    let client = reqwest::Client::new();
    let profile = client
        .get(&state.google_userinfo_url)
        .query(&[("session_id", body.session_id.as_str())])
        .send()
        .await;

    let profile: GoogleProfile = match profile {
        Ok(response) => match response.json().await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("google identity exchange returned a bad payload: {}", e);
                return HttpResponse::Unauthorized().json(json!({
                    "success": false,
                    "error": "Google sign-in failed"
                }));
            }
        },
        Err(e) => {
            tracing::warn!("google identity exchange failed: {}", e);
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Google sign-in failed"
            }));
        }
    };

    if !profile.verified {
        return HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Google sign-in failed"
        }));
    }

    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    // Identity already proven by the provider, every account row matching
    // the email becomes a grant
    let grants = match sessions::collect_grants(&db, &profile.email, |_| true) {
        Ok(grants) => grants,
        Err(e) => {
            tracing::error!("grant lookup failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }));
        }
    };

    match sessions::login_with_grants(&db, &profile.email, grants) {
        Ok(outcome) => login_outcome_response(&db, &profile.email, outcome),
        Err(e) => {
            tracing::error!("session resolution failed: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }))
        }
    }
}

// Super-admin console path: bearer token, optional TOTP challenge.
#[post("/api/v1/auth/login")]
pub async fn console_login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let admin = match Superadmin::get_by_email(&db, &body.email) {
        Ok(Some(admin)) => admin,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Invalid email or password"
            }))
        }
        Err(e) => {
            tracing::error!("superadmin lookup failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }));
        }
    };

    match enc::verify_password(&body.password, &admin.password, &state.hash_secret) {
        Ok(true) => {}
        _ => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Invalid email or password"
            }))
        }
    }

    if admin.totp_enabled {
        return match sessions::create_twofa_pending(&db, &admin.id) {
            Ok(pending_token) => HttpResponse::Ok().json(json!({
                "success": true,
                "requires_2fa": true,
                "pending_token": pending_token
            })),
            Err(e) => {
                tracing::error!("failed to stage 2fa challenge: {}", e);
                HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "error": "Failed to resolve login"
                }))
            }
        };
    }

    match enc::issue_console_token(&admin.id, &state.jwt_secret) {
        Ok(token) => {
            activity::record(&db, None, &admin.email, "login", "session", "console sign-in");
            HttpResponse::Ok().json(json!({
                "success": true,
                "token": token,
                "redirect": "/superadmin/dashboard"
            }))
        }
        Err(e) => {
            tracing::error!("failed to issue console token: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }))
        }
    }
}

#[post("/api/v1/auth/2fa/validate")]
pub async fn twofa_validate(state: web::Data<AppState>, body: web::Json<TwofaValidateRequest>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let admin_id = match sessions::take_twofa_pending(&db, &body.pending_token) {
        Ok(Some(admin_id)) => admin_id,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Challenge expired, please log in again"
            }))
        }
        Err(e) => {
            tracing::error!("2fa challenge lookup failed: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }));
        }
    };

    let admin = match Superadmin::get(&db, &admin_id) {
        Ok(Some(admin)) => admin,
        _ => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Challenge expired, please log in again"
            }))
        }
    };

    let secret = admin.totp_secret.unwrap_or_default();
    if !enc::verify_totp(&secret, &body.code, Utc::now().timestamp()) {
        return HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Invalid verification code"
        }));
    }

    match enc::issue_console_token(&admin.id, &state.jwt_secret) {
        Ok(token) => {
            activity::record(&db, None, &admin.email, "login", "session", "console sign-in with 2FA");
            HttpResponse::Ok().json(json!({
                "success": true,
                "token": token,
                "redirect": "/superadmin/dashboard"
            }))
        }
        Err(e) => {
            tracing::error!("failed to issue console token: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to resolve login"
            }))
        }
    }
}

#[post("/api/v1/auth/2fa/setup")]
pub async fn twofa_setup(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let ctx = match sessions::resolve_request(&db, &state, &req) {
        Some(ctx) if ctx.role == "superadmin" => ctx,
        _ => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Authentication required"
            }))
        }
    };

    let secret = enc::generate_totp_secret();
    match Superadmin::store_totp_secret(&db, &ctx.user_id, &secret) {
        Ok(true) => HttpResponse::Ok().json(json!({
            "success": true,
            "secret": secret
        })),
        Ok(false) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Account not found"
        })),
        Err(e) => {
            tracing::error!("failed to store totp secret: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to start enrollment"
            }))
        }
    }
}

#[post("/api/v1/auth/2fa/enable")]
pub async fn twofa_enable(state: web::Data<AppState>, req: HttpRequest, body: web::Json<TwofaEnableRequest>) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let ctx = match sessions::resolve_request(&db, &state, &req) {
        Some(ctx) if ctx.role == "superadmin" => ctx,
        _ => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Authentication required"
            }))
        }
    };

    let admin = match Superadmin::get(&db, &ctx.user_id) {
        Ok(Some(admin)) => admin,
        _ => {
            return HttpResponse::NotFound().json(json!({
                "success": false,
                "error": "Account not found"
            }))
        }
    };

    let secret = match admin.totp_secret {
        Some(secret) => secret,
        None => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "Run setup before enabling 2FA"
            }))
        }
    };

    if !enc::verify_totp(&secret, &body.code, Utc::now().timestamp()) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Invalid verification code"
        }));
    }

    match Superadmin::enable_totp(&db, &admin.id) {
        Ok(_) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Two-factor authentication enabled"
        })),
        Err(e) => {
            tracing::error!("failed to enable totp: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to enable 2FA"
            }))
        }
    }
}

#[get("/api/v1/auth/me")]
pub async fn me(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
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

    if ctx.user_table == "superadmins" {
        return match Superadmin::get(&db, &ctx.user_id) {
            Ok(Some(admin)) => HttpResponse::Ok().json(json!({
                "success": true,
                "role": "superadmin",
                "user": { "id": admin.id, "email": admin.email, "name": admin.name }
            })),
            _ => HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Authentication required"
            })),
        };
    }

    let user = match User::get(&db, &ctx.user_id) {
        Ok(Some(user)) => user,
        _ => {
            return HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Authentication required"
            }))
        }
    };

    let company = match ctx.company_id.as_deref() {
        Some(company_id) => Company::get(&db, company_id).ok().flatten(),
        None => None,
    };

    HttpResponse::Ok().json(json!({
        "success": true,
        "role": ctx.role,
        "user": { "id": user.id, "email": user.email, "name": user.name },
        "company": company.map(|c| json!({
            "id": c.id,
            "name": c.name,
            "slug": c.slug,
            "logo": c.logo
        }))
    }))
}

#[post("/api/v1/auth/logout")]
pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let db = match open_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    if let Some(header) = req.headers().get("Authorization") {
        let token = header.to_str().unwrap_or("").trim_start_matches("Bearer ").trim();
        if !token.is_empty() {
            let _ = Session::delete(&db, token);
        }
    }
    if let Some(cookie) = req.cookie(sessions::SESSION_COOKIE) {
        let _ = Session::delete(&db, cookie.value());
    }

    let mut removal = Cookie::new(sessions::SESSION_COOKIE, "");
    removal.set_path("/");
    removal.make_removal();

    HttpResponse::Ok().cookie(removal).json(json!({
        "success": true,
        "message": "Signed out"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use crate::companies::seed_company;
    use crate::structures::test_state;
    use crate::users::User;
    use uuid::Uuid;

    // Handlers open their own connection per request, so the end-to-end
    // tests run against a throwaway database file.
    fn temp_state() -> AppState {
        let mut state = test_state();
        state.db_path = std::env::temp_dir().join(format!("makarid-test-{}.db", Uuid::new_v4()));
        state
    }

    fn seed_user(state: &AppState, db: &Database, company_id: &str, email: &str, role: &str) -> User {
        let hash = enc::hash_password("hunter2", &state.hash_secret).unwrap();
        User::insert(db, company_id, email, &hash, "Jo", role).unwrap()
    }

    #[actix_web::test]
    async fn single_grant_login_redirects_to_admin_dashboard() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        seed_user(&state, &db, &acme.id, "solo@example.com", "admin");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(unified_login),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/unified-login")
            .set_json(json!({"email": "solo@example.com", "password": "hunter2"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["redirect"], "/admin/dashboard");
        assert!(body.get("requires_selection").is_none());
        assert!(body["session"]["token"].as_str().is_some());
    }

    #[actix_web::test]
    async fn two_company_login_presents_chooser_then_mints_selected_pair() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let beta = seed_company(&db, "Beta", "beta", None);
        seed_user(&state, &db, &acme.id, "jo@example.com", "admin");
        let beta_employee = seed_user(&state, &db, &beta.id, "jo@example.com", "employee");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(unified_login)
                .service(select_company),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/unified-login")
            .set_json(json!({"email": "jo@example.com", "password": "hunter2"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["requires_selection"], true);
        let companies = body["companies"].as_array().unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0]["roles"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/select-company")
            .set_json(json!({
                "selection_token": body["selection_token"],
                "company_id": beta.id,
                "role": "employee",
                "user_table": "users",
                "user_id": beta_employee.id
            }))
            .to_request();
        let selected: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(selected["success"], true);
        assert_eq!(selected["redirect"], "/employee/dashboard");
        assert_eq!(selected["session"]["company_id"], json!(beta.id));
    }

    #[actix_web::test]
    async fn mismatched_selection_is_forbidden() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let beta = seed_company(&db, "Beta", "beta", None);
        let acme_admin = seed_user(&state, &db, &acme.id, "jo@example.com", "admin");
        seed_user(&state, &db, &beta.id, "jo@example.com", "employee");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(unified_login)
                .service(select_company),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/unified-login")
            .set_json(json!({"email": "jo@example.com", "password": "hunter2"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        // CompanyB paired with CompanyA's user row must not mint anything
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/select-company")
            .set_json(json!({
                "selection_token": body["selection_token"],
                "company_id": beta.id,
                "role": "admin",
                "user_table": "users",
                "user_id": acme_admin.id
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn bad_credentials_get_the_generic_envelope() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        seed_user(&state, &db, &acme.id, "jo@example.com", "admin");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(unified_login),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/unified-login")
            .set_json(json!({"email": "jo@example.com", "password": "wrong"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid email or password");
    }

    #[actix_web::test]
    async fn console_login_with_totp_challenges_then_issues_token() {
        let state = temp_state();
        let db = Database::open(&state.db_path).unwrap();
        db.init().unwrap();
        let hash = enc::hash_password("hunter2", &state.hash_secret).unwrap();
        let admin = Superadmin::insert(&db, "root@makar.id", &hash, "Root").unwrap();
        let secret = enc::generate_totp_secret();
        Superadmin::store_totp_secret(&db, &admin.id, &secret).unwrap();
        Superadmin::enable_totp(&db, &admin.id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(console_login)
                .service(twofa_validate),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({"email": "root@makar.id", "password": "hunter2"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["requires_2fa"], true);
        assert!(body.get("token").is_none());

        let code = enc::totp_code(&secret, Utc::now().timestamp()).unwrap();
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/2fa/validate")
            .set_json(json!({"pending_token": body["pending_token"], "code": code}))
            .to_request();
        let validated: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(validated["success"], true);
        assert!(validated["token"].as_str().is_some());
    }
}
