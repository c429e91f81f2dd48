use actix_web::HttpRequest;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::db::Database;
use crate::enc;
use crate::enums::Role;
use crate::structures::{group_grants, AccessGrant, AppState, CompanyGrants};
use crate::superadmins::Superadmin;

pub const SESSION_COOKIE: &str = "makarid_session";
const SESSION_TTL_DAYS: i64 = 7;
const SELECTION_TTL_MINUTES: i64 = 10;
const TWOFA_TTL_MINUTES: i64 = 5;

// A session binds a browser to exactly one (user, company, role) triple.
// company_id is null only on super-admin console sessions.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user_table: String,
    pub user_id: String,
    pub company_id: Option<String>,
    pub role: String,
    pub created_at: String,
    pub expires_at: String,
}

// The authenticated caller as seen by route handlers.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_table: String,
    pub user_id: String,
    pub company_id: Option<String>,
    pub role: String,
}

fn from_row(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        token: row.get(0)?,
        user_table: row.get(1)?,
        user_id: row.get(2)?,
        company_id: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
        expires_at: row.get(6)?,
    })
}

fn is_expired(expires_at: &str) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(at) => at <= Utc::now(),
        Err(_) => true,
    }
}

impl Session {
    pub fn mint(db: &Database, grant: &AccessGrant) -> rusqlite::Result<Session> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires = now + Duration::days(SESSION_TTL_DAYS);

        db.conn.execute(
            "INSERT INTO sessions (token, user_table, user_id, company_id, role, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token,
                grant.user_table,
                grant.user_id,
                grant.company_id,
                grant.role,
                now.to_rfc3339(),
                expires.to_rfc3339()
            ],
        )?;

        match Session::get(db, &token)? {
            Some(session) => Ok(session),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    // Expired rows are treated as absent and purged on the way out.
    pub fn get(db: &Database, token: &str) -> rusqlite::Result<Option<Session>> {
        let session = db
            .conn
            .query_row(
                "SELECT token, user_table, user_id, company_id, role, created_at, expires_at
                 FROM sessions WHERE token = ?1",
                params![token],
                from_row,
            )
            .optional()?;

        match session {
            Some(session) if is_expired(&session.expires_at) => {
                db.conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub fn delete(db: &Database, token: &str) -> rusqlite::Result<bool> {
        let changed = db.conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(changed > 0)
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            user_table: self.user_table.clone(),
            user_id: self.user_id.clone(),
            company_id: self.company_id.clone(),
            role: self.role.clone(),
        }
    }
}

// Every account row matching the credential becomes one access grant.
// The password check is a closure so the Google path can reuse this with
// "identity already verified" semantics.
pub fn collect_grants<F>(db: &Database, email: &str, verify: F) -> rusqlite::Result<Vec<AccessGrant>>
where
    F: Fn(&str) -> bool,
{
    let mut stmt = db.conn.prepare(
        "SELECT u.id, u.password, u.role, c.id, c.name, c.logo
         FROM users u
         JOIN companies c ON u.company_id = c.id
         WHERE u.email = ?1 AND u.active = 1 AND c.active = 1
         ORDER BY u.created_at",
    )?;

    let rows = stmt.query_map(params![email.to_lowercase()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut grants = Vec::new();
    for row in rows {
        let (user_id, password, role, company_id, company_name, company_logo) = row?;
        if verify(&password) {
            grants.push(AccessGrant {
                company_id,
                company_name,
                company_logo,
                role,
                user_table: "users".to_string(),
                user_id,
            });
        }
    }
    Ok(grants)
}

#[derive(Debug)]
pub enum LoginOutcome {
    // Bad credentials and unknown accounts are indistinguishable on the wire
    Invalid,
    // One grant: the session is minted right away, no chooser
    Single { session: Session, redirect: &'static str },
    // Several grants: the client gets the grouped chooser and a short-lived
    // selection token, no session exists yet
    Multiple { selection_token: String, companies: Vec<CompanyGrants> },
}

pub fn login_with_grants(db: &Database, email: &str, grants: Vec<AccessGrant>) -> rusqlite::Result<LoginOutcome> {
    match grants.len() {
        0 => Ok(LoginOutcome::Invalid),
        1 => {
            let grant = &grants[0];
            let session = Session::mint(db, grant)?;
            let redirect = Role::parse(&grant.role).map(|r| r.dashboard_path()).unwrap_or("/");
            Ok(LoginOutcome::Single { session, redirect })
        }
        _ => {
            let token = Uuid::new_v4().to_string();
            let now = Utc::now();
            let expires = now + Duration::minutes(SELECTION_TTL_MINUTES);
            let encoded = serde_json::to_string(&grants)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            db.conn.execute(
                "INSERT INTO login_selections (token, email, grants, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![token, email.to_lowercase(), encoded, now.to_rfc3339(), expires.to_rfc3339()],
            )?;

            Ok(LoginOutcome::Multiple {
                selection_token: token,
                companies: group_grants(&grants),
            })
        }
    }
}

#[derive(Debug)]
pub enum SelectOutcome {
    UnknownOrExpired,
    // The submitted tuple does not match any stored grant, nothing is minted
    Mismatch,
    Selected { session: Session, redirect: &'static str },
}

pub fn select_grant(
    db: &Database,
    selection_token: &str,
    company_id: &str,
    role: &str,
    user_table: &str,
    user_id: &str,
) -> rusqlite::Result<SelectOutcome> {
    let row = db
        .conn
        .query_row(
            "SELECT grants, expires_at FROM login_selections WHERE token = ?1",
            params![selection_token],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let (encoded, expires_at) = match row {
        Some(row) => row,
        None => return Ok(SelectOutcome::UnknownOrExpired),
    };

    if is_expired(&expires_at) {
        db.conn
            .execute("DELETE FROM login_selections WHERE token = ?1", params![selection_token])?;
        return Ok(SelectOutcome::UnknownOrExpired);
    }

    let grants: Vec<AccessGrant> = serde_json::from_str(&encoded).unwrap_or_default();
    let chosen = grants.iter().find(|g| {
        g.company_id == company_id && g.role == role && g.user_table == user_table && g.user_id == user_id
    });

    let grant = match chosen {
        Some(grant) => grant,
        None => return Ok(SelectOutcome::Mismatch),
    };

    let session = Session::mint(db, grant)?;
    // The grant list only has to survive the client-side redirect, it is
    // discarded the moment a session exists
    db.conn
        .execute("DELETE FROM login_selections WHERE token = ?1", params![selection_token])?;

    let redirect = Role::parse(&grant.role).map(|r| r.dashboard_path()).unwrap_or("/");
    Ok(SelectOutcome::Selected { session, redirect })
}

pub fn create_twofa_pending(db: &Database, superadmin_id: &str) -> rusqlite::Result<String> {
    let token = Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires = now + Duration::minutes(TWOFA_TTL_MINUTES);
    db.conn.execute(
        "INSERT INTO twofa_pending (token, superadmin_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, superadmin_id, now.to_rfc3339(), expires.to_rfc3339()],
    )?;
    Ok(token)
}

// Single use: the row is removed whether or not the code check that
// follows succeeds at the caller.
pub fn take_twofa_pending(db: &Database, token: &str) -> rusqlite::Result<Option<String>> {
    let row = db
        .conn
        .query_row(
            "SELECT superadmin_id, expires_at FROM twofa_pending WHERE token = ?1",
            params![token],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    db.conn.execute("DELETE FROM twofa_pending WHERE token = ?1", params![token])?;

    match row {
        Some((superadmin_id, expires_at)) if !is_expired(&expires_at) => Ok(Some(superadmin_id)),
        _ => Ok(None),
    }
}

// Resolves the caller from either storage mode: a bearer token (console
// JWT or a session token) or the tenant session cookie.
pub fn resolve_request(db: &Database, state: &AppState, req: &HttpRequest) -> Option<SessionContext> {
    if let Some(header) = req.headers().get("Authorization") {
        let token = header.to_str().unwrap_or("").trim_start_matches("Bearer ").trim();
        if !token.is_empty() {
            if let Some(superadmin_id) = enc::verify_console_token(token, &state.jwt_secret) {
                if let Ok(Some(admin)) = Superadmin::get(db, &superadmin_id) {
                    return Some(SessionContext {
                        user_table: "superadmins".to_string(),
                        user_id: admin.id,
                        company_id: None,
                        role: "superadmin".to_string(),
                    });
                }
            }
            if let Ok(Some(session)) = Session::get(db, token) {
                return Some(session.context());
            }
        }
    }

    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if let Ok(Some(session)) = Session::get(db, cookie.value()) {
            return Some(session.context());
        }
    }

    None
}

#[derive(Debug, PartialEq, Eq)]
pub enum ScopeError {
    Unauthenticated,
    // Wrong role for the surface, the client redirects instead of rendering
    Forbidden,
    // A super-admin reaching into a tenant surface must name the company
    MissingCompany,
}

// Company-scoped admin surfaces: a tenant admin acts on their own company,
// a super-admin may act on any company by naming it explicitly.
pub fn admin_scope(
    db: &Database,
    state: &AppState,
    req: &HttpRequest,
    requested_company: Option<&str>,
) -> Result<(SessionContext, String), ScopeError> {
    let ctx = resolve_request(db, state, req).ok_or(ScopeError::Unauthenticated)?;

    match ctx.role.as_str() {
        "admin" => match ctx.company_id.clone() {
            Some(company_id) => Ok((ctx, company_id)),
            None => Err(ScopeError::Forbidden),
        },
        "superadmin" => match requested_company {
            Some(company_id) if !company_id.is_empty() => Ok((ctx, company_id.to_string())),
            _ => Err(ScopeError::MissingCompany),
        },
        _ => Err(ScopeError::Forbidden),
    }
}
