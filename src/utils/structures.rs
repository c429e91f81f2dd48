use std::env;
use std::path::PathBuf;

use serde::{Serialize, Deserialize};

// Shared configuration handed to every handler through actix app data.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub hash_secret: String,
    pub jwt_secret: String,
    pub google_userinfo_url: String,
    pub product_domains: Vec<String>,
}

impl AppState {
    pub fn from_env() -> AppState {
        let product_domains = match env::var("PRODUCT_DOMAINS") {
            Ok(raw) => raw.split(',').map(|d| d.trim().to_lowercase()).filter(|d| !d.is_empty()).collect(),
            Err(_) => AppState::default_product_domains(),
        };

        AppState {
            db_path: PathBuf::from(env::var("MAKARID_DB").unwrap_or_else(|_| "makarid.db".to_string())),
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string())),
            hash_secret: env::var("HASH_SECRET").unwrap_or_else(|_| {
                tracing::warn!("HASH_SECRET not set, using development default");
                "makarid-dev-hash-secret".to_string()
            }),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                tracing::warn!("JWT_SECRET not set, using development default");
                "makarid-dev-jwt-secret".to_string()
            }),
            google_userinfo_url: env::var("GOOGLE_USERINFO_URL")
                .unwrap_or_else(|_| "https://oauth.makar.id/session".to_string()),
            product_domains,
        }
    }

    // Entries starting with '.' match as a suffix, everything else exactly.
    pub fn default_product_domains() -> Vec<String> {
        vec![
            "makar.id".to_string(),
            ".makar.id".to_string(),
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ]
    }
}

// One (company, role) pair a credential is authorized for. Computed at
// login time from matching account rows, never persisted as its own table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub company_id: String,
    pub company_name: String,
    pub company_logo: Option<String>,
    pub role: String,
    pub user_table: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleGrant {
    pub role: String,
    pub user_table: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyGrants {
    pub company_id: String,
    pub company_name: String,
    pub company_logo: Option<String>,
    pub roles: Vec<RoleGrant>,
}

// Collapse the flat grant list into one entry per company so the client can
// render the two-step chooser. Companies keep first-appearance order and
// each company lists only the roles actually granted for it.
pub fn group_grants(grants: &[AccessGrant]) -> Vec<CompanyGrants> {
    let mut companies: Vec<CompanyGrants> = Vec::new();

    for grant in grants {
        let role = RoleGrant {
            role: grant.role.clone(),
            user_table: grant.user_table.clone(),
            user_id: grant.user_id.clone(),
        };

        match companies.iter_mut().find(|c| c.company_id == grant.company_id) {
            Some(entry) => entry.roles.push(role),
            None => companies.push(CompanyGrants {
                company_id: grant.company_id.clone(),
                company_name: grant.company_name.clone(),
                company_logo: grant.company_logo.clone(),
                roles: vec![role],
            }),
        }
    }

    companies
}

// Hostnames on the product's own domains never resolve to a tenant.
// The allow-list holds exact entries plus ".suffix" entries.
pub fn is_product_domain(host: &str, allow: &[String]) -> bool {
    let host = host.trim().to_lowercase();
    let host = host.split(':').next().unwrap_or("").to_string();
    if host.is_empty() {
        return false;
    }

    allow.iter().any(|entry| {
        if let Some(suffix) = entry.strip_prefix('.') {
            host.ends_with(entry.as_str()) || host == suffix
        } else {
            host == *entry
        }
    })
}

// Fixed configuration for unit tests, no environment reads involved.
#[cfg(test)]
pub fn test_state() -> AppState {
    AppState {
        db_path: PathBuf::from(":memory:"),
        upload_dir: std::env::temp_dir(),
        hash_secret: "test-hash-secret".to_string(),
        jwt_secret: "test-jwt-secret".to_string(),
        google_userinfo_url: "http://127.0.0.1:0/session".to_string(),
        product_domains: AppState::default_product_domains(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grant(company: &str, role: &str, user: &str) -> AccessGrant {
        AccessGrant {
            company_id: company.to_string(),
            company_name: format!("{} Inc", company),
            company_logo: None,
            role: role.to_string(),
            user_table: "users".to_string(),
            user_id: user.to_string(),
        }
    }

    #[test]
    fn grants_group_by_company_preserving_order() {
        let grants = vec![
            grant("c-a", "admin", "u-1"),
            grant("c-b", "employee", "u-2"),
            grant("c-a", "employee", "u-3"),
        ];

        let grouped = group_grants(&grants);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].company_id, "c-a");
        assert_eq!(
            grouped[0].roles.iter().map(|r| r.role.as_str()).collect::<Vec<_>>(),
            vec!["admin", "employee"]
        );
        assert_eq!(grouped[1].company_id, "c-b");
        assert_eq!(grouped[1].roles.len(), 1);
        assert_eq!(grouped[1].roles[0].role, "employee");
    }

    #[test]
    fn grouping_keeps_role_owner_ids() {
        let grants = vec![grant("c-a", "admin", "u-1"), grant("c-a", "employee", "u-9")];
        let grouped = group_grants(&grants);
        assert_eq!(grouped[0].roles[0].user_id, "u-1");
        assert_eq!(grouped[0].roles[1].user_id, "u-9");
    }

    #[test]
    fn product_domains_match_exact_and_suffix() {
        let allow = AppState::default_product_domains();
        assert!(is_product_domain("makar.id", &allow));
        assert!(is_product_domain("www.makar.id", &allow));
        assert!(is_product_domain("app.makar.id:3000", &allow));
        assert!(is_product_domain("LOCALHOST", &allow));
        assert!(!is_product_domain("careers.acme.co.id", &allow));
        assert!(!is_product_domain("notmakar.id", &allow));
        assert!(!is_product_domain("", &allow));
    }
}
