use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::db::Database;
use crate::enums::PageType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub custom_domain: Option<String>,
    pub active: bool,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub culture: Option<String>,
    pub benefits: Option<String>,
    pub gallery: Vec<String>,
    pub brand_color: Option<String>,
    pub page_type: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub slug: String,
    pub custom_domain: Option<String>,
    pub logo: Option<String>,
    pub description: Option<String>,
    pub culture: Option<String>,
    pub benefits: Option<String>,
    #[serde(default)]
    pub gallery: Vec<String>,
    pub brand_color: Option<String>,
    pub page_type: Option<String>,
}

const COLUMNS: &str = "id, name, slug, custom_domain, active, logo, description, culture, benefits, gallery, brand_color, page_type, created_at, updated_at";

fn from_row(row: &Row) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        custom_domain: row.get(3)?,
        active: row.get(4)?,
        logo: row.get(5)?,
        description: row.get(6)?,
        culture: row.get(7)?,
        benefits: row.get(8)?,
        gallery: serde_json::from_str(&row.get::<_, String>(9)?).unwrap_or_default(),
        brand_color: row.get(10)?,
        page_type: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl Company {
    pub fn insert(db: &Database, new: &NewCompany) -> rusqlite::Result<Company> {
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        let gallery = serde_json::to_string(&new.gallery).unwrap_or_else(|_| "[]".to_string());
        let page_type = new
            .page_type
            .clone()
            .unwrap_or_else(|| PageType::Careers.as_str().to_string());

        db.conn.execute(
            "INSERT INTO companies (id, name, slug, custom_domain, active, logo, description, culture, benefits, gallery, brand_color, page_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                id,
                new.name,
                new.slug.to_lowercase(),
                new.custom_domain.as_ref().map(|d| d.to_lowercase()),
                new.logo,
                new.description,
                new.culture,
                new.benefits,
                gallery,
                new.brand_color,
                page_type,
                now
            ],
        )?;

        match Company::get(db, &id)? {
            Some(company) => Ok(company),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    pub fn list(db: &Database) -> rusqlite::Result<Vec<Company>> {
        let mut stmt = db
            .conn
            .prepare(&format!("SELECT {} FROM companies ORDER BY created_at DESC", COLUMNS))?;
        let rows = stmt.query_map([], from_row)?;
        rows.collect()
    }

    pub fn get(db: &Database, id: &str) -> rusqlite::Result<Option<Company>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )
            .optional()
    }

    pub fn get_by_slug(db: &Database, slug: &str) -> rusqlite::Result<Option<Company>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE slug = ?1", COLUMNS),
                params![slug.to_lowercase()],
                from_row,
            )
            .optional()
    }

    // Tenant lookup for an arbitrary incoming hostname: a configured custom
    // domain wins, otherwise the first DNS label is tried as a slug.
    pub fn resolve_host(db: &Database, host: &str) -> rusqlite::Result<Option<Company>> {
        let host = host.to_lowercase();
        if let Some(company) = db
            .conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE custom_domain = ?1 AND active = 1", COLUMNS),
                params![host],
                from_row,
            )
            .optional()?
        {
            return Ok(Some(company));
        }

        let label = match host.split('.').next() {
            Some(label) if !label.is_empty() => label,
            _ => return Ok(None),
        };
        db.conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE slug = ?1 AND active = 1", COLUMNS),
                params![label],
                from_row,
            )
            .optional()
    }

    pub fn update(db: &Database, id: &str, new: &NewCompany) -> rusqlite::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let gallery = serde_json::to_string(&new.gallery).unwrap_or_else(|_| "[]".to_string());
        let page_type = new
            .page_type
            .clone()
            .unwrap_or_else(|| PageType::Careers.as_str().to_string());

        let changed = db.conn.execute(
            "UPDATE companies SET name = ?1, slug = ?2, custom_domain = ?3, logo = ?4, description = ?5,
                 culture = ?6, benefits = ?7, gallery = ?8, brand_color = ?9, page_type = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                new.name,
                new.slug.to_lowercase(),
                new.custom_domain.as_ref().map(|d| d.to_lowercase()),
                new.logo,
                new.description,
                new.culture,
                new.benefits,
                gallery,
                new.brand_color,
                page_type,
                now,
                id
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn set_active(db: &Database, id: &str, active: bool) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE companies SET active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(db: &Database, id: &str) -> rusqlite::Result<bool> {
        // Child rows first, same order the product deletes a tenant
        db.conn
            .execute("DELETE FROM applications WHERE company_id = ?1", params![id])?;
        db.conn.execute("DELETE FROM jobs WHERE company_id = ?1", params![id])?;
        db.conn.execute("DELETE FROM users WHERE company_id = ?1", params![id])?;
        db.conn
            .execute("DELETE FROM sessions WHERE company_id = ?1", params![id])?;
        let changed = db.conn.execute("DELETE FROM companies WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
pub fn seed_company(db: &Database, name: &str, slug: &str, domain: Option<&str>) -> Company {
    Company::insert(
        db,
        &NewCompany {
            name: name.to_string(),
            slug: slug.to_string(),
            custom_domain: domain.map(|d| d.to_string()),
            logo: None,
            description: None,
            culture: None,
            benefits: None,
            gallery: vec![],
            brand_color: None,
            page_type: None,
        },
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_list_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        let acme = seed_company(&db, "Acme", "Acme", Some("careers.acme.example"));
        assert_eq!(acme.slug, "acme");
        assert!(acme.active);

        let listed = Company::list(&db).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(Company::get_by_slug(&db, "acme").unwrap().unwrap().id, acme.id);
        assert!(Company::get(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn host_resolution_prefers_custom_domain_then_slug() {
        let db = Database::open_in_memory().unwrap();
        let acme = seed_company(&db, "Acme", "acme", Some("careers.acme.example"));
        let beta = seed_company(&db, "Beta", "beta", None);

        let by_domain = Company::resolve_host(&db, "careers.acme.example").unwrap().unwrap();
        assert_eq!(by_domain.id, acme.id);

        let by_slug = Company::resolve_host(&db, "beta.some-host.example").unwrap().unwrap();
        assert_eq!(by_slug.id, beta.id);

        assert!(Company::resolve_host(&db, "unknown.example").unwrap().is_none());
    }

    #[test]
    fn inactive_companies_do_not_resolve() {
        let db = Database::open_in_memory().unwrap();
        let acme = seed_company(&db, "Acme", "acme", Some("careers.acme.example"));
        Company::set_active(&db, &acme.id, false).unwrap();

        assert!(Company::resolve_host(&db, "careers.acme.example").unwrap().is_none());
        // The super-admin console still sees it
        assert_eq!(Company::list(&db).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed_company(&db, "Acme", "acme", None);
        let dup = Company::insert(
            &db,
            &NewCompany {
                name: "Acme Again".to_string(),
                slug: "acme".to_string(),
                custom_domain: None,
                logo: None,
                description: None,
                culture: None,
                benefits: None,
                gallery: vec![],
                brand_color: None,
                page_type: None,
            },
        );
        assert!(dup.is_err());
    }

    #[test]
    fn delete_removes_dependents() {
        let db = Database::open_in_memory().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        assert!(Company::delete(&db, &acme.id).unwrap());
        assert!(Company::get(&db, &acme.id).unwrap().is_none());
        assert!(!Company::delete(&db, &acme.id).unwrap());
    }
}
