use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::db::Database;
use crate::enums::ApplicationStatus;

#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: String,
    pub job_id: String,
    pub company_id: String,
    pub applicant_name: String,
    pub applicant_email: String,
    // Schema-less candidate form data, stored as submitted
    pub answers: serde_json::Value,
    pub resume_path: Option<String>,
    pub status: String,
    pub trashed: bool,
    pub created_at: String,
    pub updated_at: String,
}

fn empty_answers() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Deserialize)]
pub struct NewApplication {
    pub applicant_name: String,
    pub applicant_email: String,
    #[serde(default = "empty_answers")]
    pub answers: serde_json::Value,
    pub resume_path: Option<String>,
}

#[derive(Debug, Default)]
pub struct ApplicationFilter {
    pub job_id: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub trashed: bool,
}

const COLUMNS: &str = "id, job_id, company_id, applicant_name, applicant_email, answers, resume_path, status, trashed, created_at, updated_at";

fn from_row(row: &Row) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        job_id: row.get(1)?,
        company_id: row.get(2)?,
        applicant_name: row.get(3)?,
        applicant_email: row.get(4)?,
        answers: serde_json::from_str(&row.get::<_, String>(5)?).unwrap_or(serde_json::json!({})),
        resume_path: row.get(6)?,
        status: row.get(7)?,
        trashed: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl Application {
    pub fn insert(db: &Database, job_id: &str, company_id: &str, new: &NewApplication) -> rusqlite::Result<Application> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let answers = new.answers.to_string();
        db.conn.execute(
            "INSERT INTO applications (id, job_id, company_id, applicant_name, applicant_email, answers, resume_path, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?8)",
            params![
                id,
                job_id,
                company_id,
                new.applicant_name,
                new.applicant_email.to_lowercase(),
                answers,
                new.resume_path,
                now
            ],
        )?;
        match Application::get_scoped(db, company_id, &id)? {
            Some(application) => Ok(application),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    pub fn get_scoped(db: &Database, company_id: &str, id: &str) -> rusqlite::Result<Option<Application>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM applications WHERE company_id = ?1 AND id = ?2", COLUMNS),
                params![company_id, id],
                from_row,
            )
            .optional()
    }

    // Default listings exclude the trash, the trash view shows only it.
    pub fn list(db: &Database, company_id: &str, filter: &ApplicationFilter) -> rusqlite::Result<Vec<Application>> {
        let mut stmt = db.conn.prepare(&format!(
            "SELECT {} FROM applications
             WHERE company_id = ?1 AND trashed = ?2
               AND (?3 IS NULL OR job_id = ?3)
               AND (?4 IS NULL OR status = ?4)
             ORDER BY created_at DESC",
            COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![
                company_id,
                filter.trashed,
                filter.job_id,
                filter.status.map(|s| s.as_str())
            ],
            from_row,
        )?;
        rows.collect()
    }

    pub fn set_status(db: &Database, company_id: &str, id: &str, next: ApplicationStatus) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE applications SET status = ?1, updated_at = ?2 WHERE company_id = ?3 AND id = ?4 AND trashed = 0",
            params![next.as_str(), Utc::now().to_rfc3339(), company_id, id],
        )?;
        Ok(changed > 0)
    }

    pub fn set_trashed(db: &Database, company_id: &str, id: &str, trashed: bool) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE applications SET trashed = ?1, updated_at = ?2 WHERE company_id = ?3 AND id = ?4",
            params![trashed, Utc::now().to_rfc3339(), company_id, id],
        )?;
        Ok(changed > 0)
    }

    // Permanent removal is only reachable from the trash.
    pub fn delete_trashed(db: &Database, company_id: &str, id: &str) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "DELETE FROM applications WHERE company_id = ?1 AND id = ?2 AND trashed = 1",
            params![company_id, id],
        )?;
        Ok(changed > 0)
    }

    pub fn count_by_status(db: &Database, company_id: &str) -> rusqlite::Result<Vec<(String, i64)>> {
        let mut stmt = db.conn.prepare(
            "SELECT status, COUNT(*) FROM applications WHERE company_id = ?1 AND trashed = 0 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.collect()
    }
}

#[cfg(test)]
pub fn seed_application(db: &Database, job_id: &str, company_id: &str, email: &str) -> Application {
    Application::insert(
        db,
        job_id,
        company_id,
        &NewApplication {
            applicant_name: "Candidate".to_string(),
            applicant_email: email.to_string(),
            answers: serde_json::json!({"motivation": "hello"}),
            resume_path: None,
        },
    )
    .unwrap()
}
