use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::db::Database;
use crate::enums::JobStatus;

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub company_id: String,
    pub title: String,
    pub description: String,
    pub jobtype: String,
    pub location: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub jobtype: String,
    pub location: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
}

const COLUMNS: &str = "id, company_id, title, description, jobtype, location, salary_min, salary_max, status, created_at, updated_at";

fn from_row(row: &Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        company_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        jobtype: row.get(4)?,
        location: row.get(5)?,
        salary_min: row.get(6)?,
        salary_max: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl Job {
    // New postings always start as drafts.
    pub fn insert(db: &Database, company_id: &str, new: &NewJob) -> rusqlite::Result<Job> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        db.conn.execute(
            "INSERT INTO jobs (id, company_id, title, description, jobtype, location, salary_min, salary_max, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'draft', ?9, ?9)",
            params![
                id,
                company_id,
                new.title,
                new.description,
                new.jobtype,
                new.location,
                new.salary_min,
                new.salary_max,
                now
            ],
        )?;
        match Job::get_scoped(db, company_id, &id)? {
            Some(job) => Ok(job),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    pub fn get_scoped(db: &Database, company_id: &str, id: &str) -> rusqlite::Result<Option<Job>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE company_id = ?1 AND id = ?2", COLUMNS),
                params![company_id, id],
                from_row,
            )
            .optional()
    }

    pub fn get(db: &Database, id: &str) -> rusqlite::Result<Option<Job>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )
            .optional()
    }

    pub fn get_published(db: &Database, id: &str) -> rusqlite::Result<Option<Job>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1 AND status = 'published'", COLUMNS),
                params![id],
                from_row,
            )
            .optional()
    }

    pub fn list_for_company(db: &Database, company_id: &str, status: Option<JobStatus>) -> rusqlite::Result<Vec<Job>> {
        match status {
            Some(status) => {
                let mut stmt = db.conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE company_id = ?1 AND status = ?2 ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let rows = stmt.query_map(params![company_id, status.as_str()], from_row)?;
                rows.collect()
            }
            None => {
                let mut stmt = db.conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE company_id = ?1 ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let rows = stmt.query_map(params![company_id], from_row)?;
                rows.collect()
            }
        }
    }

    // The public careers listing never shows drafts or closed postings.
    pub fn list_published(db: &Database, company_id: &str) -> rusqlite::Result<Vec<Job>> {
        Job::list_for_company(db, company_id, Some(JobStatus::Published))
    }

    pub fn update(db: &Database, company_id: &str, id: &str, new: &NewJob) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE jobs SET title = ?1, description = ?2, jobtype = ?3, location = ?4,
                 salary_min = ?5, salary_max = ?6, updated_at = ?7
             WHERE company_id = ?8 AND id = ?9",
            params![
                new.title,
                new.description,
                new.jobtype,
                new.location,
                new.salary_min,
                new.salary_max,
                Utc::now().to_rfc3339(),
                company_id,
                id
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn set_status(db: &Database, company_id: &str, id: &str, next: JobStatus) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE company_id = ?3 AND id = ?4",
            params![next.as_str(), Utc::now().to_rfc3339(), company_id, id],
        )?;
        Ok(changed > 0)
    }

    pub fn count_by_status(db: &Database, company_id: &str) -> rusqlite::Result<Vec<(String, i64)>> {
        let mut stmt = db
            .conn
            .prepare("SELECT status, COUNT(*) FROM jobs WHERE company_id = ?1 GROUP BY status")?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.collect()
    }

    pub fn delete(db: &Database, company_id: &str, id: &str) -> rusqlite::Result<bool> {
        db.conn.execute(
            "DELETE FROM applications WHERE company_id = ?1 AND job_id = ?2",
            params![company_id, id],
        )?;
        let changed = db.conn.execute(
            "DELETE FROM jobs WHERE company_id = ?1 AND id = ?2",
            params![company_id, id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
pub fn seed_job(db: &Database, company_id: &str, title: &str) -> Job {
    Job::insert(
        db,
        company_id,
        &NewJob {
            title: title.to_string(),
            description: "desc".to_string(),
            jobtype: "fulltime".to_string(),
            location: None,
            salary_min: None,
            salary_max: None,
        },
    )
    .unwrap()
}
