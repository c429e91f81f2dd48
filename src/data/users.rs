use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::db::Database;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub company_id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub role: String,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
    pub company_id: Option<String>,
}

const COLUMNS: &str = "id, company_id, email, password, name, role, active, created_at";

fn from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        company_id: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        name: row.get(4)?,
        role: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl User {
    pub fn insert(
        db: &Database,
        company_id: &str,
        email: &str,
        password_hash: &str,
        name: &str,
        role: &str,
    ) -> rusqlite::Result<User> {
        let id = Uuid::new_v4().to_string();
        db.conn.execute(
            "INSERT INTO users (id, company_id, email, password, name, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, company_id, email.to_lowercase(), password_hash, name, role, Utc::now().to_rfc3339()],
        )?;
        match User::get_scoped(db, company_id, &id)? {
            Some(user) => Ok(user),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    // All reads and writes from the admin surface are pinned to a company,
    // a row belonging to another tenant is indistinguishable from a missing one.
    pub fn get_scoped(db: &Database, company_id: &str, id: &str) -> rusqlite::Result<Option<User>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE company_id = ?1 AND id = ?2", COLUMNS),
                params![company_id, id],
                from_row,
            )
            .optional()
    }

    pub fn get(db: &Database, id: &str) -> rusqlite::Result<Option<User>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )
            .optional()
    }

    pub fn list_for_company(db: &Database, company_id: &str) -> rusqlite::Result<Vec<User>> {
        let mut stmt = db.conn.prepare(&format!(
            "SELECT {} FROM users WHERE company_id = ?1 ORDER BY created_at",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![company_id], from_row)?;
        rows.collect()
    }

    pub fn update(
        db: &Database,
        company_id: &str,
        id: &str,
        name: &str,
        role: &str,
    ) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE users SET name = ?1, role = ?2 WHERE company_id = ?3 AND id = ?4",
            params![name, role, company_id, id],
        )?;
        Ok(changed > 0)
    }

    pub fn set_active(db: &Database, company_id: &str, id: &str, active: bool) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE users SET active = ?1 WHERE company_id = ?2 AND id = ?3",
            params![active, company_id, id],
        )?;
        if changed > 0 && !active {
            // A deactivated user loses any live session immediately
            db.conn.execute(
                "DELETE FROM sessions WHERE user_table = 'users' AND user_id = ?1",
                params![id],
            )?;
        }
        Ok(changed > 0)
    }

    pub fn delete(db: &Database, company_id: &str, id: &str) -> rusqlite::Result<bool> {
        db.conn.execute(
            "DELETE FROM sessions WHERE user_table = 'users' AND user_id = ?1",
            params![id],
        )?;
        let changed = db.conn.execute(
            "DELETE FROM users WHERE company_id = ?1 AND id = ?2",
            params![company_id, id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companies::seed_company;

    #[test]
    fn scoped_reads_do_not_cross_tenants() {
        let db = Database::open_in_memory().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let beta = seed_company(&db, "Beta", "beta", None);
        let user = User::insert(&db, &acme.id, "jo@acme.example", "hash", "Jo", "admin").unwrap();

        assert!(User::get_scoped(&db, &acme.id, &user.id).unwrap().is_some());
        assert!(User::get_scoped(&db, &beta.id, &user.id).unwrap().is_none());
        assert!(!User::delete(&db, &beta.id, &user.id).unwrap());
    }

    #[test]
    fn same_email_may_exist_under_two_companies() {
        let db = Database::open_in_memory().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let beta = seed_company(&db, "Beta", "beta", None);

        User::insert(&db, &acme.id, "jo@example.com", "hash", "Jo", "admin").unwrap();
        User::insert(&db, &beta.id, "jo@example.com", "hash", "Jo", "employee").unwrap();
        // But not twice under the same company
        assert!(User::insert(&db, &acme.id, "jo@example.com", "hash", "Jo", "employee").is_err());
    }

    #[test]
    fn deactivation_drops_live_sessions() {
        let db = Database::open_in_memory().unwrap();
        let acme = seed_company(&db, "Acme", "acme", None);
        let user = User::insert(&db, &acme.id, "jo@acme.example", "hash", "Jo", "employee").unwrap();
        db.conn
            .execute(
                "INSERT INTO sessions (token, user_table, user_id, company_id, role, created_at, expires_at)
                 VALUES ('t1', 'users', ?1, ?2, 'employee', '2026-01-01T00:00:00Z', '2999-01-01T00:00:00Z')",
                params![user.id, acme.id],
            )
            .unwrap();

        User::set_active(&db, &acme.id, &user.id, false).unwrap();
        let remaining: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
