use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::db::Database;

#[derive(Debug, Clone, Serialize)]
pub struct Superadmin {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub created_at: String,
}

const COLUMNS: &str = "id, email, password, name, totp_secret, totp_enabled, created_at";

fn from_row(row: &Row) -> rusqlite::Result<Superadmin> {
    Ok(Superadmin {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        totp_secret: row.get(4)?,
        totp_enabled: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Superadmin {
    pub fn insert(db: &Database, email: &str, password_hash: &str, name: &str) -> rusqlite::Result<Superadmin> {
        let id = Uuid::new_v4().to_string();
        db.conn.execute(
            "INSERT INTO superadmins (id, email, password, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, email.to_lowercase(), password_hash, name, Utc::now().to_rfc3339()],
        )?;
        match Superadmin::get(db, &id)? {
            Some(admin) => Ok(admin),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    pub fn get(db: &Database, id: &str) -> rusqlite::Result<Option<Superadmin>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM superadmins WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )
            .optional()
    }

    pub fn get_by_email(db: &Database, email: &str) -> rusqlite::Result<Option<Superadmin>> {
        db.conn
            .query_row(
                &format!("SELECT {} FROM superadmins WHERE email = ?1", COLUMNS),
                params![email.to_lowercase()],
                from_row,
            )
            .optional()
    }

    pub fn list(db: &Database) -> rusqlite::Result<Vec<Superadmin>> {
        let mut stmt = db
            .conn
            .prepare(&format!("SELECT {} FROM superadmins ORDER BY created_at", COLUMNS))?;
        let rows = stmt.query_map([], from_row)?;
        rows.collect()
    }

    pub fn count(db: &Database) -> rusqlite::Result<i64> {
        db.conn
            .query_row("SELECT COUNT(*) FROM superadmins", [], |row| row.get(0))
    }

    pub fn delete(db: &Database, id: &str) -> rusqlite::Result<bool> {
        db.conn
            .execute("DELETE FROM sessions WHERE user_table = 'superadmins' AND user_id = ?1", params![id])?;
        let changed = db.conn.execute("DELETE FROM superadmins WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn store_totp_secret(db: &Database, id: &str, secret: &str) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE superadmins SET totp_secret = ?1, totp_enabled = 0 WHERE id = ?2",
            params![secret, id],
        )?;
        Ok(changed > 0)
    }

    pub fn enable_totp(db: &Database, id: &str) -> rusqlite::Result<bool> {
        let changed = db.conn.execute(
            "UPDATE superadmins SET totp_enabled = 1 WHERE id = ?1 AND totp_secret IS NOT NULL",
            params![id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup_by_email() {
        let db = Database::open_in_memory().unwrap();
        let admin = Superadmin::insert(&db, "Root@Makar.id", "hash", "Root").unwrap();
        assert_eq!(admin.email, "root@makar.id");

        let found = Superadmin::get_by_email(&db, "ROOT@makar.id").unwrap().unwrap();
        assert_eq!(found.id, admin.id);
        assert_eq!(Superadmin::count(&db).unwrap(), 1);
    }

    #[test]
    fn totp_enable_requires_a_stored_secret() {
        let db = Database::open_in_memory().unwrap();
        let admin = Superadmin::insert(&db, "root@makar.id", "hash", "Root").unwrap();

        // No secret yet, enabling is a no-op
        assert!(!Superadmin::enable_totp(&db, &admin.id).unwrap());

        Superadmin::store_totp_secret(&db, &admin.id, "aabbcc").unwrap();
        assert!(Superadmin::enable_totp(&db, &admin.id).unwrap());
        let reloaded = Superadmin::get(&db, &admin.id).unwrap().unwrap();
        assert!(reloaded.totp_enabled);
        assert_eq!(reloaded.totp_secret.as_deref(), Some("aabbcc"));
    }

    #[test]
    fn delete_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let admin = Superadmin::insert(&db, "root@makar.id", "hash", "Root").unwrap();
        assert!(Superadmin::delete(&db, &admin.id).unwrap());
        assert!(!Superadmin::delete(&db, &admin.id).unwrap());
    }
}
