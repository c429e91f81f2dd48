use std::path::Path;

use rusqlite::Connection;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> rusqlite::Result<Database> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Database { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> rusqlite::Result<Database> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.init()?;
        Ok(db)
    }

    pub fn init(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                custom_domain TEXT UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                logo TEXT,
                description TEXT,
                culture TEXT,
                benefits TEXT,
                gallery TEXT NOT NULL DEFAULT '[]',
                brand_color TEXT,
                page_type TEXT NOT NULL DEFAULT 'careers' CHECK (page_type IN ('careers', 'profile')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS superadmins (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                name TEXT NOT NULL,
                totp_secret TEXT,
                totp_enabled INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL REFERENCES companies(id),
                email TEXT NOT NULL,
                password TEXT NOT NULL,
                name TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('admin', 'employee')),
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                UNIQUE (company_id, email)
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_table TEXT NOT NULL CHECK (user_table IN ('users', 'superadmins')),
                user_id TEXT NOT NULL,
                company_id TEXT,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS login_selections (
                token TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                grants TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS twofa_pending (
                token TEXT PRIMARY KEY,
                superadmin_id TEXT NOT NULL REFERENCES superadmins(id),
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL REFERENCES companies(id),
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                jobtype TEXT NOT NULL,
                location TEXT,
                salary_min INTEGER,
                salary_max INTEGER,
                status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'closed')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL REFERENCES jobs(id),
                company_id TEXT NOT NULL REFERENCES companies(id),
                applicant_name TEXT NOT NULL,
                applicant_email TEXT NOT NULL,
                answers TEXT NOT NULL DEFAULT '{}',
                resume_path TEXT,
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN (
                    'pending', 'reviewing', 'shortlisted', 'interview', 'offered', 'hired', 'rejected'
                )),
                trashed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS activity_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_id TEXT,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company_id);
            CREATE INDEX IF NOT EXISTS idx_applications_company ON applications(company_id);
            CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_id);
            CREATE INDEX IF NOT EXISTS idx_logs_company ON activity_logs(company_id);
            "#,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_applies_cleanly_twice() {
        let db = Database::open_in_memory().unwrap();
        // init is idempotent, the server runs it on every boot
        db.init().unwrap();
    }

    #[test]
    fn schema_rejects_unknown_status() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO companies (id, name, slug, created_at, updated_at)
                 VALUES ('c1', 'Acme', 'acme', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        db.conn
            .execute(
                "INSERT INTO jobs (id, company_id, title, description, jobtype, status, created_at, updated_at)
                 VALUES ('j1', 'c1', 'T', 'D', 'fulltime', 'archived', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap_err();
    }
}
