//! SQLite cache for a fast first frame: capsule branches, PR lists, login.

use crate::error::{Error, Result};
use crate::model::Pr;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("mctl"))
}

pub fn db_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("cache.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS branches (
  repo TEXT NOT NULL,
  capsule TEXT NOT NULL,
  branch TEXT NOT NULL,
  PRIMARY KEY (repo, capsule)
);

CREATE TABLE IF NOT EXISTS prs (
  repo TEXT PRIMARY KEY,
  payload TEXT NOT NULL,           -- JSON array of PRs in list order
  fetched_at INTEGER NOT NULL      -- unix timestamp
);

CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
    )?;
    Ok(())
}

pub fn save_branch(conn: &Connection, repo: &str, capsule: &str, branch: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO branches (repo, capsule, branch) VALUES (?1, ?2, ?3)
ON CONFLICT(repo, capsule) DO UPDATE SET branch = excluded.branch
"#,
        params![repo, capsule, branch],
    )?;
    Ok(())
}

/// repo -> capsule -> branch.
pub fn load_branches(conn: &Connection) -> Result<HashMap<String, HashMap<String, String>>> {
    let mut stmt = conn.prepare("SELECT repo, capsule, branch FROM branches")?;
    let mut rows = stmt.query([])?;
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let repo: String = row.get(0)?;
        out.entry(repo).or_default().insert(row.get(1)?, row.get(2)?);
    }
    Ok(out)
}

pub fn save_prs(conn: &Connection, repo: &str, prs: &[Pr]) -> Result<()> {
    let payload = serde_json::to_string(prs)?;
    conn.execute(
        r#"
INSERT INTO prs (repo, payload, fetched_at) VALUES (?1, ?2, ?3)
ON CONFLICT(repo) DO UPDATE SET
  payload = excluded.payload,
  fetched_at = excluded.fetched_at
"#,
        params![repo, payload, now_unix()],
    )?;
    Ok(())
}

/// Rows that no longer decode are skipped; the next fetch overwrites them.
pub fn load_prs(conn: &Connection) -> Result<HashMap<String, Vec<Pr>>> {
    let mut stmt = conn.prepare("SELECT repo, payload FROM prs")?;
    let mut rows = stmt.query([])?;
    let mut out = HashMap::new();
    while let Some(row) = rows.next()? {
        let repo: String = row.get(0)?;
        let payload: String = row.get(1)?;
        match serde_json::from_str::<Vec<Pr>>(&payload) {
            Ok(prs) => {
                out.insert(repo, prs);
            }
            Err(e) => tracing::warn!(%repo, "ignoring undecodable cached PR list: {e}"),
        }
    }
    Ok(out)
}

pub fn set_kv(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn get_kv(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |r| r.get(0))
        .optional()?)
}

pub const LOGIN_KEY: &str = "login";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pr;

    fn temp_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_db(&dir.path().join("nested").join("cache.sqlite")).unwrap();
        (dir, conn)
    }

    #[test]
    fn branches_upsert_per_capsule() {
        let (_dir, conn) = temp_db();
        save_branch(&conn, "web", "auth", "feat/auth").unwrap();
        save_branch(&conn, "web", "auth", "feat/auth-v2").unwrap();
        save_branch(&conn, "api", ".ground", "main").unwrap();

        let all = load_branches(&conn).unwrap();
        assert_eq!(all["web"]["auth"], "feat/auth-v2");
        assert_eq!(all["api"][".ground"], "main");
    }

    #[test]
    fn pr_lists_roundtrip_in_order() {
        let (_dir, conn) = temp_db();
        save_prs(&conn, "web", &[pr(2, "b", "x"), pr(1, "a", "y")]).unwrap();
        let all = load_prs(&conn).unwrap();
        let numbers: Vec<i64> = all["web"].iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[test]
    fn corrupt_payload_is_skipped() {
        let (_dir, conn) = temp_db();
        conn.execute(
            "INSERT INTO prs (repo, payload, fetched_at) VALUES ('web', 'not json', 0)",
            [],
        )
        .unwrap();
        save_prs(&conn, "api", &[]).unwrap();
        let all = load_prs(&conn).unwrap();
        assert!(!all.contains_key("web"));
        assert!(all["api"].is_empty());
    }

    #[test]
    fn login_is_stored_in_kv() {
        let (_dir, conn) = temp_db();
        assert_eq!(get_kv(&conn, LOGIN_KEY).unwrap(), None);
        set_kv(&conn, LOGIN_KEY, "me").unwrap();
        set_kv(&conn, LOGIN_KEY, "me2").unwrap();
        assert_eq!(get_kv(&conn, LOGIN_KEY).unwrap().as_deref(), Some("me2"));
    }
}
