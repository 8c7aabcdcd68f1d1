use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use memory_lane_common::{from_unix_seconds, to_unix_seconds, AuthorProfile};

use crate::models::{Memory, MemoryFields, MemoryWithAuthor, User};

/// SQLite-backed store for users and their memories.
///
/// Every method issues a single statement; integrity (primary keys,
/// foreign keys, cascade delete) is left to SQLite.
pub struct Store {
    conn: Mutex<Connection>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

const MEMORY_WITH_AUTHOR_COLUMNS: &str =
    "m.id, m.name, m.description, m.timestamp, m.author, u.first_name, u.last_name, u.profile_picture_url";

impl Store {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
            }
            Connection::open(path)?
        };

        conn.pragma_update(None, "foreign_keys", true)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                first_name TEXT,
                last_name TEXT,
                profile_picture_url TEXT,
                bio TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                timestamp INTEGER NOT NULL,
                author TEXT NOT NULL,
                FOREIGN KEY (author) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_memories_author ON memories(author)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp)",
            [],
        )?;

        tracing::info!("Store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))
    }

    /// Insert a user on first sight, or refresh the provider-owned profile
    /// fields of an existing one. The bio is only ever set by `update_bio`.
    pub fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT INTO users (id, email, first_name, last_name, profile_picture_url, bio)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                profile_picture_url = excluded.profile_picture_url",
            params![
                user.id,
                user.email,
                user.first_name,
                user.last_name,
                user.profile_picture_url,
                user.bio,
            ],
        )?;

        tracing::debug!("Upserted user {} ({} row)", user.id, inserted);
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;

        let user = conn
            .query_row(
                "SELECT id, email, first_name, last_name, profile_picture_url, bio
                 FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        profile_picture_url: row.get(4)?,
                        bio: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    /// Returns false when the user does not exist.
    pub fn update_bio(&self, user_id: &str, bio: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users SET bio = ?1 WHERE id = ?2",
            params![bio, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Delete a user together with every memory they authored.
    pub fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        if rows > 0 {
            tracing::info!("Deleted user {}", user_id);
        }
        Ok(rows > 0)
    }

    pub fn create_memory(&self, author: &str, fields: &MemoryFields) -> Result<Memory, StoreError> {
        let conn = self.conn()?;

        let memory = conn.query_row(
            "INSERT INTO memories (name, description, timestamp, author)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, name, description, timestamp, author",
            params![
                fields.name,
                fields.description,
                format_timestamp(&fields.timestamp),
                author,
            ],
            memory_from_row,
        )?;

        tracing::debug!("Created memory {} for {}", memory.id, author);
        Ok(memory)
    }

    pub fn get_memory(&self, memory_id: i64) -> Result<Option<Memory>, StoreError> {
        let conn = self.conn()?;

        let memory = conn
            .query_row(
                "SELECT id, name, description, timestamp, author FROM memories WHERE id = ?1",
                params![memory_id],
                memory_from_row,
            )
            .optional()?;

        Ok(memory)
    }

    /// Returns false when no memory has this id.
    pub fn update_memory(&self, memory_id: i64, fields: &MemoryFields) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE memories SET name = ?1, description = ?2, timestamp = ?3 WHERE id = ?4",
            params![
                fields.name,
                fields.description,
                format_timestamp(&fields.timestamp),
                memory_id,
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_memory(&self, memory_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM memories WHERE id = ?1", params![memory_id])?;
        Ok(rows > 0)
    }

    /// All memories, newest first, with each author's public profile.
    pub fn list_memories(&self) -> Result<Vec<MemoryWithAuthor>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_WITH_AUTHOR_COLUMNS}
             FROM memories m JOIN users u ON u.id = m.author
             ORDER BY m.timestamp DESC, m.id DESC"
        ))?;

        let memories = stmt
            .query_map([], memory_with_author_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(memories)
    }

    /// Memories written by one user, newest first.
    pub fn list_memories_for_user(&self, user_id: &str) -> Result<Vec<MemoryWithAuthor>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_WITH_AUTHOR_COLUMNS}
             FROM memories m JOIN users u ON u.id = m.author
             WHERE m.author = ?1
             ORDER BY m.timestamp DESC, m.id DESC"
        ))?;

        let memories = stmt
            .query_map(params![user_id], memory_with_author_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(memories)
    }

    /// Whether `user_id` authored `memory_id`.
    pub fn is_owner(&self, user_id: &str, memory_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let owned: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1 AND author = ?2)",
            params![memory_id, user_id],
            |row| row.get(0),
        )?;
        Ok(owned)
    }
}

/// Timestamps are stored as Unix seconds so they sort numerically.
fn format_timestamp(dt: &DateTime<Utc>) -> i64 {
    to_unix_seconds(dt)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    from_unix_seconds(secs)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        timestamp: parse_timestamp(row, 3)?,
        author: row.get(4)?,
    })
}

fn memory_with_author_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryWithAuthor> {
    Ok(MemoryWithAuthor {
        memory: memory_from_row(row)?,
        author: AuthorProfile {
            first_name: row.get(5)?,
            last_name: row.get(6)?,
            profile_picture_url: row.get(7)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::new(":memory:").unwrap()
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            first_name: Some("First".to_string()),
            last_name: Some("Last".to_string()),
            profile_picture_url: None,
            bio: None,
        }
    }

    fn fields(name: &str, secs: i64) -> MemoryFields {
        MemoryFields {
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            timestamp: from_unix_seconds(secs).unwrap(),
        }
    }

    #[test]
    fn test_create_and_get_memory() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();

        let created = store.create_memory("u1", &fields("Trip", 1_700_000_000)).unwrap();
        assert!(created.id > 0);
        assert_eq!(created.author, "u1");

        let fetched = store.get_memory(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_get_missing_memory() {
        assert!(store().get_memory(42).unwrap().is_none());
    }

    #[test]
    fn test_memory_requires_existing_author() {
        let store = store();
        let result = store.create_memory("ghost", &fields("Trip", 1));
        assert!(matches!(result, Err(StoreError::DatabaseError(_))));
    }

    #[test]
    fn test_upsert_user_keeps_bio() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();
        assert!(store.update_bio("u1", "hello").unwrap());

        let mut renamed = user("u1");
        renamed.first_name = Some("Renamed".to_string());
        store.upsert_user(&renamed).unwrap();

        let fetched = store.get_user("u1").unwrap().unwrap();
        assert_eq!(fetched.first_name.as_deref(), Some("Renamed"));
        assert_eq!(fetched.bio.as_deref(), Some("hello"));
    }

    #[test]
    fn test_update_bio_unknown_user() {
        assert!(!store().update_bio("nobody", "bio").unwrap());
    }

    #[test]
    fn test_list_memories_newest_first() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();
        store.upsert_user(&user("u2")).unwrap();

        store.create_memory("u1", &fields("old", 1_000)).unwrap();
        store.create_memory("u2", &fields("new", 3_000)).unwrap();
        store.create_memory("u1", &fields("mid", 2_000)).unwrap();

        let names: Vec<String> = store
            .list_memories()
            .unwrap()
            .into_iter()
            .map(|m| m.memory.name)
            .collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_list_memories_for_user_filters_author() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();
        store.upsert_user(&user("u2")).unwrap();
        store.create_memory("u1", &fields("mine", 1)).unwrap();
        store.create_memory("u2", &fields("theirs", 2)).unwrap();

        let memories = store.list_memories_for_user("u1").unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].memory.name, "mine");
        assert_eq!(memories[0].author.first_name.as_deref(), Some("First"));
    }

    #[test]
    fn test_is_owner() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();
        store.upsert_user(&user("u2")).unwrap();
        let memory = store.create_memory("u1", &fields("Trip", 1)).unwrap();

        assert!(store.is_owner("u1", memory.id).unwrap());
        assert!(!store.is_owner("u2", memory.id).unwrap());
        assert!(!store.is_owner("u1", memory.id + 1).unwrap());
    }

    #[test]
    fn test_update_and_delete_memory() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();
        let memory = store.create_memory("u1", &fields("Trip", 1)).unwrap();

        let mut changed = fields("Trip 2", 99);
        changed.description = None;
        assert!(store.update_memory(memory.id, &changed).unwrap());

        let fetched = store.get_memory(memory.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Trip 2");
        assert!(fetched.description.is_none());
        assert_eq!(fetched.timestamp.timestamp(), 99);

        assert!(store.delete_memory(memory.id).unwrap());
        assert!(!store.delete_memory(memory.id).unwrap());
        assert!(!store.update_memory(memory.id, &changed).unwrap());
    }

    #[test]
    fn test_delete_user_cascades_to_memories() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();
        store.upsert_user(&user("u2")).unwrap();
        let mine = store.create_memory("u1", &fields("mine", 1)).unwrap();
        let theirs = store.create_memory("u2", &fields("theirs", 2)).unwrap();

        assert!(store.delete_user("u1").unwrap());

        assert!(store.get_memory(mine.id).unwrap().is_none());
        assert!(store.get_memory(theirs.id).unwrap().is_some());
        assert!(store.get_user("u1").unwrap().is_none());
    }

    #[test]
    fn test_store_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/memory-lane.db").display());

        {
            let store = Store::new(&url).unwrap();
            store.upsert_user(&user("u1")).unwrap();
            store.create_memory("u1", &fields("Trip", 1)).unwrap();
        }

        let reopened = Store::new(&url).unwrap();
        assert_eq!(reopened.list_memories().unwrap().len(), 1);
    }

    #[test]
    fn test_feed_orders_before_common_era_dates_numerically() {
        let store = store();
        store.upsert_user(&user("u1")).unwrap();
        store.create_memory("u1", &fields("Year 1", -62_135_596_800)).unwrap();
        store.create_memory("u1", &fields("Year 0", -62_167_219_200)).unwrap();
        store.create_memory("u1", &fields("Year 9999", 253_402_300_799)).unwrap();

        let names: Vec<String> = store
            .list_memories()
            .unwrap()
            .into_iter()
            .map(|m| m.memory.name)
            .collect();
        assert_eq!(names, vec!["Year 9999", "Year 1", "Year 0"]);
    }
}
