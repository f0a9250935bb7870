// SQLite-backed document store for raw and transformed match collections.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Named collections of JSON documents.
pub trait DocumentStore {
    /// All documents of `collection` in insertion order. An unknown
    /// collection is empty.
    fn find_all(&self, collection: &str) -> Result<Vec<Value>>;

    fn insert_one(&self, collection: &str, document: &Value) -> Result<()>;

    fn insert_many(&self, collection: &str, documents: &[Value]) -> Result<usize>;

    /// Remove every document of `collection`. Returns how many were removed.
    fn drop_collection(&self, collection: &str) -> Result<usize>;

    fn count(&self, collection: &str) -> Result<usize>;

    /// Replace the contents of `collection` with `documents`.
    fn replace_collection(&self, collection: &str, documents: &[Value]) -> Result<usize> {
        self.drop_collection(collection)?;
        self.insert_many(collection, documents)
    }
}

/// Document store persisted in a single SQLite table keyed by collection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure the documents
    /// table exists. Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                collection  TEXT NOT NULL,
                body        TEXT NOT NULL,
                inserted_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }
}

fn encode(document: &Value) -> Result<String> {
    serde_json::to_string(document).context("failed to serialize document")
}

impl DocumentStore for Database {
    fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")
            .context("failed to prepare find_all query")?;

        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))
            .with_context(|| format!("failed to query collection {collection}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to read document rows")?;

        bodies
            .iter()
            .enumerate()
            .map(|(idx, body)| {
                serde_json::from_str(body).with_context(|| {
                    format!("document {idx} of {collection} is not valid JSON")
                })
            })
            .collect()
    }

    fn insert_one(&self, collection: &str, document: &Value) -> Result<()> {
        let body = encode(document)?;
        self.conn()?
            .execute(
                "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
                params![collection, body],
            )
            .with_context(|| format!("failed to insert into {collection}"))?;
        Ok(())
    }

    fn insert_many(&self, collection: &str, documents: &[Value]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        insert_all(&tx, collection, documents)?;
        tx.commit().context("failed to commit insert_many")?;
        Ok(documents.len())
    }

    fn drop_collection(&self, collection: &str) -> Result<usize> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM documents WHERE collection = ?1",
                params![collection],
            )
            .with_context(|| format!("failed to drop collection {collection}"))?;
        Ok(removed)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        let n: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to count collection {collection}"))?;
        usize::try_from(n).context("negative document count")
    }

    /// Delete and insert inside one transaction: either the whole new set is
    /// visible or the previous contents remain.
    fn replace_collection(&self, collection: &str, documents: &[Value]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![collection],
        )
        .with_context(|| format!("failed to clear collection {collection}"))?;
        insert_all(&tx, collection, documents)?;
        tx.commit()
            .with_context(|| format!("failed to commit replacement of {collection}"))?;
        Ok(documents.len())
    }
}

fn insert_all(conn: &Connection, collection: &str, documents: &[Value]) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT INTO documents (collection, body) VALUES (?1, ?2)")
        .context("failed to prepare insert")?;
    for document in documents {
        stmt.execute(params![collection, encode(document)?])
            .with_context(|| format!("failed to insert into {collection}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

/// Serialize records into JSON documents.
pub fn to_documents<T: Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).context("failed to serialize record"))
        .collect()
}

/// Load every document of `collection` as `T`. A document that does not
/// match `T` is an error naming its position.
pub fn load_records<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<T>> {
    store
        .find_all(collection)?
        .into_iter()
        .enumerate()
        .map(|(idx, doc)| {
            serde_json::from_value(doc)
                .with_context(|| format!("document {idx} of {collection} does not match the schema"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Fixture {
        home: String,
        goals: u32,
    }

    #[test]
    fn open_creates_documents_table() {
        let db = test_db();
        let conn = db.conn().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"documents".to_string()));
    }

    #[test]
    fn unknown_collection_is_empty() {
        let db = test_db();
        assert!(db.find_all("nothing").unwrap().is_empty());
        assert_eq!(db.count("nothing").unwrap(), 0);
        assert_eq!(db.drop_collection("nothing").unwrap(), 0);
    }

    #[test]
    fn find_all_returns_insertion_order() {
        let db = test_db();
        for n in [3, 1, 2] {
            db.insert_one("raw", &json!({ "n": n })).unwrap();
        }
        let docs = db.find_all("raw").unwrap();
        let ns: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![3, 1, 2]);
    }

    #[test]
    fn collections_are_isolated() {
        let db = test_db();
        db.insert_one("raw", &json!({ "a": 1 })).unwrap();
        db.insert_many("transformed", &[json!({ "b": 1 }), json!({ "b": 2 })])
            .unwrap();

        assert_eq!(db.count("raw").unwrap(), 1);
        assert_eq!(db.count("transformed").unwrap(), 2);

        assert_eq!(db.drop_collection("transformed").unwrap(), 2);
        assert_eq!(db.count("raw").unwrap(), 1);
        assert_eq!(db.count("transformed").unwrap(), 0);
    }

    #[test]
    fn replace_collection_leaves_only_new_documents() {
        let db = test_db();
        db.insert_many("transformed", &[json!({ "old": 1 }), json!({ "old": 2 })])
            .unwrap();
        db.insert_one("raw", &json!({ "keep": true })).unwrap();

        let written = db
            .replace_collection("transformed", &[json!({ "new": 1 })])
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(db.find_all("transformed").unwrap(), vec![json!({ "new": 1 })]);
        assert_eq!(db.count("raw").unwrap(), 1);
    }

    #[test]
    fn replace_with_empty_set_clears_collection() {
        let db = test_db();
        db.insert_one("transformed", &json!({ "old": 1 })).unwrap();
        db.replace_collection("transformed", &[]).unwrap();
        assert_eq!(db.count("transformed").unwrap(), 0);
    }

    #[test]
    fn typed_round_trip_through_documents() {
        let db = test_db();
        let fixtures = vec![
            Fixture { home: "Ajax".into(), goals: 3 },
            Fixture { home: "PSV".into(), goals: 0 },
        ];
        db.insert_many("raw", &to_documents(&fixtures).unwrap()).unwrap();

        let loaded: Vec<Fixture> = load_records(&db, "raw").unwrap();
        assert_eq!(loaded, fixtures);
    }

    #[test]
    fn load_records_names_mismatched_document() {
        let db = test_db();
        db.insert_one("raw", &json!({ "home": "Ajax", "goals": 1 })).unwrap();
        db.insert_one("raw", &json!({ "home": "PSV" })).unwrap();

        let err = load_records::<Fixture>(&db, "raw").unwrap_err();
        assert!(err.to_string().contains("document 1 of raw"), "{err}");
    }

    #[test]
    fn file_database_persists_between_opens() {
        let path = std::env::temp_dir().join("goalcast_store_test.db");
        let _ = std::fs::remove_file(&path);
        let path_str = path.to_str().unwrap();

        {
            let db = Database::open(path_str).unwrap();
            db.insert_one("raw", &json!({ "n": 1 })).unwrap();
        }
        let db = Database::open(path_str).unwrap();
        assert_eq!(db.count("raw").unwrap(), 1);

        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}
