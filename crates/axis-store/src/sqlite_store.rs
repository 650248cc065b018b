//! SQLite-backed event store for logged reps

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axis_bus::BusPublisher;
use axis_schema::{BusMessage, Event, NewEvent};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::query::{format_ts, WindowQuery};

const EVENT_COLUMNS: &str = "id, created_at, outcome, tags, constraint_labels, subject_id, \
                             subject_name, actor, session, note";

pub struct EventStore {
    conn: Arc<Mutex<Connection>>,
    publisher: Option<BusPublisher>,
}

impl EventStore {
    /// Open or create the database at the given path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store dir: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open event store: {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        run_migrations(&conn)?;
        tracing::debug!(path = %db_path.display(), "event store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            publisher: None,
        })
    }

    /// Push every insert and undo onto the bus.
    pub fn with_publisher(mut self, publisher: BusPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn insert(&self, draft: NewEvent) -> Result<Event> {
        self.insert_at(draft, Utc::now()).await
    }

    /// Insert with an explicit timestamp, for imports and tests.
    pub async fn insert_at(&self, draft: NewEvent, created_at: DateTime<Utc>) -> Result<Event> {
        // stored with millisecond precision; keep the returned row identical
        let mut event = draft.into_event(0, created_at.trunc_subsecs(3));
        {
            let conn = self.conn.lock().await;
            conn.execute(
                r#"INSERT INTO events
                   (created_at, outcome, tags, constraint_labels, subject_id,
                    subject_name, actor, session, note)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                params![
                    format_ts(&event.created_at),
                    event.outcome,
                    serde_json::to_string(&event.tags)?,
                    serde_json::to_string(&event.constraint_labels)?,
                    event.subject,
                    event.subject_name,
                    event.actor.as_str(),
                    event.session.as_str(),
                    event.note,
                ],
            )
            .context("failed to insert event")?;
            event.id = conn.last_insert_rowid();
        }

        tracing::info!(
            id = event.id,
            outcome = event.outcome.as_deref().unwrap_or("-"),
            subject = event.subject.as_deref().unwrap_or("-"),
            "event logged"
        );
        self.publish(BusMessage::EventLogged {
            event: event.clone(),
        })
        .await;
        Ok(event)
    }

    /// Delete the newest row (optionally the newest for one subject) and
    /// return it. `None` when there is nothing to undo.
    pub async fn undo_last(&self, subject: Option<&str>) -> Result<Option<Event>> {
        let removed = {
            let conn = self.conn.lock().await;
            let mut query = WindowQuery::last(1);
            query.subject = subject.map(str::to_string);
            let Some(event) = select_events(&conn, &query)?.into_iter().next() else {
                return Ok(None);
            };
            conn.execute("DELETE FROM events WHERE id = ?1", [event.id])?;
            event
        };

        tracing::info!(id = removed.id, "event undone");
        self.publish(BusMessage::EventRemoved {
            id: Some(removed.id),
            subject: removed.subject.clone(),
        })
        .await;
        Ok(Some(removed))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get(&self, id: i64) -> Result<Option<Event>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        let event = conn
            .query_row(&sql, [id], row_to_event)
            .optional()
            .with_context(|| format!("failed to load event {id}"))?;
        Ok(event)
    }

    /// Rows with an id above `id` in insertion order, plus the total row
    /// count, read from one snapshot.
    pub async fn changes_since(&self, id: i64) -> Result<(Vec<Event>, usize)> {
        let conn = self.conn.lock().await;
        let tx = conn.unchecked_transaction()?;
        let newer = {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id > ?1 ORDER BY id ASC");
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map([id], row_to_event)?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row.context("failed to decode event row")?);
            }
            events
        };
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        tx.commit()?;
        Ok((newer, count as usize))
    }

    /// Matching rows, newest first.
    pub async fn recent(&self, query: &WindowQuery) -> Result<Vec<Event>> {
        let conn = self.conn.lock().await;
        select_events(&conn, query)
    }

    /// Matching rows, oldest first, ready to hand to the engine.
    pub async fn window(&self, query: &WindowQuery) -> Result<Vec<Event>> {
        let mut events = self.recent(query).await?;
        events.reverse();
        Ok(events)
    }

    pub async fn latest(&self, subject: Option<&str>) -> Result<Option<Event>> {
        let mut query = WindowQuery::last(1);
        query.subject = subject.map(str::to_string);
        Ok(self.recent(&query).await?.into_iter().next())
    }

    /// Highest row id, used by pollers to notice writes from other processes.
    pub async fn latest_id(&self) -> Result<Option<i64>> {
        let conn = self.conn.lock().await;
        let id = conn.query_row("SELECT MAX(id) FROM events", [], |row| {
            row.get::<_, Option<i64>>(0)
        })?;
        Ok(id)
    }

    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    async fn publish(&self, msg: BusMessage) {
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(msg).await {
                tracing::warn!("failed to publish store change: {e}");
            }
        }
    }
}

fn select_events(conn: &Connection, query: &WindowQuery) -> Result<Vec<Event>> {
    let (tail, values) = query.to_sql();
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events{tail}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_event)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row.context("failed to decode event row")?);
    }
    Ok(events)
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let created_at: String = row.get(1)?;
    let tags: String = row.get(3)?;
    let constraint_labels: String = row.get(4)?;
    let actor: String = row.get(7)?;
    let session: String = row.get(8)?;

    Ok(Event {
        id: row.get(0)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| conversion_error(1, e.into()))?
            .with_timezone(&Utc),
        outcome: row.get(2)?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_error(3, e.into()))?,
        constraint_labels: serde_json::from_str(&constraint_labels)
            .map_err(|e| conversion_error(4, e.into()))?,
        subject: row.get(5)?,
        subject_name: row.get(6)?,
        actor: actor.parse().map_err(|e: String| conversion_error(7, e.into()))?,
        session: session
            .parse()
            .map_err(|e: String| conversion_error(8, e.into()))?,
        note: row.get(9)?,
    })
}

fn conversion_error(
    column: usize,
    err: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, err)
}

// ─────────────────────────────────────────────────────────────────────────────
// Migrations
// ─────────────────────────────────────────────────────────────────────────────

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"CREATE TABLE IF NOT EXISTS __axis_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"#,
    )?;

    let applied: std::collections::HashSet<i64> = {
        let mut stmt = conn.prepare("SELECT version FROM __axis_schema_version")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        rows.filter_map(|r| r.ok()).collect()
    };

    let migrations: Vec<(i64, &str)> = vec![
        (
            1,
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                outcome TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                subject_id TEXT,
                subject_name TEXT,
                actor TEXT NOT NULL,
                session TEXT NOT NULL,
                note TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_events_subject ON events(subject_id, created_at DESC);
            "#,
        ),
        (
            2,
            r#"
            ALTER TABLE events ADD COLUMN constraint_labels TEXT NOT NULL DEFAULT '[]';
            "#,
        ),
    ];

    for (version, sql) in migrations {
        if applied.contains(&version) {
            continue;
        }
        conn.execute_batch(sql)
            .with_context(|| format!("event store migration {version} failed"))?;
        conn.execute(
            "INSERT INTO __axis_schema_version(version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axis_schema::{Actor, SessionKind};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_event_crud() {
        let tmp = TempDir::new().unwrap();
        let store = EventStore::open(&tmp.path().join("axis.db")).unwrap();

        let draft = NewEvent::new(Actor::Coach, SessionKind::Practice)
            .outcome("PANIC")
            .tags(["pressure", "pressure", "trap"])
            .constraints(["HOLD"])
            .subject("cole", Some("Cole".into()))
            .note("lost it on the sideline trap");

        // Insert
        let saved = store.insert(draft).await.unwrap();
        assert!(saved.id > 0);
        assert_eq!(saved.tags, vec!["pressure", "trap"]);

        // Get
        let loaded = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);

        // Undo
        let undone = store.undo_last(None).await.unwrap().unwrap();
        assert_eq!(undone.id, saved.id);
        assert!(store.get(saved.id).await.unwrap().is_none());
        assert!(store.undo_last(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reopening_keeps_rows_and_skips_applied_migrations() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/axis.db");
        {
            let store = EventStore::open(&path).unwrap();
            store
                .insert(NewEvent::new(Actor::Parent, SessionKind::Game).outcome("GOOD"))
                .await
                .unwrap();
        }
        let store = EventStore::open(&path).unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.latest_id().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn changes_since_returns_newer_rows_and_total() {
        let tmp = TempDir::new().unwrap();
        let store = EventStore::open(&tmp.path().join("axis.db")).unwrap();
        for outcome in ["GOOD", "MISS", "PANIC"] {
            store
                .insert(NewEvent::new(Actor::Parent, SessionKind::Game).outcome(outcome))
                .await
                .unwrap();
        }

        let (newer, total) = store.changes_since(1).await.unwrap();
        let outcomes: Vec<_> = newer.iter().filter_map(|e| e.outcome.as_deref()).collect();
        assert_eq!(outcomes, vec!["MISS", "PANIC"]);
        assert_eq!(total, 3);

        let (newer, total) = store.changes_since(3).await.unwrap();
        assert!(newer.is_empty());
        assert_eq!(total, 3);
    }
}
