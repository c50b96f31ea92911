//! Connections, per-call collection handles and session accounting

use crate::{DocStoreError, Result};
use mongodb::{bson::Document, Client, Collection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Counters for session handles taken and given back by executors
#[derive(Debug, Default)]
pub struct SessionStats {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl SessionStats {
    /// Session handles acquired so far
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Session handles released so far
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Handles currently held by in-flight operations
    pub fn outstanding(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }
}

/// Per-call copy of the shared session
///
/// Mostly release accounting: operations run on the cached
/// [`Collection`] handle, not on this client clone, and the driver's
/// connection pool keeps concurrent operations apart. Released exactly
/// once, when dropped.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    client: Client,
    stats: Arc<SessionStats>,
}

impl SessionGuard {
    fn acquire(client: &Client, stats: &Arc<SessionStats>) -> Self {
        stats.acquired.fetch_add(1, Ordering::SeqCst);
        Self {
            client: client.clone(),
            stats: Arc::clone(stats),
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct ConnectionInner {
    database: String,
    client: Client,
    collections: RwLock<HashMap<String, Collection<Document>>>,
    closed: AtomicBool,
    stats: Arc<SessionStats>,
}

/// A live connection scoped to one database
///
/// Cheap to clone; clones share the session, the collection cache and the
/// closed state. Target collections are chosen per call through
/// [`Connection::collection`].
///
/// The cache gains one entry per distinct collection name used and only
/// shrinks through [`forget_collection`](Self::forget_collection) or
/// [`close`](Self::close).
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.inner.database)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Wrap an established client, bound to `database`
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                database: database.into(),
                client,
                collections: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
                stats: Arc::new(SessionStats::default()),
            }),
        }
    }

    /// Database this connection operates on
    pub fn database_name(&self) -> &str {
        &self.inner.database
    }

    /// Underlying driver client
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Handle targeting the collection `name`
    pub fn collection(&self, name: impl Into<String>) -> CollectionHandle {
        CollectionHandle {
            conn: self.clone(),
            name: name.into(),
        }
    }

    /// Session accounting shared by every handle of this connection
    pub fn session_stats(&self) -> &SessionStats {
        &self.inner.stats
    }

    /// Drop `name` from the collection cache
    ///
    /// Returns whether an entry was removed. Handles for `name` keep working
    /// and re-populate the cache on their next call.
    pub fn forget_collection(&self, name: &str) -> bool {
        let removed = self
            .inner
            .collections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some();
        if removed {
            debug!("Evicted collection {} from cache", name);
        }
        removed
    }

    /// Names of the collections currently cached
    pub fn cached_collections(&self) -> Vec<String> {
        let cache = self
            .inner
            .collections
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = cache.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the collections that exist in the database
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let session = self.acquire()?;
        let names = session
            .client()
            .database(&self.inner.database)
            .list_collection_names()
            .await?;
        Ok(names)
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Release the session
    ///
    /// Safe to call more than once; only the first call shuts the client down.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!("Connection to {} already closed", self.inner.database);
            return Ok(());
        }

        self.inner
            .collections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        self.inner.client.clone().shutdown().immediate(true).await;

        info!("Closed connection to {}", self.inner.database);
        Ok(())
    }

    fn acquire(&self) -> Result<SessionGuard> {
        if self.is_closed() {
            return Err(DocStoreError::Closed);
        }
        Ok(SessionGuard::acquire(&self.inner.client, &self.inner.stats))
    }

    fn resolve(&self, session: &SessionGuard, name: &str) -> Collection<Document> {
        if let Some(collection) = self
            .inner
            .collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return collection.clone();
        }

        let collection = session
            .client()
            .database(&self.inner.database)
            .collection::<Document>(name);

        self.inner
            .collections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_insert(collection)
            .clone()
    }
}

/// A connection paired with one target collection
///
/// All executors and async adapters are methods on this type, so the target
/// collection is part of each call rather than shared mutable state.
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    conn: Connection,
    name: String,
}

impl CollectionHandle {
    /// Target collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection this handle belongs to
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Acquire a session copy and resolve the target collection
    pub(crate) fn session(&self) -> Result<(SessionGuard, Collection<Document>)> {
        if self.name.trim().is_empty() {
            return Err(DocStoreError::config("collection name is required"));
        }
        let session = self.conn.acquire()?;
        let collection = self.conn.resolve(&session, &self.name);
        Ok((session, collection))
    }
}
