//! Result envelope and channel-callback adapters
//!
//! Each `*_async` method spawns its own tokio task, runs the matching
//! executor, and sends exactly one [`Callback`] into the given channel. The
//! send waits for capacity and never times out, so the channel needs at least
//! one free slot or an active receiver.
//!
//! # Example
//!
//! ```no_run
//! use docstore::{connect, Callback, Config, FindAll};
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> docstore::Result<()> {
//! let conn = connect(&Config::mongodb("localhost:27017", "app")).await?;
//! let (tx, mut rx) = mpsc::channel(1);
//!
//! conn.collection("users").find_all_async(FindAll::new(), tx);
//!
//! if let Some(callback) = rx.recv().await {
//!     let users = callback.into_result()?;
//!     println!("{} users", users.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::connection::CollectionHandle;
use crate::ops::{
    BulkInsert, BulkResult, ChangeInfo, Find, FindAll, FindById, Insert, Remove, RemoveAll,
    Update, UpdateAll, Upsert, UpsertAll,
};
use crate::{DocStoreError, Result};
use mongodb::bson::{Bson, Document};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Payload and error of one finished operation
#[derive(Debug)]
pub struct Callback<T> {
    /// Operation result, when it succeeded
    pub data: Option<T>,
    /// Failure, when it did not
    pub error: Option<DocStoreError>,
}

impl<T> Callback<T> {
    /// Envelope for a finished operation
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                data: Some(data),
                error: None,
            },
            Err(error) => Self {
                data: None,
                error: Some(error),
            },
        }
    }

    /// Whether the operation succeeded
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Back to a plain result
    pub fn into_result(self) -> Result<T> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err(DocStoreError::not_found("callback carried no result")),
        }
    }
}

impl<T> From<Result<T>> for Callback<T> {
    fn from(result: Result<T>) -> Self {
        Self::from_result(result)
    }
}

/// Sending half a callback is delivered through
pub type CallbackSender<T> = mpsc::Sender<Callback<T>>;

fn dispatch<T, F>(callback: CallbackSender<T>, operation: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(async move {
        let envelope = Callback::from_result(operation.await);
        if callback.send(envelope).await.is_err() {
            debug!("Callback receiver dropped before the result was delivered");
        }
    })
}

impl CollectionHandle {
    /// [`insert`](Self::insert) on its own task
    pub fn insert_async(&self, op: Insert, callback: CallbackSender<Bson>) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.insert(&op).await })
    }

    /// [`bulk_insert`](Self::bulk_insert) on its own task
    pub fn bulk_insert_async(
        &self,
        op: BulkInsert,
        callback: CallbackSender<BulkResult>,
    ) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.bulk_insert(&op).await })
    }

    /// [`update`](Self::update) on its own task
    pub fn update_async(&self, op: Update, callback: CallbackSender<ChangeInfo>) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.update(&op).await })
    }

    /// [`upsert`](Self::upsert) on its own task
    pub fn upsert_async(&self, op: Upsert, callback: CallbackSender<ChangeInfo>) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.upsert(&op).await })
    }

    /// [`update_all`](Self::update_all) on its own task
    pub fn update_all_async(
        &self,
        op: UpdateAll,
        callback: CallbackSender<ChangeInfo>,
    ) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.update_all(&op).await })
    }

    /// [`upsert_all`](Self::upsert_all) on its own task
    pub fn upsert_all_async(
        &self,
        op: UpsertAll,
        callback: CallbackSender<ChangeInfo>,
    ) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.upsert_all(&op).await })
    }

    /// [`find_by_id`](Self::find_by_id) on its own task
    pub fn find_by_id_async(
        &self,
        op: FindById,
        callback: CallbackSender<Option<Document>>,
    ) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.find_by_id(&op).await })
    }

    /// [`find`](Self::find) on its own task
    pub fn find_async(&self, op: Find, callback: CallbackSender<Vec<Document>>) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.find(&op).await })
    }

    /// [`find_all`](Self::find_all) on its own task
    pub fn find_all_async(
        &self,
        op: FindAll,
        callback: CallbackSender<Vec<Document>>,
    ) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.find_all(&op).await })
    }

    /// [`remove`](Self::remove) on its own task
    pub fn remove_async(&self, op: Remove, callback: CallbackSender<ChangeInfo>) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.remove(&op).await })
    }

    /// [`remove_all`](Self::remove_all) on its own task
    pub fn remove_all_async(
        &self,
        op: RemoveAll,
        callback: CallbackSender<ChangeInfo>,
    ) -> JoinHandle<()> {
        let handle = self.clone();
        dispatch(callback, async move { handle.remove_all(&op).await })
    }
}
