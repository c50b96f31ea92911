//! docstore: a thin CRUD facade over MongoDB
//!
//! Operations are described by small value types ([`Insert`], [`Find`],
//! [`UpsertAll`], ...) and executed against a [`CollectionHandle`], which
//! pairs a [`Connection`] with the target collection for that call. Every
//! operation also has a `*_async` twin that runs on its own tokio task and
//! reports through a one-shot [`Callback`] on an mpsc channel.
//!
//! # Example
//!
//! ```no_run
//! use docstore::{connect, Config, Find, FindOptions, Insert};
//! use mongodb::bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> docstore::Result<()> {
//!     let conn = connect(&Config::mongodb("localhost:27017", "app")).await?;
//!     let users = conn.collection("users");
//!
//!     users.insert(&Insert::new(doc! { "name": "Ada", "age": 36 })).await?;
//!     let page = users
//!         .find(&Find::new(doc! { "age": { "$gt": 30 } })
//!             .with_options(FindOptions::default().skip(10).limit(10)))
//!         .await?;
//!     println!("{} users", page.len());
//!
//!     conn.close().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export the driver so callers share one bson version
pub use mongodb;
pub use mongodb::bson;

pub mod callback;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
mod executor;
pub mod ops;

pub use callback::{Callback, CallbackSender};
pub use config::{Config, DEFAULT_DIAL_TIMEOUT_MS};
pub use connection::{CollectionHandle, Connection, SessionStats};
pub use driver::{connect, init, DatabaseType, Driver, MongoDriver};
pub use error::{normalize_not_found, DocStoreError, Result};
pub use ops::{
    decode, BulkFailure, BulkInsert, BulkResult, ChangeInfo, Find, FindAll, FindById,
    FindOptions, Insert, Remove, RemoveAll, Update, UpdateAll, Upsert, UpsertAll,
};
