//! Multi-cluster administration core.
//!
//! # Architecture
//!
//! - **ConnectionRegistry**: one live [`ConnectionHandle`](zkadmin_client::ConnectionHandle)
//!   per alias; replacing or removing a handle closes it first
//! - **TreeEngine**: listing, create, update/rename, versioned delete and
//!   subtree copy on top of a handle
//! - **ConnStateObserver**: publishes every transition to a
//!   [`NotificationSink`] and queues it on a [`StateWriter`], which persists
//!   it to the [`RegistrationStore`] off the runtime
//! - **AdminService**: the operations a transport calls, with argument
//!   validation
//!
//! Registrations persist in memory or in SQLite ([`SqliteRegistrationStore`]).

mod config;
mod engine;
mod error;
mod notify;
mod observer;
mod registry;
mod service;
mod sqlite;
mod store;

pub use config::AdminConfig;
pub use engine::TreeEngine;
pub use error::{AdminError, AdminResult, ErrorKind};
pub use notify::{BroadcastSink, NotificationSink, RecordingSink, StateNotification};
pub use observer::{ConnStateObserver, StateWriter};
pub use registry::ConnectionRegistry;
pub use service::AdminService;
pub use sqlite::SqliteRegistrationStore;
pub use store::{MemoryRegistrationStore, RegistrationStore};
