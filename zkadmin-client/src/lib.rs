//! Client sessions and connection handles for coordination-service clusters.
//!
//! # Architecture
//!
//! - **Session**: the service primitives (children, exists, get/set data,
//!   create, delete) behind a trait, so any backend can be plugged in
//! - **Connector**: opens sessions and keeps a [`StateReporter`] to push later
//!   transitions (suspension, recovery, expiry)
//! - **ConnectionHandle**: owns one session for one alias, tracks its
//!   [`ConnState`](zkadmin_types::ConnState) and fans transitions out to
//!   [`StateObserver`]s attached at construction
//!
//! Two backends ship with the crate: [`MemoryConnector`], an in-process
//! ensemble with fault injection, and `ZkConnector` (feature `zookeeper`).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use zkadmin_client::{ConnectionHandle, MemoryConnector, RecordingObserver};
//! use zkadmin_types::{Alias, ConnState};
//!
//! # async fn demo() {
//! let observer = Arc::new(RecordingObserver::new());
//! let handle = ConnectionHandle::builder(
//!     Alias::parse("A").unwrap(),
//!     "h1:2181",
//!     Arc::new(MemoryConnector::new()),
//! )
//! .observer(observer.clone())
//! .build();
//!
//! handle.connect().unwrap();
//! assert!(handle.wait_for_state(ConnState::Connected, Duration::from_secs(1)).await);
//! # }
//! ```

mod error;
mod handle;
pub mod memory;
mod observer;
mod session;
#[cfg(feature = "zookeeper")]
pub mod zookeeper;

pub use error::{ClientError, ClientResult};
pub use handle::{ConnectionHandle, HandleBuilder, StateReporter};
pub use memory::{MemoryConnector, MemoryEnsemble};
pub use observer::{RecordingObserver, StateChange, StateObserver};
pub use session::{Connector, Session};

#[cfg(feature = "zookeeper")]
pub use zookeeper::ZkConnector;
