//! The operations exposed to transports.
//!
//! [`AdminService`] takes raw, possibly missing arguments the way a transport
//! receives them, rejects missing ones with [`AdminError::Validation`], and
//! then drives the registry, the store and the tree engine.

use crate::config::AdminConfig;
use crate::engine::TreeEngine;
use crate::error::{AdminError, AdminResult};
use crate::notify::NotificationSink;
use crate::observer::{ConnStateObserver, StateWriter};
use crate::registry::ConnectionRegistry;
use crate::store::RegistrationStore;
use std::sync::Arc;
use tracing::{info, warn};
use zkadmin_client::{ConnectionHandle, Connector};
use zkadmin_types::{Alias, ClusterRegistration, ConnState, CreateMode, PathData, PathNode};

/// Control plane over every registered cluster.
pub struct AdminService {
    config: AdminConfig,
    connector: Arc<dyn Connector>,
    store: Arc<dyn RegistrationStore>,
    sink: Arc<dyn NotificationSink>,
    writer: StateWriter,
    registry: Arc<ConnectionRegistry>,
    engine: TreeEngine,
}

impl AdminService {
    /// Must be called from within a Tokio runtime: the state writer task is
    /// spawned here.
    pub fn new(
        config: AdminConfig,
        connector: Arc<dyn Connector>,
        store: Arc<dyn RegistrationStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = TreeEngine::new(Arc::clone(&registry), config.max_copy_depth);
        let writer = StateWriter::spawn(Arc::clone(&store));
        Self {
            config,
            connector,
            store,
            sink,
            writer,
            registry,
            engine,
        }
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &TreeEngine {
        &self.engine
    }

    /// Name of the backend sessions are opened with.
    pub fn backend_name(&self) -> &'static str {
        self.connector.backend_name()
    }

    fn build_handle(&self, registration: &ClusterRegistration) -> ConnectionHandle {
        let observer = ConnStateObserver::new(self.writer.clone(), Arc::clone(&self.sink));
        ConnectionHandle::builder(
            registration.alias.clone(),
            registration.hosts.clone(),
            Arc::clone(&self.connector),
        )
        .observer(Arc::new(observer))
        .build()
    }

    /// Runs a store call on the blocking pool.
    async fn with_store<T, F>(&self, call: F) -> AdminResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RegistrationStore) -> AdminResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || call(store.as_ref()))
            .await
            .map_err(|e| AdminError::Storage(format!("store task failed: {e}")))?
    }

    /// Waits until every observed state change has reached the store.
    pub async fn flush_state_writes(&self) {
        self.writer.flush().await;
    }

    /// Installs a fresh handle for `registration` and starts connecting it.
    async fn install(&self, registration: &ClusterRegistration) -> AdminResult<()> {
        let handle = self.build_handle(registration);
        self.registry.put(handle.clone()).await;
        handle.connect()?;
        Ok(())
    }

    // ── Registrations ────────────────────────────────────────────

    /// Every stored registration, ordered by alias, including every state
    /// change observed before the call.
    pub async fn list_all(&self) -> AdminResult<Vec<ClusterRegistration>> {
        self.writer.flush().await;
        self.with_store(|store| store.list_all()).await
    }

    /// Registers (or re-registers) a cluster and connects to it.
    ///
    /// An existing handle for the alias is closed before the new one starts.
    pub async fn save_zk_info(
        &self,
        alias: Option<&str>,
        hosts: Option<&str>,
    ) -> AdminResult<ClusterRegistration> {
        let alias = require_alias(alias)?;
        let hosts = require(hosts, "hosts")?;

        let registration = ClusterRegistration::new(alias, hosts);
        let record = registration.clone();
        self.with_store(move |store| store.save(&record)).await?;
        self.install(&registration).await?;
        info!(alias = %registration.alias, hosts = %registration.hosts, "cluster registered");
        Ok(registration)
    }

    /// Records `state` for the alias. Returns whether a registration matched.
    pub async fn update_conn_state_by_alias(
        &self,
        alias: Option<&str>,
        state: ConnState,
    ) -> AdminResult<bool> {
        let alias = require_alias(alias)?;
        self.with_store(move |store| store.update_conn_state_by_alias(&alias, state))
            .await
    }

    /// Records `state` for every registration with these hosts.
    pub async fn update_conn_state_by_hosts(
        &self,
        hosts: Option<&str>,
        state: ConnState,
    ) -> AdminResult<usize> {
        let hosts = require(hosts, "hosts")?.to_string();
        self.with_store(move |store| store.update_conn_state_by_hosts(&hosts, state))
            .await
    }

    /// Closes the alias's handle and forgets its registration.
    pub async fn delete_zk_info_by_alias(&self, alias: Option<&str>) -> AdminResult<bool> {
        let alias = require_alias(alias)?;
        let closed = self.registry.remove(&alias).await;
        let target = alias.clone();
        let deleted = self
            .with_store(move |store| store.delete_by_alias(&target))
            .await?;
        info!(alias = %alias, closed, deleted, "cluster unregistered");
        Ok(closed || deleted)
    }

    /// Replaces the alias's handle with a fresh one.
    ///
    /// Rejected while the current handle is connected.
    pub async fn reconnect_zk(&self, alias: Option<&str>) -> AdminResult<()> {
        let alias = require_alias(alias)?;
        if let Some(current) = self.registry.get(&alias).await {
            if current.is_connected() {
                return Err(AdminError::AlreadyConnected(alias));
            }
        }
        let target = alias.clone();
        let registration = self
            .with_store(move |store| store.find_by_alias(&target))
            .await?
            .ok_or_else(|| AdminError::NoConnection(alias.clone()))?;

        self.install(&registration).await?;
        info!(alias = %alias, "reconnecting");
        Ok(())
    }

    /// Connects every stored registration. Returns how many were started.
    pub async fn restore_all(&self) -> AdminResult<usize> {
        let registrations = self.with_store(|store| store.list_all()).await?;
        let mut started = 0;
        for registration in &registrations {
            match self.install(registration).await {
                Ok(()) => started += 1,
                Err(e) => warn!(alias = %registration.alias, "failed to restore connection: {}", e),
            }
        }
        info!("restored {} of {} registered clusters", started, registrations.len());
        Ok(started)
    }

    /// Closes every handle.
    pub async fn shutdown(&self) {
        let closed = self.registry.close_all().await;
        self.writer.flush().await;
        info!("admin service stopped ({} connections closed)", closed);
    }

    // ── Tree operations ──────────────────────────────────────────

    /// Lists one level below `path_id`; a missing or empty `path_id` lists the
    /// root wrapped in a synthetic expanded root node.
    pub async fn list_zk_children_path(
        &self,
        alias: Option<&str>,
        path_id: Option<&str>,
    ) -> AdminResult<Vec<PathNode>> {
        let alias = require_alias(alias)?;
        self.engine
            .list_children_path(&alias, path_id.unwrap_or_default())
            .await
    }

    /// Deletes the childless node `path_id`. The version is mandatory.
    pub async fn delete_path(
        &self,
        alias: Option<&str>,
        path_id: Option<&str>,
        version: Option<i32>,
    ) -> AdminResult<()> {
        let alias = require_alias(alias)?;
        let path_id = require(path_id, "pathId")?;
        let version = version.ok_or_else(|| AdminError::missing("version"))?;
        self.engine.delete_path(&alias, path_id, version).await?;
        info!(alias = %alias, path = path_id, "path deleted");
        Ok(())
    }

    /// Creates a node. `mode` is the numeric create-mode flag, persistent
    /// when absent.
    pub async fn create_path(
        &self,
        alias: Option<&str>,
        path_id: Option<&str>,
        data: Option<&str>,
        mode: Option<i32>,
    ) -> AdminResult<String> {
        let alias = require_alias(alias)?;
        let path_id = require(path_id, "pathId")?;
        let mode = create_mode(mode)?;
        self.engine
            .create_path(&alias, path_id, data.unwrap_or_default(), mode)
            .await
    }

    /// Updates data in place, or renames when the ids differ.
    pub async fn update_path(
        &self,
        alias: Option<&str>,
        new_id: Option<&str>,
        old_id: Option<&str>,
        data: Option<&str>,
        version: Option<i32>,
        mode: Option<i32>,
    ) -> AdminResult<String> {
        let alias = require_alias(alias)?;
        let new_id = require(new_id, "newId")?;
        let old_id = require(old_id, "oldId")?;
        let version = version.ok_or_else(|| AdminError::missing("version"))?;
        let mode = create_mode(mode)?;
        self.engine
            .update_path(&alias, new_id, old_id, data.unwrap_or_default(), version, mode)
            .await
    }

    pub async fn get_path_data(
        &self,
        alias: Option<&str>,
        path_id: Option<&str>,
    ) -> AdminResult<PathData> {
        let alias = require_alias(alias)?;
        let path_id = require(path_id, "pathId")?;
        self.engine.get_path_data(&alias, path_id).await
    }

    /// Copies `copy` under `paste`. Returns the number of nodes created.
    pub async fn copy_paste_path(
        &self,
        alias: Option<&str>,
        copy: Option<&str>,
        paste: Option<&str>,
        new_base_name: Option<&str>,
    ) -> AdminResult<usize> {
        let alias = require_alias(alias)?;
        let copy = require(copy, "copy")?;
        let paste = require(paste, "paste")?;
        self.engine
            .copy_paste_path(&alias, copy, paste, new_base_name)
            .await
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> AdminResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AdminError::missing(name))
}

fn require_alias(value: Option<&str>) -> AdminResult<Alias> {
    Ok(Alias::parse(require(value, "alias")?)?)
}

fn create_mode(flag: Option<i32>) -> AdminResult<CreateMode> {
    Ok(flag.map(CreateMode::from_flag).transpose()?.unwrap_or_default())
}
