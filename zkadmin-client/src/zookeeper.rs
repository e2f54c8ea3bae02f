//! ZooKeeper backend built on `zookeeper-client`.

use crate::error::{ClientError, ClientResult};
use crate::handle::StateReporter;
use crate::session::{Connector, Session};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use zkadmin_types::{AclPolicy, ConnState, CreateMode, NodeStat};
use zookeeper_client as zk;

/// Opens sessions against real ZooKeeper ensembles.
#[derive(Debug, Clone)]
pub struct ZkConnector {
    session_timeout: Duration,
    connection_timeout: Duration,
}

impl ZkConnector {
    pub fn new(session_timeout: Duration, connection_timeout: Duration) -> Self {
        Self {
            session_timeout,
            connection_timeout,
        }
    }
}

#[async_trait]
impl Connector for ZkConnector {
    fn backend_name(&self) -> &'static str {
        "zookeeper"
    }

    async fn connect(
        &self,
        hosts: &str,
        reporter: StateReporter,
    ) -> ClientResult<Arc<dyn Session>> {
        let mut connector = zk::Client::connector();
        connector.session_timeout(self.session_timeout);
        connector.connection_timeout(self.connection_timeout);
        let client = connector
            .connect(hosts)
            .await
            .map_err(|e| map_error(hosts, None, e))?;

        let mut watcher = client.state_watcher();
        let watch_task = tokio::spawn(async move {
            loop {
                let state = watcher.changed().await;
                debug!("zookeeper session state: {:?}", state);
                if let Some(mapped) = map_state(state) {
                    reporter.report(mapped);
                    if mapped.is_terminal() {
                        break;
                    }
                }
            }
        });

        Ok(Arc::new(ZkSession {
            client: Mutex::new(Some(client)),
            watch_task: Mutex::new(Some(watch_task)),
        }))
    }
}

fn map_state(state: zk::SessionState) -> Option<ConnState> {
    match state {
        zk::SessionState::SyncConnected | zk::SessionState::ConnectedReadOnly => {
            Some(ConnState::Connected)
        }
        zk::SessionState::Disconnected => Some(ConnState::Suspended),
        zk::SessionState::Expired | zk::SessionState::AuthFailed => Some(ConnState::Lost),
        zk::SessionState::Closed => Some(ConnState::Closed),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn map_error(path: &str, version: Option<i32>, err: zk::Error) -> ClientError {
    match err {
        zk::Error::NoNode => ClientError::NoNode(path.to_string()),
        zk::Error::NodeExists => ClientError::NodeExists(path.to_string()),
        zk::Error::BadVersion => ClientError::BadVersion {
            path: path.to_string(),
            expected: version.unwrap_or(-1),
        },
        zk::Error::NotEmpty => ClientError::NotEmpty(path.to_string()),
        zk::Error::NoChildrenForEphemerals => {
            ClientError::NoChildrenForEphemerals(path.to_string())
        }
        zk::Error::ConnectionLoss => ClientError::ConnectionLoss(path.to_string()),
        zk::Error::SessionExpired => ClientError::SessionExpired,
        zk::Error::ClientClosed => ClientError::Closed,
        other => ClientError::Other(other.to_string()),
    }
}

fn map_stat(stat: &zk::Stat) -> NodeStat {
    NodeStat {
        czxid: stat.czxid,
        mzxid: stat.mzxid,
        pzxid: stat.pzxid,
        ctime: stat.ctime,
        mtime: stat.mtime,
        version: stat.version,
        cversion: stat.cversion,
        aversion: stat.aversion,
        ephemeral_owner: stat.ephemeral_owner,
        data_length: stat.data_length,
        num_children: stat.num_children,
    }
}

fn expected(version: i32) -> Option<i32> {
    (version != -1).then_some(version)
}

struct ZkSession {
    client: Mutex<Option<zk::Client>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl ZkSession {
    fn client(&self) -> ClientResult<zk::Client> {
        self.client
            .lock()
            .unwrap()
            .as_ref()
            .cloned()
            .ok_or(ClientError::Closed)
    }
}

#[async_trait]
impl Session for ZkSession {
    async fn children(&self, path: &str) -> ClientResult<Vec<String>> {
        let client = self.client()?;
        client
            .list_children(path)
            .await
            .map_err(|e| map_error(path, None, e))
    }

    async fn exists(&self, path: &str) -> ClientResult<Option<NodeStat>> {
        let client = self.client()?;
        let stat = client
            .check_stat(path)
            .await
            .map_err(|e| map_error(path, None, e))?;
        Ok(stat.as_ref().map(map_stat))
    }

    async fn get_data(&self, path: &str) -> ClientResult<(Vec<u8>, NodeStat)> {
        let client = self.client()?;
        let (data, stat) = client
            .get_data(path)
            .await
            .map_err(|e| map_error(path, None, e))?;
        Ok((data, map_stat(&stat)))
    }

    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: AclPolicy,
        mode: CreateMode,
    ) -> ClientResult<String> {
        let client = self.client()?;
        let acls = match acl {
            AclPolicy::AnyoneAll => zk::Acls::anyone_all(),
            AclPolicy::CreatorAll => zk::Acls::creator_all(),
            AclPolicy::AnyoneRead => zk::Acls::anyone_read(),
        };
        let zk_mode = match mode {
            CreateMode::Persistent => zk::CreateMode::Persistent,
            CreateMode::Ephemeral => zk::CreateMode::Ephemeral,
            CreateMode::PersistentSequential => zk::CreateMode::PersistentSequential,
            CreateMode::EphemeralSequential => zk::CreateMode::EphemeralSequential,
            CreateMode::Container => zk::CreateMode::Container,
        };
        let options = zk_mode.with_acls(acls);
        let (_, sequence) = client
            .create(path, data, &options)
            .await
            .map_err(|e| map_error(path, None, e))?;
        if mode.is_sequential() {
            Ok(format!("{path}{sequence}"))
        } else {
            Ok(path.to_string())
        }
    }

    async fn set_data(&self, path: &str, data: &[u8], version: i32) -> ClientResult<NodeStat> {
        let client = self.client()?;
        let stat = client
            .set_data(path, data, expected(version))
            .await
            .map_err(|e| map_error(path, Some(version), e))?;
        Ok(map_stat(&stat))
    }

    async fn delete(&self, path: &str, version: i32) -> ClientResult<()> {
        let client = self.client()?;
        client
            .delete(path, expected(version))
            .await
            .map_err(|e| map_error(path, Some(version), e))
    }

    async fn close(&self) {
        let client = self.client.lock().unwrap().take();
        drop(client);
        if let Some(task) = self.watch_task.lock().unwrap().take() {
            task.abort();
        }
    }
}
