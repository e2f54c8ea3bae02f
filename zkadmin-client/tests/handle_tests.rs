use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use zkadmin_client::{
    ClientError, ConnectionHandle, MemoryConnector, MemoryEnsemble, RecordingObserver,
    StateChange,
};
use zkadmin_types::{AclPolicy, Alias, ConnState, CreateMode};

const HOSTS: &str = "h1:2181";
const WAIT: Duration = Duration::from_secs(2);

fn alias(s: &str) -> Alias {
    Alias::parse(s).unwrap()
}

fn setup() -> (Arc<MemoryConnector>, MemoryEnsemble) {
    let connector = Arc::new(MemoryConnector::strict());
    let ensemble = MemoryEnsemble::new();
    connector.register(HOSTS, ensemble.clone());
    (connector, ensemble)
}

fn make_handle(connector: &Arc<MemoryConnector>, observer: &Arc<RecordingObserver>) -> ConnectionHandle {
    ConnectionHandle::builder(alias("A"), HOSTS, connector.clone())
        .observer(observer.clone())
        .build()
}

async fn connected_handle(
    connector: &Arc<MemoryConnector>,
    observer: &Arc<RecordingObserver>,
) -> ConnectionHandle {
    let handle = make_handle(connector, observer);
    handle.connect().unwrap();
    assert!(handle.wait_for_state(ConnState::Connected, WAIT).await);
    handle
}

// ── Lifecycle ───────────────────────────────────────────────────

#[tokio::test]
async fn new_handle_is_disconnected() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = make_handle(&connector, &observer);

    assert_eq!(handle.state(), ConnState::Disconnected);
    assert!(!handle.is_connected());
    assert_eq!(handle.alias().as_str(), "A");
    assert_eq!(handle.hosts(), HOSTS);
    assert!(observer.changes().is_empty());
}

#[tokio::test]
async fn connect_returns_before_session_is_established() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = make_handle(&connector, &observer);

    handle.connect().unwrap();
    assert_eq!(handle.state(), ConnState::Connecting);
    assert_eq!(observer.states(), vec![ConnState::Connecting]);

    assert!(handle.wait_for_state(ConnState::Connected, WAIT).await);
    assert!(handle.is_connected());
    assert_eq!(
        observer.states(),
        vec![ConnState::Connecting, ConnState::Connected]
    );
}

#[tokio::test]
async fn notifications_carry_alias_and_previous_state() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let _handle = connected_handle(&connector, &observer).await;

    let changes = observer.changes();
    assert_eq!(
        changes[1],
        StateChange {
            alias: alias("A"),
            hosts: HOSTS.to_string(),
            previous: ConnState::Connecting,
            current: ConnState::Connected,
        }
    );
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;
    assert_eq!(handle.connect(), Err(ClientError::AlreadyStarted));
}

#[tokio::test]
async fn unreachable_cluster_ends_lost() {
    let connector = Arc::new(MemoryConnector::strict());
    let observer = Arc::new(RecordingObserver::new());
    let handle = make_handle(&connector, &observer);

    handle.connect().unwrap();
    assert!(handle.wait_for_state(ConnState::Lost, WAIT).await);
    assert_eq!(observer.states(), vec![ConnState::Connecting, ConnState::Lost]);
    assert!(matches!(
        handle.list_children_path("/").await,
        Err(ClientError::SessionExpired)
    ));
}

#[tokio::test]
async fn unavailable_ensemble_ends_lost() {
    let (connector, ensemble) = setup();
    ensemble.set_available(false);
    let observer = Arc::new(RecordingObserver::new());
    let handle = make_handle(&connector, &observer);

    handle.connect().unwrap();
    assert!(handle.wait_for_state(ConnState::Lost, WAIT).await);
}

#[tokio::test]
async fn suspend_and_resume_are_observed_in_order() {
    let (connector, ensemble) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;

    ensemble.suspend();
    assert_eq!(handle.state(), ConnState::Suspended);
    assert!(matches!(
        handle.list_children_path("/").await,
        Err(ClientError::ConnectionLoss(_))
    ));

    ensemble.resume();
    assert!(handle.is_connected());
    assert!(handle.list_children_path("/").await.is_ok());

    assert_eq!(
        observer.states(),
        vec![
            ConnState::Connecting,
            ConnState::Connected,
            ConnState::Suspended,
            ConnState::Connected,
        ]
    );
}

#[tokio::test]
async fn expiry_is_terminal() {
    let (connector, ensemble) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;

    ensemble.expire_sessions();
    assert_eq!(handle.state(), ConnState::Lost);

    // A recovery report after expiry must not resurrect the handle.
    assert!(!handle.reporter().report(ConnState::Connected));
    assert_eq!(handle.state(), ConnState::Lost);
    assert!(matches!(
        handle.get_path_stat("/").await,
        Err(ClientError::SessionExpired)
    ));
    assert!(handle.connect().is_err());
}

#[tokio::test]
async fn duplicate_reports_raise_one_notification() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;

    let reporter = handle.reporter();
    assert!(!reporter.report(ConnState::Connected));
    assert!(reporter.report(ConnState::Suspended));
    assert!(!reporter.report(ConnState::Suspended));
    assert_eq!(observer.states().len(), 3);
}

#[tokio::test]
async fn close_releases_session_and_is_idempotent() {
    let (connector, ensemble) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;
    assert_eq!(ensemble.live_sessions(), 1);

    handle.close().await;
    assert_eq!(ensemble.live_sessions(), 0);
    assert_eq!(handle.state(), ConnState::Closed);

    handle.close().await;
    assert_eq!(
        observer.states(),
        vec![ConnState::Connecting, ConnState::Connected, ConnState::Closed]
    );
    assert_eq!(
        handle.check_path_exist("/").await,
        Err(ClientError::Closed)
    );
}

#[tokio::test]
async fn close_before_connect() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = make_handle(&connector, &observer);

    handle.close().await;
    assert_eq!(handle.state(), ConnState::Closed);
    assert_eq!(handle.connect(), Err(ClientError::Closed));
}

#[tokio::test]
async fn dropped_handle_ignores_late_reports() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;
    let reporter = handle.reporter();

    drop(handle);
    assert!(!reporter.report(ConnState::Suspended));
    assert_eq!(observer.states().len(), 2);
}

#[tokio::test]
async fn dropped_handle_releases_its_session() {
    let (connector, ensemble) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;
    ensemble.seed("/keep", b"").unwrap();
    handle
        .create_path("/owned", b"", AclPolicy::default(), CreateMode::Ephemeral)
        .await
        .unwrap();
    assert_eq!(ensemble.live_sessions(), 1);

    drop(handle);
    tokio::time::timeout(WAIT, async {
        while ensemble.live_sessions() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(!ensemble.contains("/owned"));
    assert!(ensemble.contains("/keep"));
    assert_eq!(observer.states().len(), 2);
}

#[tokio::test]
async fn observers_run_in_attachment_order() {
    let (connector, _) = setup();
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let first = {
        let log = log.clone();
        Arc::new(move |c: &StateChange| log.lock().unwrap().push(("first", c.current)))
    };
    let second = {
        let log = log.clone();
        Arc::new(move |c: &StateChange| log.lock().unwrap().push(("second", c.current)))
    };
    let handle = ConnectionHandle::builder(alias("A"), HOSTS, connector.clone())
        .observer(first)
        .observer(second)
        .build();

    handle.connect().unwrap();
    assert!(handle.wait_for_state(ConnState::Connected, WAIT).await);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("first", ConnState::Connecting),
            ("second", ConnState::Connecting),
            ("first", ConnState::Connected),
            ("second", ConnState::Connected),
        ]
    );
}

#[tokio::test]
async fn operations_before_connect_fail_with_connection_loss() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = make_handle(&connector, &observer);
    assert!(matches!(
        handle.list_children_path("/").await,
        Err(ClientError::ConnectionLoss(_))
    ));
}

// ── Path operations ─────────────────────────────────────────────

#[tokio::test]
async fn optimistic_write_scenario() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;

    let created = handle
        .create_path("/x", b"v1", AclPolicy::AnyoneAll, CreateMode::Persistent)
        .await
        .unwrap();
    assert_eq!(created, "/x");

    let (data, stat) = handle.get_path_data("/x").await.unwrap();
    assert_eq!((data.as_slice(), stat.version), (&b"v1"[..], 0));

    let stat = handle.set_path_data("/x", b"v2", 0).await.unwrap();
    assert_eq!(stat.version, 1);
    let (data, stat) = handle.get_path_data("/x").await.unwrap();
    assert_eq!((data.as_slice(), stat.version), (&b"v2"[..], 1));

    assert_eq!(
        handle.set_path_data("/x", b"v3", 0).await,
        Err(ClientError::BadVersion {
            path: "/x".into(),
            expected: 0
        })
    );
    let (data, _) = handle.get_path_data("/x").await.unwrap();
    assert_eq!(data, b"v2");
}

#[tokio::test]
async fn delete_checks_version() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;
    handle
        .create_path("/x", b"", AclPolicy::AnyoneAll, CreateMode::Persistent)
        .await
        .unwrap();
    handle.set_path_data("/x", b"y", 0).await.unwrap();

    assert!(matches!(
        handle.delete_path("/x", 0).await,
        Err(ClientError::BadVersion { .. })
    ));
    assert!(handle.check_path_exist("/x").await.unwrap());

    handle.delete_path("/x", 1).await.unwrap();
    assert!(!handle.check_path_exist("/x").await.unwrap());
    assert_eq!(
        handle.delete_path("/x", 1).await,
        Err(ClientError::NoNode("/x".into()))
    );
}

#[tokio::test]
async fn sequential_create_returns_assigned_path() {
    let (connector, _) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;

    let first = handle
        .create_path("/job-", b"", AclPolicy::AnyoneAll, CreateMode::PersistentSequential)
        .await
        .unwrap();
    let second = handle
        .create_path("/job-", b"", AclPolicy::AnyoneAll, CreateMode::PersistentSequential)
        .await
        .unwrap();

    assert_eq!(first, "/job-0000000000");
    assert_eq!(second, "/job-0000000001");
    assert!(handle.check_path_exist(&second).await.unwrap());
}

#[tokio::test]
async fn stat_reports_children() {
    let (connector, ensemble) = setup();
    ensemble.seed("/a/b", b"").unwrap();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;

    assert_eq!(handle.get_path_stat("/a").await.unwrap().num_children, 1);
    assert_eq!(handle.get_path_stat("/a/b").await.unwrap().num_children, 0);
    assert_eq!(
        handle.get_path_stat("/nope").await,
        Err(ClientError::NoNode("/nope".into()))
    );
    assert_eq!(handle.list_children_path("/a").await.unwrap(), vec!["b"]);
    assert!(handle.list_children_path("/a/b").await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_paths_never_reach_the_session() {
    let (connector, ensemble) = setup();
    let observer = Arc::new(RecordingObserver::new());
    let handle = connected_handle(&connector, &observer).await;

    let err = handle
        .create_path("x", b"", AclPolicy::AnyoneAll, CreateMode::Persistent)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidPath(_)));
    assert_eq!(ensemble.create_count(), 0);
}
