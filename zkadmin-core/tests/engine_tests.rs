use async_trait::async_trait;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use zkadmin_client::{
    ClientResult, ConnectionHandle, Connector, MemoryConnector, MemoryEnsemble, Session,
    StateReporter,
};
use zkadmin_core::{AdminError, ConnectionRegistry, TreeEngine};
use zkadmin_types::{AclPolicy, Alias, ConnState, CreateMode, NodeStat, PathNode};

const HOSTS: &str = "h1:2181";

struct Fixture {
    engine: TreeEngine,
    ensemble: MemoryEnsemble,
    alias: Alias,
}

async fn fixture_with_depth(max_copy_depth: usize) -> Fixture {
    let connector = Arc::new(MemoryConnector::strict());
    let ensemble = MemoryEnsemble::new();
    connector.register(HOSTS, ensemble.clone());
    fixture_on(connector, ensemble, max_copy_depth).await
}

async fn fixture_on(
    connector: Arc<dyn Connector>,
    ensemble: MemoryEnsemble,
    max_copy_depth: usize,
) -> Fixture {
    let alias = Alias::parse("A").unwrap();
    let handle = ConnectionHandle::builder(alias.clone(), HOSTS, connector).build();
    handle.connect().unwrap();
    assert!(
        handle
            .wait_for_state(ConnState::Connected, Duration::from_secs(2))
            .await
    );

    let registry = Arc::new(ConnectionRegistry::new());
    registry.put(handle).await;
    Fixture {
        engine: TreeEngine::new(registry, max_copy_depth),
        ensemble,
        alias,
    }
}

async fn fixture() -> Fixture {
    fixture_with_depth(256).await
}

/// Session where another writer updates `contended` right before every delete.
struct ContendedSession {
    inner: Arc<dyn Session>,
    contended: String,
}

#[async_trait]
impl Session for ContendedSession {
    async fn children(&self, path: &str) -> ClientResult<Vec<String>> {
        self.inner.children(path).await
    }

    async fn exists(&self, path: &str) -> ClientResult<Option<NodeStat>> {
        self.inner.exists(path).await
    }

    async fn get_data(&self, path: &str) -> ClientResult<(Vec<u8>, NodeStat)> {
        self.inner.get_data(path).await
    }

    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: AclPolicy,
        mode: CreateMode,
    ) -> ClientResult<String> {
        self.inner.create(path, data, acl, mode).await
    }

    async fn set_data(&self, path: &str, data: &[u8], version: i32) -> ClientResult<NodeStat> {
        self.inner.set_data(path, data, version).await
    }

    async fn delete(&self, path: &str, version: i32) -> ClientResult<()> {
        self.inner.set_data(&self.contended, b"concurrent", -1).await?;
        self.inner.delete(path, version).await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

struct ContendedConnector {
    ensemble: MemoryEnsemble,
    contended: String,
}

#[async_trait]
impl Connector for ContendedConnector {
    fn backend_name(&self) -> &'static str {
        "contended"
    }

    async fn connect(&self, _hosts: &str, reporter: StateReporter) -> ClientResult<Arc<dyn Session>> {
        let inner = self.ensemble.open_session(reporter)?;
        Ok(Arc::new(ContendedSession {
            inner,
            contended: self.contended.clone(),
        }))
    }
}

async fn contended_fixture(contended: &str) -> Fixture {
    let ensemble = MemoryEnsemble::new();
    let connector = Arc::new(ContendedConnector {
        ensemble: ensemble.clone(),
        contended: contended.to_string(),
    });
    fixture_on(connector, ensemble, 256).await
}

fn names(nodes: &[PathNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.name.as_str()).collect()
}

fn data(ensemble: &MemoryEnsemble, path: &str) -> Option<String> {
    ensemble
        .read(path)
        .map(|(raw, _)| String::from_utf8(raw).unwrap())
}

/// Relative paths and payloads of `root` and everything below it, pre-order.
async fn snapshot(f: &Fixture, root: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut stack = vec![String::new()];
    while let Some(rel) = stack.pop() {
        let absolute = format!("{root}{rel}");
        let read = f.engine.get_path_data(&f.alias, &absolute).await.unwrap();
        out.push((rel.clone(), read.value));
        let children = f.engine.list_children_path(&f.alias, &absolute).await.unwrap();
        for child in children.iter().rev() {
            stack.push(format!("{rel}/{}", child.name));
        }
    }
    out
}

// ── Listing ─────────────────────────────────────────────────────

#[tokio::test]
async fn children_sorted_ignoring_case() {
    let f = fixture().await;
    for p in ["/b", "/A", "/c/x", "/a2", "/B1"] {
        f.ensemble.seed(p, b"").unwrap();
    }

    let nodes = f.engine.list_children_path(&f.alias, "/").await.unwrap();
    assert_eq!(names(&nodes), vec!["A", "a2", "b", "B1", "c"]);

    let c = nodes.iter().find(|n| n.name == "c").unwrap();
    assert_eq!(c.id, "/c");
    assert!(c.has_children);
    assert!(!c.open);
    assert!(nodes.iter().filter(|n| n.name != "c").all(|n| !n.has_children));
}

#[tokio::test]
async fn empty_path_wraps_root() {
    let f = fixture().await;
    f.ensemble.seed("/zk/conf", b"").unwrap();
    f.ensemble.seed("/app", b"").unwrap();

    let nodes = f.engine.list_children_path(&f.alias, "").await.unwrap();
    assert_eq!(nodes.len(), 1);
    let root = &nodes[0];
    assert_eq!((root.id.as_str(), root.name.as_str()), ("/", "/"));
    assert!(root.open && root.has_children);
    assert_eq!(names(&root.children), vec!["app", "zk"]);
    assert_eq!(root.children[1].id, "/zk");
    assert!(root.children[1].has_children);

    // An explicit root lists flat.
    let flat = f.engine.list_children_path(&f.alias, "/").await.unwrap();
    assert_eq!(flat, root.children);
}

#[tokio::test]
async fn nested_listing_uses_full_ids() {
    let f = fixture().await;
    f.ensemble.seed("/app/one", b"").unwrap();
    f.ensemble.seed("/app/Two/leaf", b"").unwrap();

    let nodes = f.engine.list_children_path(&f.alias, "/app").await.unwrap();
    assert_eq!(
        nodes,
        vec![
            PathNode::leaf("/app/one", "one", false),
            PathNode::leaf("/app/Two", "Two", true),
        ]
    );
    assert!(
        f.engine
            .list_children_path(&f.alias, "/app/one")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn listing_missing_path_is_not_found() {
    let f = fixture().await;
    assert_eq!(
        f.engine.list_children_path(&f.alias, "/nope").await,
        Err(AdminError::PathNotFound("/nope".into()))
    );
}

#[tokio::test]
async fn unknown_alias_has_no_connection() {
    let f = fixture().await;
    let other = Alias::parse("B").unwrap();
    let err = f.engine.list_children_path(&other, "/").await.unwrap_err();
    assert_eq!(err, AdminError::NoConnection(other));
    assert_eq!(err.code(), 10003);
}

#[tokio::test]
async fn malformed_path_rejected_before_lookup() {
    let f = fixture().await;
    let other = Alias::parse("B").unwrap();
    let err = f.engine.get_path_data(&other, "relative").await.unwrap_err();
    assert!(matches!(err, AdminError::Validation(_)));
}

// ── Create & read ───────────────────────────────────────────────

#[tokio::test]
async fn create_then_read() {
    let f = fixture().await;
    let id = f
        .engine
        .create_path(&f.alias, "/x", "v1", CreateMode::Persistent)
        .await
        .unwrap();
    assert_eq!(id, "/x");

    let read = f.engine.get_path_data(&f.alias, "/x").await.unwrap();
    assert_eq!(read.value, "v1");
    assert_eq!(read.version(), 0);
    assert_eq!(read.stat.data_length, 2);
}

#[tokio::test]
async fn sequential_create_returns_service_id() {
    let f = fixture().await;
    f.ensemble.seed("/queue", b"").unwrap();
    let id = f
        .engine
        .create_path(&f.alias, "/queue/item-", "", CreateMode::PersistentSequential)
        .await
        .unwrap();
    assert_eq!(id, "/queue/item-0000000000");
    assert!(f.ensemble.contains(&id));
    assert!(!f.ensemble.contains("/queue/item-"));
}

#[tokio::test]
async fn create_existing_is_conflict() {
    let f = fixture().await;
    f.ensemble.seed("/x", b"").unwrap();
    let err = f
        .engine
        .create_path(&f.alias, "/x", "", CreateMode::Persistent)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Conflict(_)));
}

// ── Update ──────────────────────────────────────────────────────

#[tokio::test]
async fn update_same_id_writes_in_place() {
    let f = fixture().await;
    f.ensemble.seed("/x", b"v1").unwrap();
    let creates = f.ensemble.create_count();

    let id = f
        .engine
        .update_path(&f.alias, "/x", "/x", "v2", 0, CreateMode::Persistent)
        .await
        .unwrap();
    assert_eq!(id, "/x");
    assert_eq!(f.ensemble.create_count(), creates);

    let (raw, stat) = f.ensemble.read("/x").unwrap();
    assert_eq!((raw.as_slice(), stat.version), (&b"v2"[..], 1));

    assert_eq!(
        f.engine
            .update_path(&f.alias, "/x", "/x", "v3", 0, CreateMode::Persistent)
            .await,
        Err(AdminError::VersionConflict {
            path: "/x".into(),
            expected: 0
        })
    );
    assert_eq!(data(&f.ensemble, "/x").unwrap(), "v2");
}

#[tokio::test]
async fn rename_creates_new_then_deletes_old() {
    let f = fixture().await;
    f.ensemble.seed("/old", b"payload").unwrap();

    let id = f
        .engine
        .update_path(&f.alias, "/new", "/old", "payload2", 0, CreateMode::Persistent)
        .await
        .unwrap();
    assert_eq!(id, "/new");
    assert!(!f.ensemble.contains("/old"));
    assert_eq!(data(&f.ensemble, "/new").unwrap(), "payload2");
}

#[tokio::test]
async fn rename_with_stale_version_keeps_both() {
    let f = fixture().await;
    f.ensemble.seed("/old", b"v").unwrap();

    let err = f
        .engine
        .update_path(&f.alias, "/new", "/old", "v", 7, CreateMode::Persistent)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::VersionConflict { .. }));
    assert!(f.ensemble.contains("/old"));
    assert!(f.ensemble.contains("/new"));
}

#[tokio::test]
async fn rename_with_children_is_rejected_before_create() {
    let f = fixture().await;
    f.ensemble.seed("/old/c", b"").unwrap();
    let creates = f.ensemble.create_count();

    let err = f
        .engine
        .update_path(&f.alias, "/new", "/old", "v", 0, CreateMode::Persistent)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Conflict(_)));
    assert!(!f.ensemble.contains("/new"));
    assert!(f.ensemble.contains("/old/c"));
    assert_eq!(f.ensemble.create_count(), creates);
}

#[tokio::test]
async fn rename_of_missing_node_creates_nothing() {
    let f = fixture().await;
    assert_eq!(
        f.engine
            .update_path(&f.alias, "/new", "/gone", "v", 0, CreateMode::Persistent)
            .await,
        Err(AdminError::PathNotFound("/gone".into()))
    );
    assert!(!f.ensemble.contains("/new"));
}

#[tokio::test]
async fn update_requires_explicit_version() {
    let f = fixture().await;
    f.ensemble.seed("/x", b"").unwrap();
    let err = f
        .engine
        .update_path(&f.alias, "/x", "/x", "v", -1, CreateMode::Persistent)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Validation(_)));
    assert_eq!(f.ensemble.read("/x").unwrap().1.version, 0);
}

// ── Delete ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_checks_version() {
    let f = fixture().await;
    f.ensemble.seed("/x", b"").unwrap();

    assert!(matches!(
        f.engine.delete_path(&f.alias, "/x", 3).await,
        Err(AdminError::VersionConflict { .. })
    ));
    assert!(f.ensemble.contains("/x"));

    f.engine.delete_path(&f.alias, "/x", 0).await.unwrap();
    assert!(!f.ensemble.contains("/x"));

    assert_eq!(
        f.engine.delete_path(&f.alias, "/x", 0).await,
        Err(AdminError::PathNotFound("/x".into()))
    );
}

#[tokio::test]
async fn delete_with_children_is_conflict() {
    let f = fixture().await;
    for p in ["/t/a/x", "/t/b"] {
        f.ensemble.seed(p, b"").unwrap();
    }

    let err = f.engine.delete_path(&f.alias, "/t", 0).await.unwrap_err();
    assert!(matches!(err, AdminError::Conflict(_)));
    assert_eq!(err.code(), 10009);
    for p in ["/t", "/t/a", "/t/a/x", "/t/b"] {
        assert!(f.ensemble.contains(p), "{p} was removed");
    }
}

#[tokio::test]
async fn stale_version_leaves_node_with_children_intact() {
    let f = fixture().await;
    f.ensemble.seed("/t/a", b"").unwrap();

    assert!(matches!(
        f.engine.delete_path(&f.alias, "/t", 1).await,
        Err(AdminError::VersionConflict { .. })
    ));
    assert!(f.ensemble.contains("/t/a"));
}

#[tokio::test]
async fn concurrent_write_before_delete_keeps_node() {
    let f = contended_fixture("/t").await;
    f.ensemble.seed("/t", b"v").unwrap();

    assert_eq!(
        f.engine.delete_path(&f.alias, "/t", 0).await,
        Err(AdminError::VersionConflict {
            path: "/t".into(),
            expected: 0
        })
    );
    assert_eq!(data(&f.ensemble, "/t").unwrap(), "concurrent");
}

#[tokio::test]
async fn concurrent_write_never_costs_children() {
    let f = contended_fixture("/t").await;
    f.ensemble.seed("/t/c", b"child").unwrap();

    assert!(f.engine.delete_path(&f.alias, "/t", 0).await.is_err());
    assert!(f.ensemble.contains("/t"));
    assert_eq!(data(&f.ensemble, "/t/c").unwrap(), "child");
}

#[tokio::test]
async fn delete_rejects_root_and_negative_versions() {
    let f = fixture().await;
    f.ensemble.seed("/x", b"").unwrap();

    assert!(matches!(
        f.engine.delete_path(&f.alias, "/", 0).await,
        Err(AdminError::Validation(_))
    ));
    assert!(matches!(
        f.engine.delete_path(&f.alias, "/x", -1).await,
        Err(AdminError::Validation(_))
    ));
    assert!(f.ensemble.contains("/x"));
}

// ── Copy & paste ────────────────────────────────────────────────

#[tokio::test]
async fn copy_under_destination_keeps_base_name() {
    let f = fixture().await;
    f.ensemble.seed("/src", b"root-data").unwrap();
    f.ensemble.seed("/src/c1", b"d1").unwrap();
    f.ensemble.seed("/dst", b"").unwrap();

    let created = f
        .engine
        .copy_paste_path(&f.alias, "/src", "/dst", None)
        .await
        .unwrap();
    assert_eq!(created, 2);
    assert_eq!(data(&f.ensemble, "/dst/src").unwrap(), "root-data");
    assert_eq!(data(&f.ensemble, "/dst/src/c1").unwrap(), "d1");
    assert!(f.ensemble.contains("/src/c1"));
}

#[tokio::test]
async fn copy_with_new_base_name() {
    let f = fixture().await;
    f.ensemble.seed("/src", b"root-data").unwrap();
    f.ensemble.seed("/src/c1", b"d1").unwrap();

    f.engine
        .copy_paste_path(&f.alias, "/src", "/", Some("dst"))
        .await
        .unwrap();
    assert_eq!(data(&f.ensemble, "/dst").unwrap(), "root-data");
    assert_eq!(data(&f.ensemble, "/dst/c1").unwrap(), "d1");
}

#[tokio::test]
async fn trailing_separator_on_destination_is_ignored() {
    let f = fixture().await;
    f.ensemble.seed("/src", b"").unwrap();
    f.ensemble.seed("/dst", b"").unwrap();

    f.engine
        .copy_paste_path(&f.alias, "/src", "/dst/", None)
        .await
        .unwrap();
    assert!(f.ensemble.contains("/dst/src"));
}

#[tokio::test]
async fn copy_creates_one_node_per_source_node_in_pre_order() {
    let f = fixture().await;
    for (p, d) in [
        ("/s", "0"),
        ("/s/b", "1"),
        ("/s/b/x", "2"),
        ("/s/b/y", "3"),
        ("/s/a", "4"),
        ("/s/a/e", "5"),
        ("/s/c", "6"),
    ] {
        f.ensemble.seed(p, d.as_bytes()).unwrap();
    }
    let before = f.ensemble.create_count();

    let created = f
        .engine
        .copy_paste_path(&f.alias, "/s", "/", Some("d"))
        .await
        .unwrap();
    assert_eq!(created, 7);
    assert_eq!(f.ensemble.create_count() - before, 7);

    let source = snapshot(&f, "/s").await;
    assert_eq!(source.len(), 7);
    assert_eq!(snapshot(&f, "/d").await, source);

    // Creation order is visible through czxid.
    let order = ["/d", "/d/a", "/d/a/e", "/d/b", "/d/b/x", "/d/b/y", "/d/c"];
    let zxids: Vec<i64> = order
        .iter()
        .map(|p| f.ensemble.read(p).unwrap().1.czxid)
        .collect();
    let mut sorted = zxids.clone();
    sorted.sort();
    assert_eq!(zxids, sorted);
}

#[tokio::test]
async fn copying_root_is_rejected() {
    let f = fixture().await;
    let err = f
        .engine
        .copy_paste_path(&f.alias, "/", "/dst", Some("all"))
        .await
        .unwrap_err();
    assert_eq!(err, AdminError::RootCopy);
    assert_eq!(err.code(), 10007);
}

#[tokio::test]
async fn existing_destination_is_rejected_without_writes() {
    let f = fixture().await;
    f.ensemble.seed("/src/c1", b"").unwrap();
    f.ensemble.seed("/dst/src", b"").unwrap();
    let before = f.ensemble.create_count();

    let err = f
        .engine
        .copy_paste_path(&f.alias, "/src", "/dst", None)
        .await
        .unwrap_err();
    assert_eq!(err, AdminError::DestinationExists("/dst/src".into()));
    assert_eq!(err.code(), 10008);
    assert_eq!(f.ensemble.create_count(), before);
    assert!(!f.ensemble.contains("/dst/src/c1"));
}

#[tokio::test]
async fn pasting_inside_source_is_rejected() {
    let f = fixture().await;
    f.ensemble.seed("/src/inner", b"").unwrap();

    let err = f
        .engine
        .copy_paste_path(&f.alias, "/src", "/src/inner", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Conflict(_)));
    assert!(!f.ensemble.contains("/src/inner/src"));
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let f = fixture().await;
    assert_eq!(
        f.engine
            .copy_paste_path(&f.alias, "/ghost", "/", Some("copy"))
            .await,
        Err(AdminError::PathNotFound("/ghost".into()))
    );
    assert!(!f.ensemble.contains("/copy"));
}

#[tokio::test]
async fn copy_depth_is_capped() {
    let f = fixture_with_depth(2).await;
    f.ensemble.seed("/a/b/c/d", b"").unwrap();

    let err = f
        .engine
        .copy_paste_path(&f.alias, "/a", "/", Some("z"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::Validation(_)));
    // The walk is not transactional: levels within the cap were created.
    assert!(f.ensemble.contains("/z/b/c"));
    assert!(!f.ensemble.contains("/z/b/c/d"));
}

#[tokio::test]
async fn invalid_base_name_is_rejected() {
    let f = fixture().await;
    f.ensemble.seed("/src", b"").unwrap();
    assert!(matches!(
        f.engine
            .copy_paste_path(&f.alias, "/src", "/", Some("a/b"))
            .await,
        Err(AdminError::Validation(_))
    ));
}

// ── Properties ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn listing_is_sorted_and_complete(
        names in prop::collection::btree_set("[a-zA-Z][a-zA-Z0-9_]{0,6}", 0..12)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let listed = rt.block_on(async {
            let f = fixture().await;
            for name in &names {
                f.ensemble.seed(&format!("/{name}"), b"").unwrap();
            }
            f.engine.list_children_path(&f.alias, "/").await.unwrap()
        });

        let got: BTreeSet<String> = listed.iter().map(|n| n.name.clone()).collect();
        prop_assert_eq!(&got, &names);
        for pair in listed.windows(2) {
            prop_assert!(pair[0].name.to_lowercase() <= pair[1].name.to_lowercase());
        }
    }
}
