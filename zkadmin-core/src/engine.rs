//! Tree-shaped administrative operations.
//!
//! [`TreeEngine`] resolves an alias to its handle and turns listing, create,
//! update, delete and copy requests into the service's path primitives. It
//! adds no locking of its own: node versions are the concurrency backstop, and
//! multi-step operations (rename, copy) are not transactional.
//!
//! Arguments are validated before the alias is looked up.

use crate::error::{AdminError, AdminResult};
use crate::registry::ConnectionRegistry;
use std::sync::Arc;
use tracing::{debug, info};
use zkadmin_client::{ClientError, ConnectionHandle};
use zkadmin_types::{path, AclPolicy, Alias, CreateMode, PathData, PathNode};

/// Runs tree operations against the handles held by a registry.
#[derive(Clone)]
pub struct TreeEngine {
    registry: Arc<ConnectionRegistry>,
    max_copy_depth: usize,
}

impl TreeEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, max_copy_depth: usize) -> Self {
        Self {
            registry,
            max_copy_depth,
        }
    }

    async fn handle(&self, alias: &Alias) -> AdminResult<ConnectionHandle> {
        self.registry
            .get(alias)
            .await
            .ok_or_else(|| AdminError::NoConnection(alias.clone()))
    }

    /// Lists the children of `path_id`, one level deep, sorted by name
    /// ignoring case.
    ///
    /// An empty `path_id` lists the root and wraps the result in a single
    /// expanded root node.
    pub async fn list_children_path(&self, alias: &Alias, path_id: &str) -> AdminResult<Vec<PathNode>> {
        let root_listing = path_id.trim().is_empty();
        let parent = if root_listing { path::ROOT } else { path_id };
        path::validate(parent)?;

        let handle = self.handle(alias).await?;
        let names = handle.list_children_path(parent).await?;

        let mut nodes = Vec::with_capacity(names.len());
        for name in names {
            let id = path::join(parent, &name);
            match handle.get_path_stat(&id).await {
                Ok(stat) => nodes.push(PathNode::leaf(id, name, stat.has_children())),
                Err(ClientError::NoNode(_)) => debug!("{} vanished while listing", id),
                Err(e) => return Err(e.into()),
            }
        }
        sort_by_name(&mut nodes);

        if root_listing {
            return Ok(vec![PathNode::expanded(path::ROOT, path::ROOT, nodes)]);
        }
        Ok(nodes)
    }

    /// Creates `path_id`. Returns the created id, which differs from the
    /// requested one in sequential modes.
    pub async fn create_path(
        &self,
        alias: &Alias,
        path_id: &str,
        data: &str,
        mode: CreateMode,
    ) -> AdminResult<String> {
        path::validate(path_id)?;
        let handle = self.handle(alias).await?;
        let created = handle
            .create_path(path_id, data.as_bytes(), AclPolicy::default(), mode)
            .await?;
        Ok(created)
    }

    /// Writes `data` at `old_id`, or renames `old_id` to `new_id`.
    ///
    /// A rename creates `new_id` first and then deletes `old_id` at `version`.
    /// If the delete fails both nodes are left in place. Only childless nodes
    /// can be renamed.
    pub async fn update_path(
        &self,
        alias: &Alias,
        new_id: &str,
        old_id: &str,
        data: &str,
        version: i32,
        mode: CreateMode,
    ) -> AdminResult<String> {
        path::validate(new_id)?;
        path::validate(old_id)?;
        check_version(version)?;
        let handle = self.handle(alias).await?;

        if new_id == old_id {
            handle.set_path_data(old_id, data.as_bytes(), version).await?;
            return Ok(old_id.to_string());
        }

        if handle.get_path_stat(old_id).await?.has_children() {
            return Err(AdminError::Conflict(format!(
                "cannot rename {old_id} while it has children"
            )));
        }
        let created = handle
            .create_path(new_id, data.as_bytes(), AclPolicy::default(), mode)
            .await?;
        handle.delete_path(old_id, version).await?;
        info!(alias = %alias, from = old_id, to = %created, "path renamed");
        Ok(created)
    }

    /// Deletes the childless node `path_id` if its version is still `version`.
    ///
    /// A node with children is a conflict. Descendants are never removed on
    /// the caller's behalf.
    pub async fn delete_path(&self, alias: &Alias, path_id: &str, version: i32) -> AdminResult<()> {
        path::validate(path_id)?;
        if path::is_root(path_id) {
            return Err(AdminError::Validation("the root node cannot be deleted".into()));
        }
        check_version(version)?;
        let handle = self.handle(alias).await?;
        handle.delete_path(path_id, version).await?;
        Ok(())
    }

    /// Reads the payload and metadata of `path_id`.
    pub async fn get_path_data(&self, alias: &Alias, path_id: &str) -> AdminResult<PathData> {
        path::validate(path_id)?;
        let handle = self.handle(alias).await?;
        let (data, stat) = handle.get_path_data(path_id).await?;
        Ok(PathData::new(&data, stat))
    }

    /// Copies the subtree at `copy` to `paste/<name>`, where `name` is
    /// `new_base_name` or the last segment of `copy`. Returns the number of
    /// nodes created.
    ///
    /// The walk is pre-order and not transactional. A failure leaves the
    /// nodes created so far in place.
    pub async fn copy_paste_path(
        &self,
        alias: &Alias,
        copy: &str,
        paste: &str,
        new_base_name: Option<&str>,
    ) -> AdminResult<usize> {
        path::validate(copy)?;
        if path::is_root(copy) {
            return Err(AdminError::RootCopy);
        }
        let paste = path::normalize(paste);
        path::validate(&paste)?;
        let base = match new_base_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                path::validate_name(name)?;
                name
            }
            None => path::basename(copy),
        };
        let target = path::join(&paste, base);

        let handle = self.handle(alias).await?;
        if handle.check_path_exist(&target).await? {
            return Err(AdminError::DestinationExists(target));
        }
        if path::is_within(copy, &target) {
            return Err(AdminError::Conflict(format!(
                "cannot paste {copy} inside itself at {target}"
            )));
        }

        info!(alias = %alias, copy, paste = %target, "copying subtree");
        let created = self.copy_subtree(&handle, copy, &target).await?;
        info!(alias = %alias, paste = %target, "copied {} nodes", created);
        Ok(created)
    }

    async fn copy_subtree(
        &self,
        handle: &ConnectionHandle,
        source: &str,
        target: &str,
    ) -> AdminResult<usize> {
        let mut created = 0;
        let mut stack = vec![(source.to_string(), target.to_string(), 0usize)];

        while let Some((src, dst, depth)) = stack.pop() {
            if depth > self.max_copy_depth {
                return Err(AdminError::Validation(format!(
                    "{src} is deeper than the copy limit of {} levels",
                    self.max_copy_depth
                )));
            }

            let data = match handle.get_path_data(&src).await {
                Ok((data, _)) => data,
                Err(ClientError::NoNode(_)) if depth > 0 => {
                    debug!("{} vanished during copy", src);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            handle
                .create_path(&dst, &data, AclPolicy::default(), CreateMode::Persistent)
                .await?;
            created += 1;

            let children = match handle.list_children_path(&src).await {
                Ok(children) => children,
                Err(ClientError::NoNode(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            // Reversed so that children pop in listed order.
            for name in children.into_iter().rev() {
                stack.push((path::join(&src, &name), path::join(&dst, &name), depth + 1));
            }
        }
        Ok(created)
    }
}

fn check_version(version: i32) -> AdminResult<()> {
    if version < 0 {
        return Err(AdminError::Validation(format!(
            "an explicit node version is required, got {version}"
        )));
    }
    Ok(())
}

fn sort_by_name(nodes: &mut [PathNode]) {
    nodes.sort_by_cached_key(|n| (n.name.to_lowercase(), n.name.clone()));
}
