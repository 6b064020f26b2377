//! Object store interface and an in-memory implementation

use crate::{
    types::{AccessRole, BucketRoot, DirEntry, PathListing, PushItem},
    ClientError, Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fula_core::sanitize_path;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Chunked file content
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

const CHUNK_SIZE: usize = 64 * 1024;

/// Trait for bucket-oriented object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open the root of `bucket_slug`, creating it if needed
    async fn get_or_create(&self, bucket_slug: &str) -> Result<BucketRoot>;

    /// Write `item` under the root; `name` is the bucket's name
    async fn push_path(&self, root_key: &str, name: &str, item: PushItem) -> Result<()>;

    /// Stream a file's content
    async fn pull_path(&self, root_key: &str, path: &str) -> Result<ByteStream>;

    /// Describe a path and its immediate children
    async fn list_path(&self, root_key: &str, path: &str) -> Result<PathListing>;

    /// Who can access a path
    async fn pull_path_access_roles(
        &self,
        root_key: &str,
        path: &str,
    ) -> Result<HashMap<String, AccessRole>>;
}

struct StoredFile {
    content: Bytes,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct BucketTree {
    files: BTreeMap<String, StoredFile>,
    roles: HashMap<String, HashMap<String, AccessRole>>,
}

/// In-memory object store for testing and local development
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    roots: Arc<DashMap<String, BucketRoot>>,
    trees: Arc<DashMap<String, RwLock<BucketTree>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every push to `path` fail
    pub fn fail_pushes_to(&self, path: &str) {
        self.failing.write().insert(sanitize_path(path));
    }

    /// Grant `public_key` a role on `path`
    pub fn set_access_role(&self, root_key: &str, path: &str, public_key: &str, role: AccessRole) {
        if let Some(tree) = self.trees.get(root_key) {
            tree.write()
                .roles
                .entry(sanitize_path(path))
                .or_default()
                .insert(public_key.to_string(), role);
        }
    }

    /// Number of stored files under `root_key`
    pub fn file_count(&self, root_key: &str) -> usize {
        self.trees
            .get(root_key)
            .map(|t| t.read().files.len())
            .unwrap_or(0)
    }

    fn tree(
        &self,
        root_key: &str,
    ) -> Result<dashmap::mapref::one::Ref<'_, String, RwLock<BucketTree>>> {
        self.trees
            .get(root_key)
            .ok_or_else(|| ClientError::NotFound(format!("bucket root {}", root_key)))
    }
}

fn file_entry(path: &str, file: &StoredFile) -> DirEntry {
    DirEntry {
        path: path.to_string(),
        name: last_segment(path),
        is_dir: false,
        size: file.content.len() as u64,
        created_at: file.created_at,
        updated_at: file.updated_at,
    }
}

fn dir_entry(path: &str, at: DateTime<Utc>) -> DirEntry {
    DirEntry {
        path: path.to_string(),
        name: last_segment(path),
        is_dir: true,
        size: 0,
        created_at: at,
        updated_at: at,
    }
}

fn last_segment(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    #[instrument(skip(self))]
    async fn get_or_create(&self, bucket_slug: &str) -> Result<BucketRoot> {
        let root = self
            .roots
            .entry(bucket_slug.to_string())
            .or_insert_with(|| {
                let key = uuid::Uuid::new_v4().simple().to_string();
                BucketRoot {
                    db_id: format!("db-{}", &key[..16]),
                    key,
                }
            })
            .clone();
        self.trees.entry(root.key.clone()).or_default();
        Ok(root)
    }

    #[instrument(skip(self, item), fields(path = %item.path, size = item.content.len()))]
    async fn push_path(&self, root_key: &str, name: &str, item: PushItem) -> Result<()> {
        let path = sanitize_path(&item.path);
        if self.failing.read().contains(&path) {
            return Err(ClientError::RemoteOperationFailure(format!(
                "push to {}{} rejected",
                name, path
            )));
        }
        let tree = self.tree(root_key)?;
        let mut tree = tree.write();
        let now = Utc::now();
        let created_at = tree.files.get(&path).map(|f| f.created_at).unwrap_or(now);
        tree.files.insert(
            path.clone(),
            StoredFile {
                content: item.content,
                created_at,
                updated_at: now,
            },
        );
        debug!(bucket = name, path = %path, "pushed");
        Ok(())
    }

    async fn pull_path(&self, root_key: &str, path: &str) -> Result<ByteStream> {
        let path = sanitize_path(path);
        let content = {
            let tree = self.tree(root_key)?;
            let tree = tree.read();
            tree.files
                .get(&path)
                .map(|f| f.content.clone())
                .ok_or_else(|| ClientError::NotFound(format!("file {}", path)))?
        };
        let chunks: Vec<Result<Bytes>> = (0..content.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(content.slice(start..(start + CHUNK_SIZE).min(content.len()))))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }

    async fn list_path(&self, root_key: &str, path: &str) -> Result<PathListing> {
        let path = sanitize_path(path);
        let tree = self.tree(root_key)?;
        let tree = tree.read();

        if let Some(file) = tree.files.get(&path) {
            return Ok(PathListing {
                entry: file_entry(&path, file),
                children: Vec::new(),
            });
        }

        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        let mut children = Vec::new();
        let mut dirs = HashSet::new();
        let mut newest: Option<DateTime<Utc>> = None;
        for (file_path, file) in tree.files.range(prefix.clone()..) {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                break;
            };
            newest = Some(newest.map_or(file.updated_at, |n| n.max(file.updated_at)));
            match rest.split_once('/') {
                None => children.push(file_entry(file_path, file)),
                Some((dir, _)) => {
                    if dirs.insert(dir.to_string()) {
                        children.push(dir_entry(&format!("{}{}", prefix, dir), file.updated_at));
                    }
                }
            }
        }

        match newest {
            Some(at) => Ok(PathListing {
                entry: dir_entry(&path, at),
                children,
            }),
            None if path == "/" => Ok(PathListing {
                entry: dir_entry("/", Utc::now()),
                children,
            }),
            None => Err(ClientError::NotFound(format!("path {}", path))),
        }
    }

    async fn pull_path_access_roles(
        &self,
        root_key: &str,
        path: &str,
    ) -> Result<HashMap<String, AccessRole>> {
        let path = sanitize_path(path);
        let tree = self.tree(root_key)?;
        let tree = tree.read();
        if !tree.files.contains_key(&path) {
            return Err(ClientError::NotFound(format!("file {}", path)));
        }
        Ok(tree.roles.get(&path).cloned().unwrap_or_default())
    }
}
