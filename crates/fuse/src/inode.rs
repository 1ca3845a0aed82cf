//! Node id table for the kernel side of the mount.
//!
//! Maps the node ids the kernel addresses requests with to real paths.
//! Nodes are also keyed by the real `(st_dev, st_ino)` pair so every name of
//! a hard-linked file resolves to the same id.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use mirrorfs_core::{Error, Result};

pub const ROOT_ID: u64 = fuser::FUSE_ROOT_ID;

pub struct Node {
    pub path: PathBuf,
    pub nlookup: u64,
    key: Option<(u64, u64)>,
}

pub struct InodeTable {
    nodes: HashMap<u64, Node>,
    by_key: HashMap<(u64, u64), u64>,
    next_id: u64,
}

impl InodeTable {
    pub fn new(root: PathBuf) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ID,
            Node {
                path: root,
                nlookup: 1,
                key: None,
            },
        );

        Self {
            nodes,
            by_key: HashMap::new(),
            next_id: ROOT_ID + 1,
        }
    }

    pub fn get(&self, id: u64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_path(&self, id: u64) -> Result<PathBuf> {
        self.nodes
            .get(&id)
            .map(|n| n.path.clone())
            .ok_or(Error::NotFound)
    }

    /// Real path of `name` inside directory node `parent`.
    pub fn child_path(&self, parent: u64, name: &OsStr) -> Result<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.as_encoded_bytes().contains(&b'/')
        {
            return Err(Error::InvalidArgument);
        }
        Ok(self.get_path(parent)?.join(name))
    }

    /// Id already assigned to the real file `(dev, ino)`, if any.
    pub fn find(&self, dev: u64, ino: u64) -> Option<u64> {
        self.by_key.get(&(dev, ino)).copied()
    }

    /// Records one kernel lookup of `path` and returns its node id.
    ///
    /// A file that is already known keeps its id and moves to `path`, the
    /// name it was most recently reached through.
    pub fn insert(&mut self, path: PathBuf, dev: u64, ino: u64) -> u64 {
        let key = (dev, ino);

        if let Some(&id) = self.by_key.get(&key) {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.nlookup += 1;
                node.path = path;
                return id;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                path,
                nlookup: 1,
                key: Some(key),
            },
        );
        self.by_key.insert(key, id);
        id
    }

    pub fn forget(&mut self, id: u64, nlookup: u64) {
        if id == ROOT_ID {
            return;
        }

        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        node.nlookup = node.nlookup.saturating_sub(nlookup);
        if node.nlookup > 0 {
            return;
        }

        if let Some(node) = self.nodes.remove(&id) {
            if let Some(key) = node.key {
                if self.by_key.get(&key) == Some(&id) {
                    self.by_key.remove(&key);
                }
            }
        }
    }

    /// Follows a rename of `from` to `to`, including every node below it.
    pub fn rename(&mut self, from: &Path, to: &Path) {
        self.remove_path(to);

        for node in self.nodes.values_mut() {
            if let Ok(rest) = node.path.strip_prefix(from) {
                node.path = if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                };
            }
        }
    }

    /// Detaches the node at `path` from its real file after an unlink.
    ///
    /// The id lives on until the kernel forgets it, but a later lookup of
    /// the same `(dev, ino)` gets a fresh id since the host may hand the
    /// inode number to an unrelated file.
    pub fn remove_path(&mut self, path: &Path) {
        for (id, node) in &mut self.nodes {
            if *id != ROOT_ID && node.path == path {
                if let Some(key) = node.key.take() {
                    self.by_key.remove(&key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    fn lookup(table: &mut InodeTable, parent: u64, name: &str) -> u64 {
        let path = table.child_path(parent, OsStr::new(name)).unwrap();
        let meta = fs::symlink_metadata(&path).unwrap();
        table.insert(path, meta.dev(), meta.ino())
    }

    #[test]
    fn root_id_is_one() {
        let tmp = TempDir::new().unwrap();
        let table = InodeTable::new(tmp.path().to_path_buf());
        assert_eq!(ROOT_ID, 1);
        assert_eq!(table.get(ROOT_ID).unwrap().path, tmp.path());
    }

    #[test]
    fn lookup_creates_node() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("test.txt"), "hello").unwrap();

        let mut table = InodeTable::new(tmp.path().to_path_buf());
        let id = lookup(&mut table, ROOT_ID, "test.txt");

        assert!(id > ROOT_ID);
        assert_eq!(table.get_path(id).unwrap(), tmp.path().join("test.txt"));
    }

    #[test]
    fn lookup_returns_same_id() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("test.txt"), "hello").unwrap();

        let mut table = InodeTable::new(tmp.path().to_path_buf());
        let first = lookup(&mut table, ROOT_ID, "test.txt");
        let second = lookup(&mut table, ROOT_ID, "test.txt");

        assert_eq!(first, second);
        assert_eq!(table.get(first).unwrap().nlookup, 2);
    }

    #[test]
    fn hard_links_share_an_id() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a"), "x").unwrap();
        fs::hard_link(tmp.path().join("a"), tmp.path().join("b")).unwrap();

        let mut table = InodeTable::new(tmp.path().to_path_buf());
        let a = lookup(&mut table, ROOT_ID, "a");
        let b = lookup(&mut table, ROOT_ID, "b");

        assert_eq!(a, b);
        assert_eq!(table.get_path(a).unwrap(), tmp.path().join("b"));
    }

    #[test]
    fn forget_removes_node() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("test.txt"), "hello").unwrap();

        let mut table = InodeTable::new(tmp.path().to_path_buf());
        let id = lookup(&mut table, ROOT_ID, "test.txt");
        lookup(&mut table, ROOT_ID, "test.txt");

        table.forget(id, 1);
        assert!(table.get(id).is_some());
        table.forget(id, 1);
        assert!(table.get(id).is_none());
        assert_eq!(table.get_path(id), Err(Error::NotFound));

        let again = lookup(&mut table, ROOT_ID, "test.txt");
        assert_ne!(again, id);
    }

    #[test]
    fn forget_does_not_remove_root() {
        let tmp = TempDir::new().unwrap();
        let mut table = InodeTable::new(tmp.path().to_path_buf());

        table.forget(ROOT_ID, 100);
        assert!(table.get(ROOT_ID).is_some());
    }

    #[test]
    fn invalid_name_rejected() {
        let tmp = TempDir::new().unwrap();
        let table = InodeTable::new(tmp.path().to_path_buf());

        for name in ["..", ".", "foo/bar", ""] {
            assert_eq!(
                table.child_path(ROOT_ID, OsStr::new(name)),
                Err(Error::InvalidArgument),
                "{name:?}"
            );
        }
    }

    #[test]
    fn unknown_parent_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let table = InodeTable::new(tmp.path().to_path_buf());
        assert_eq!(
            table.child_path(42, OsStr::new("x")),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn rename_rewrites_descendants() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("old/inner")).unwrap();
        fs::write(tmp.path().join("old/inner/file"), "").unwrap();

        let mut table = InodeTable::new(tmp.path().to_path_buf());
        let dir = lookup(&mut table, ROOT_ID, "old");
        let inner = lookup(&mut table, dir, "inner");
        let file = lookup(&mut table, inner, "file");

        fs::rename(tmp.path().join("old"), tmp.path().join("new")).unwrap();
        table.rename(&tmp.path().join("old"), &tmp.path().join("new"));

        assert_eq!(table.get_path(dir).unwrap(), tmp.path().join("new"));
        assert_eq!(
            table.get_path(file).unwrap(),
            tmp.path().join("new/inner/file")
        );
    }

    #[test]
    fn rename_leaves_sibling_prefixes_alone() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ab"), "").unwrap();
        fs::write(tmp.path().join("abc"), "").unwrap();

        let mut table = InodeTable::new(tmp.path().to_path_buf());
        lookup(&mut table, ROOT_ID, "ab");
        let abc = lookup(&mut table, ROOT_ID, "abc");

        table.rename(&tmp.path().join("ab"), &tmp.path().join("zz"));
        assert_eq!(table.get_path(abc).unwrap(), tmp.path().join("abc"));
    }

    #[test]
    fn removed_path_gets_fresh_id() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("f"), "").unwrap();

        let mut table = InodeTable::new(tmp.path().to_path_buf());
        let id = lookup(&mut table, ROOT_ID, "f");
        let meta = fs::metadata(tmp.path().join("f")).unwrap();

        table.remove_path(&tmp.path().join("f"));
        assert_eq!(table.find(meta.dev(), meta.ino()), None);
        assert!(table.get(id).is_some(), "kept until forgotten");

        let again = lookup(&mut table, ROOT_ID, "f");
        assert_ne!(again, id);

        // Forgetting the detached node must not unmap the new one.
        table.forget(id, 1);
        assert_eq!(table.find(meta.dev(), meta.ino()), Some(again));
    }
}
