//! The federation engine: one flat namespace over a set of leaves.
//!
//! Every per-path operation resolves its inode here and dispatches on the
//! variant. The engine itself is not thread-safe; it is always driven
//! through [`crate::locked::SharedLockFs`], whose reader/writer discipline
//! matches the `&self`/`&mut self` split of the methods below.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::file::StripedFile;
use crate::fs::{FileSystem, LeafRef};
use crate::inode::{new_inode_ref, read_inode, write_inode, Inode, InodeRef};
use crate::symlink::SymlinkNode;
use crate::types::{
    Caller, DirEntry, FileHandle, FileKind, FileStat, RenameMode, TimeSpec, TimeUpdate, VfsStats,
};

/// Namespace plus per-open bookkeeping for a set of leaves.
pub struct Federation {
    owner: Caller,
    leaves: Arc<[LeafRef]>,
    namespace: HashMap<String, InodeRef>,
    opens: HashMap<FileHandle, Vec<FileHandle>>,
    next_fh: FileHandle,
}

fn is_unremovable(path: &str) -> bool {
    path == "/" || path == "/." || path == "/.."
}

/// The namespace is flat: exactly one leading slash and a non-empty name.
fn check_flat(path: &str) -> FsResult<()> {
    let Some(name) = path.strip_prefix('/') else {
        return Err(FsError::invalid(format!("path is not absolute: {path}")));
    };
    if name.is_empty() || name.contains('/') {
        return Err(FsError::invalid(format!("path is not flat: {path}")));
    }
    Ok(())
}

impl Federation {
    pub fn new(owner: Caller, leaves: Vec<LeafRef>) -> Self {
        Federation {
            owner,
            leaves: leaves.into(),
            namespace: HashMap::new(),
            opens: HashMap::new(),
            next_fh: 1,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn entry_count(&self) -> usize {
        self.namespace.len()
    }

    fn lookup(&self, path: &str) -> FsResult<&InodeRef> {
        self.namespace
            .get(path)
            .ok_or_else(|| FsError::not_found(path))
    }

    fn lookup_cloned(&self, path: &str) -> FsResult<InodeRef> {
        self.lookup(path).cloned()
    }

    fn open_fds(&self, fh: Option<FileHandle>) -> Option<&[FileHandle]> {
        fh.and_then(|h| self.opens.get(&h)).map(|v| v.as_slice())
    }

    fn register_open(&mut self, fds: Vec<FileHandle>) -> FileHandle {
        let fh = self.next_fh;
        self.next_fh += 1;
        self.opens.insert(fh, fds);
        fh
    }

    /// Drop a namespace reference; once the last one is gone the striped
    /// file's per-chunk leaf files go with it.
    fn retire(&self, inode: InodeRef) -> FsResult<()> {
        if Arc::strong_count(&inode) == 1 {
            if let Inode::File(file) = &*read_inode(&inode)? {
                file.unlink();
            }
        }
        Ok(())
    }

    fn root_stat(&self) -> FileStat {
        let now = TimeSpec::now();
        FileStat {
            size: 0,
            mode: libc::S_IFDIR | 0o755,
            nlink: 2,
            uid: self.owner.uid,
            gid: self.owner.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    pub fn getattr(&self, path: &str, _fh: Option<FileHandle>) -> FsResult<FileStat> {
        if path == "/" {
            return Ok(self.root_stat());
        }
        let inode = self.lookup(path)?;
        let nlink = Arc::strong_count(inode) as u32;
        let stat = match &*read_inode(inode)? {
            Inode::File(file) => file.stat(nlink),
            Inode::Symlink(link) => link.stat(nlink),
        };
        Ok(stat)
    }

    pub fn access(&self, path: &str, _mask: i32) -> FsResult<()> {
        if is_unremovable(path) || self.namespace.contains_key(path) {
            Ok(())
        } else {
            Err(FsError::not_found(path))
        }
    }

    pub fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        if path != "/" {
            return Err(FsError::not_found(path));
        }
        let mut entries = vec![
            DirEntry {
                name: ".".into(),
                ino: 0,
                kind: FileKind::Directory,
            },
            DirEntry {
                name: "..".into(),
                ino: 0,
                kind: FileKind::Directory,
            },
        ];
        let mut names: Vec<&String> = self.namespace.keys().collect();
        names.sort();
        for name in names {
            let kind = read_inode(&self.namespace[name])?.kind();
            entries.push(DirEntry {
                name: name.trim_start_matches('/').to_string(),
                ino: 0,
                kind,
            });
        }
        Ok(entries)
    }

    pub fn readlink(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        let inode = self.lookup(path)?;
        match &*read_inode(inode)? {
            Inode::Symlink(link) => Ok(link.read_target(buf)),
            Inode::File(_) => Err(FsError::invalid("readlink on a regular file")),
        }
    }

    pub fn symlink(&mut self, target: &str, link_path: &str, caller: Caller) -> FsResult<()> {
        check_flat(link_path)?;
        if self.namespace.contains_key(link_path) {
            return Err(FsError::already_exists(link_path));
        }
        debug!(target, link_path, "symlink");
        self.namespace.insert(
            link_path.to_string(),
            new_inode_ref(Inode::Symlink(SymlinkNode::new(target, caller))),
        );
        Ok(())
    }

    pub fn link(&mut self, from: &str, to: &str) -> FsResult<()> {
        check_flat(to)?;
        let inode = self.lookup_cloned(from)?;
        if self.namespace.contains_key(to) {
            return Err(FsError::already_exists(to));
        }
        debug!(from, to, "link");
        self.namespace.insert(to.to_string(), inode);
        Ok(())
    }

    pub fn rename(&mut self, from: &str, to: &str, mode: RenameMode) -> FsResult<()> {
        check_flat(to)?;
        if !self.namespace.contains_key(from) {
            return Err(FsError::not_found(from));
        }
        debug!(from, to, ?mode, "rename");
        match mode {
            RenameMode::NoReplace => {
                if self.namespace.contains_key(to) {
                    return Err(FsError::already_exists(to));
                }
                if let Some(inode) = self.namespace.remove(from) {
                    self.namespace.insert(to.to_string(), inode);
                }
                Ok(())
            }
            RenameMode::Exchange => {
                let a = self
                    .namespace
                    .get(from)
                    .cloned()
                    .ok_or_else(|| FsError::not_found(from))?;
                let b = self
                    .namespace
                    .get(to)
                    .cloned()
                    .ok_or_else(|| FsError::not_found(to))?;
                self.namespace.insert(from.to_string(), b);
                self.namespace.insert(to.to_string(), a);
                Ok(())
            }
            RenameMode::Replace => {
                if let Some(inode) = self.namespace.remove(from) {
                    if let Some(prev) = self.namespace.insert(to.to_string(), inode) {
                        self.retire(prev)?;
                    }
                }
                Ok(())
            }
        }
    }

    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        if is_unremovable(path) {
            return Err(FsError::busy(path));
        }
        let inode = self
            .namespace
            .remove(path)
            .ok_or_else(|| FsError::not_found(path))?;
        debug!(path, "unlink");
        self.retire(inode)
    }

    pub fn chmod(&mut self, path: &str, mode: u32, fh: Option<FileHandle>) -> FsResult<()> {
        let inode = self.lookup_cloned(path)?;
        let result = match &mut *write_inode(&inode)? {
            Inode::File(file) => file.chmod(mode, self.open_fds(fh)),
            // Link permissions are fixed; accept and move on.
            Inode::Symlink(_) => Ok(()),
        };
        result
    }

    pub fn chown(&mut self, path: &str, uid: u32, gid: u32, fh: Option<FileHandle>) -> FsResult<()> {
        let inode = self.lookup_cloned(path)?;
        let result = match &mut *write_inode(&inode)? {
            Inode::File(file) => file.chown(uid, gid, self.open_fds(fh)),
            Inode::Symlink(link) => {
                link.chown(uid, gid);
                Ok(())
            }
        };
        result
    }

    pub fn truncate(&mut self, path: &str, size: u64, fh: Option<FileHandle>) -> FsResult<()> {
        let inode = self.lookup_cloned(path)?;
        let result = match &mut *write_inode(&inode)? {
            Inode::File(file) => file.truncate(size, self.open_fds(fh)),
            Inode::Symlink(_) => Err(FsError::invalid("truncate on a symlink")),
        };
        result
    }

    pub fn utimens(
        &mut self,
        path: &str,
        atime: TimeUpdate,
        mtime: TimeUpdate,
        fh: Option<FileHandle>,
    ) -> FsResult<()> {
        let inode = self.lookup_cloned(path)?;
        let result = match &mut *write_inode(&inode)? {
            Inode::File(file) => {
                file.utimens(atime, mtime, self.open_fds(fh));
                Ok(())
            }
            Inode::Symlink(link) => {
                link.utimens(atime, mtime);
                Ok(())
            }
        };
        result
    }

    pub fn open(&mut self, path: &str, flags: i32) -> FsResult<FileHandle> {
        let inode = self.lookup_cloned(path)?;
        let fds = match &mut *write_inode(&inode)? {
            Inode::File(file) => file.open(flags)?,
            Inode::Symlink(_) => return Err(FsError::invalid("open on a symlink")),
        };
        Ok(self.register_open(fds))
    }

    pub fn create(&mut self, path: &str, mode: u32, flags: i32, caller: Caller) -> FsResult<FileHandle> {
        check_flat(path)?;
        if self.namespace.contains_key(path) {
            return Err(FsError::already_exists(path));
        }
        debug!(path, mode = format_args!("{mode:o}"), "create");
        let file = StripedFile::new(path, mode, flags, caller, self.leaves.clone());
        self.namespace
            .insert(path.to_string(), new_inode_ref(Inode::File(file)));
        // No chunk exists yet; the fd sequence starts empty and grows as the
        // first writes enlist chunks.
        Ok(self.register_open(Vec::new()))
    }

    pub fn read(
        &self,
        path: &str,
        buf: &mut [u8],
        offset: u64,
        fh: Option<FileHandle>,
    ) -> FsResult<usize> {
        let inode = self.lookup(path)?;
        match &*read_inode(inode)? {
            Inode::File(file) => file.read(buf, offset, self.open_fds(fh)),
            Inode::Symlink(_) => Err(FsError::invalid("read on a symlink")),
        }
    }

    pub fn write(
        &mut self,
        path: &str,
        buf: &[u8],
        offset: u64,
        fh: Option<FileHandle>,
    ) -> FsResult<usize> {
        let inode = self.lookup_cloned(path)?;
        let mut guard = write_inode(&inode)?;
        match &mut *guard {
            Inode::File(file) => {
                let fds = fh.and_then(|h| self.opens.get_mut(&h));
                file.write(buf, offset, fds)
            }
            Inode::Symlink(_) => Err(FsError::invalid("write on a symlink")),
        }
    }

    pub fn statfs(&self, path: &str) -> FsResult<VfsStats> {
        let mut agg = VfsStats::federation_template();
        for leaf in self.leaves.iter() {
            let stats = leaf.statfs(path)?;
            agg.absorb(&stats);
        }
        Ok(agg)
    }

    pub fn release(&mut self, path: &str, fh: Option<FileHandle>) -> FsResult<()> {
        let fds = fh.and_then(|h| self.opens.remove(&h)).unwrap_or_default();
        let inode = self.lookup_cloned(path)?;
        let result = match &mut *write_inode(&inode)? {
            Inode::File(file) => file.release(&fds),
            Inode::Symlink(_) => Err(FsError::invalid("release on a symlink")),
        };
        result
    }

    pub fn fsync(&self, path: &str, datasync: bool, fh: Option<FileHandle>) -> FsResult<()> {
        let inode = self.lookup(path)?;
        match &*read_inode(inode)? {
            Inode::File(file) => file.fsync(datasync, self.open_fds(fh)),
            Inode::Symlink(_) => Err(FsError::invalid("fsync on a symlink")),
        }
    }

    pub fn lseek(
        &self,
        path: &str,
        offset: i64,
        whence: i32,
        _fh: Option<FileHandle>,
    ) -> FsResult<i64> {
        let inode = self.lookup(path)?;
        match &*read_inode(inode)? {
            Inode::File(file) => file.lseek(offset, whence),
            Inode::Symlink(_) => Err(FsError::invalid("lseek on a symlink")),
        }
    }

    pub fn mknod(&mut self, _path: &str, _mode: u32, _rdev: u64) -> FsResult<()> {
        Err(FsError::invalid("mknod is not supported"))
    }

    pub fn mkdir(&mut self, _path: &str, _mode: u32) -> FsResult<()> {
        Err(FsError::invalid("mkdir is not supported"))
    }

    pub fn rmdir(&mut self, _path: &str) -> FsResult<()> {
        Err(FsError::invalid("rmdir is not supported"))
    }

    pub fn fallocate(
        &mut self,
        _path: &str,
        _mode: i32,
        _offset: u64,
        _length: u64,
        _fh: Option<FileHandle>,
    ) -> FsResult<()> {
        Err(FsError::invalid("fallocate is not supported"))
    }
}
