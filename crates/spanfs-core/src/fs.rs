use crate::error::FsResult;
use crate::types::{Caller, DirEntry, FileHandle, FileStat, RenameMode, TimeUpdate, VfsStats};

/// The uniform operation surface of the federation.
///
/// Every backing leaf satisfies this contract, and so does the locked
/// federation itself, which is what lets decorators nest: a striped file
/// talks to its leaves exactly the way the FUSE boundary talks to the
/// federation. Paths are interpreted relative to the implementor's root.
///
/// Operations report failure through [`crate::FsError`]; the FUSE boundary
/// turns that into the negative-errno convention. Positional operations
/// accept an optional handle previously produced by `open`/`create`; without
/// one, implementors fall back to path-addressed access.
pub trait FileSystem: Send + Sync {
    fn getattr(&self, path: &str, fh: Option<FileHandle>) -> FsResult<FileStat>;

    /// Copy the link target into `buf`, NUL-terminated when space permits.
    /// Returns the number of target bytes copied.
    fn readlink(&self, path: &str, buf: &mut [u8]) -> FsResult<usize>;

    fn mknod(&self, path: &str, mode: u32, rdev: u64) -> FsResult<()>;

    fn mkdir(&self, path: &str, mode: u32) -> FsResult<()>;

    fn rmdir(&self, path: &str) -> FsResult<()>;

    fn symlink(&self, target: &str, link_path: &str, caller: Caller) -> FsResult<()>;

    fn rename(&self, from: &str, to: &str, mode: RenameMode) -> FsResult<()>;

    fn link(&self, from: &str, to: &str) -> FsResult<()>;

    fn access(&self, path: &str, mask: i32) -> FsResult<()>;

    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>>;

    fn unlink(&self, path: &str) -> FsResult<()>;

    fn chmod(&self, path: &str, mode: u32, fh: Option<FileHandle>) -> FsResult<()>;

    fn chown(&self, path: &str, uid: u32, gid: u32, fh: Option<FileHandle>) -> FsResult<()>;

    fn truncate(&self, path: &str, size: u64, fh: Option<FileHandle>) -> FsResult<()>;

    fn utimens(
        &self,
        path: &str,
        atime: TimeUpdate,
        mtime: TimeUpdate,
        fh: Option<FileHandle>,
    ) -> FsResult<()>;

    fn open(&self, path: &str, flags: i32) -> FsResult<FileHandle>;

    fn create(&self, path: &str, mode: u32, flags: i32, caller: Caller) -> FsResult<FileHandle>;

    /// Read into `buf` starting at `offset`; returns the byte count, which
    /// may fall short of `buf.len()` at end of data.
    fn read(&self, path: &str, buf: &mut [u8], offset: u64, fh: Option<FileHandle>)
        -> FsResult<usize>;

    /// Write `buf` at `offset`; returns the byte count placed, which may
    /// fall short when space runs out.
    fn write(&self, path: &str, buf: &[u8], offset: u64, fh: Option<FileHandle>)
        -> FsResult<usize>;

    fn statfs(&self, path: &str) -> FsResult<VfsStats>;

    fn release(&self, path: &str, fh: Option<FileHandle>) -> FsResult<()>;

    fn fsync(&self, path: &str, datasync: bool, fh: Option<FileHandle>) -> FsResult<()>;

    fn fallocate(
        &self,
        path: &str,
        mode: i32,
        offset: u64,
        length: u64,
        fh: Option<FileHandle>,
    ) -> FsResult<()>;

    fn lseek(&self, path: &str, offset: i64, whence: i32, fh: Option<FileHandle>) -> FsResult<i64>;
}

impl std::fmt::Debug for dyn FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn FileSystem")
    }
}

/// Shared, reference-counted handle to a leaf filesystem. The federation and
/// every striped file that has claimed a chunk on a leaf hold clones of the
/// same handle.
pub type LeafRef = std::sync::Arc<dyn FileSystem>;
