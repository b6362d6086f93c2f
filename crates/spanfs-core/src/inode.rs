use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{FsError, FsResult};
use crate::file::StripedFile;
use crate::symlink::SymlinkNode;
use crate::types::FileKind;

/// A namespace inode: either a striped regular file or an in-memory symlink.
///
/// A future variant (directories, say) must force every dispatch site to be
/// revisited; exhaustive matches make that a compile error.
pub enum Inode {
    File(StripedFile),
    Symlink(SymlinkNode),
}

impl Inode {
    pub fn kind(&self) -> FileKind {
        match self {
            Inode::File(_) => FileKind::RegularFile,
            Inode::Symlink(_) => FileKind::Symlink,
        }
    }
}

/// Shared, reference-counted inode handle. The namespace holds one strong
/// reference per key; hard links are simply additional keys mapping to the
/// same handle, and the strong count doubles as `nlink`.
pub type InodeRef = Arc<RwLock<Inode>>;

pub fn new_inode_ref(inode: Inode) -> InodeRef {
    Arc::new(RwLock::new(inode))
}

/// Shared access to an inode; a poisoned lock surfaces as a core failure
/// instead of a panic on the FUSE thread.
pub fn read_inode(inode: &InodeRef) -> FsResult<RwLockReadGuard<'_, Inode>> {
    inode.read().map_err(|_| FsError::LockPoisoned)
}

pub fn write_inode(inode: &InodeRef) -> FsResult<RwLockWriteGuard<'_, Inode>> {
    inode.write().map_err(|_| FsError::LockPoisoned)
}
