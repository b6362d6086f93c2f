#![warn(missing_docs)]

//! spanfs core: a user-space filesystem that federates several backing
//! directories into one flat namespace, transparently striping each regular
//! file across the backing stores so their combined free space is usable
//! even when no single store could hold the whole file.
//!
//! The FUSE protocol binding lives in the companion `spanfs-fuse` crate;
//! everything here is plain, synchronous, thread-blocking code behind one
//! reader/writer lock per federation.

/// Ordered chunk ranges and the covering-chunk search.
pub mod chunk;
/// Mount configuration and the decorator-stack factory.
pub mod config;
/// Error taxonomy and the errno translation boundary.
pub mod error;
/// The federation engine: namespace, inode dispatch, statfs aggregation.
pub mod federation;
/// The striped-file engine: chunk placement, scatter I/O, growth.
pub mod file;
/// The uniform operation surface shared by leaves and the federation.
pub mod fs;
/// The namespace inode variant and its shared references.
pub mod inode;
/// Reader/writer lock decorator over the federation.
pub mod locked;
/// Operation-log pass-through decorator.
pub mod logged;
/// In-memory, capacity-limited leaf used by tests and examples.
pub mod mem;
/// Directory-reflecting leaf over a host directory.
pub mod reflector;
/// Symlink inodes, held in the namespace only.
pub mod symlink;
/// Plain data carriers: stats, timestamps, rename modes, handles.
pub mod types;

pub use config::{build_filesystem, FederationConfig};
pub use error::{FsError, FsResult};
pub use federation::Federation;
pub use fs::{FileSystem, LeafRef};
pub use locked::SharedLockFs;
pub use types::{
    Caller, DirEntry, FileHandle, FileKind, FileStat, RenameMode, TimeSpec, TimeUpdate, VfsStats,
};
