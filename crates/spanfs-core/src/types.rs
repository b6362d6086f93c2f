use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{FsError, FsResult};

/// Opaque per-open handle, allocated by `open`/`create` and consumed by the
/// positional operations until `release`.
pub type FileHandle = u64;

/// Block size reported by the federation's statvfs template.
pub const BLOCK_SIZE: u64 = 4096;
/// Maximum file name length reported by the federation.
pub const NAME_MAX: u64 = 255;
/// Fixed filesystem id reported by the federation.
pub const FSID: u64 = 0x0123_4567_8909_8765;

/// Seconds/nanoseconds timestamp, the shape leaves and the kernel trade in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeSpec {
    pub secs: i64,
    pub nanos: u32,
}

impl TimeSpec {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: now.as_secs() as i64,
            nanos: now.subsec_nanos(),
        }
    }

    pub fn to_system_time(self) -> SystemTime {
        UNIX_EPOCH
            + std::time::Duration::from_secs(self.secs.max(0) as u64)
            + std::time::Duration::from_nanos(self.nanos as u64)
    }
}

/// One component of a `utimens` request.
///
/// `Now` adopts the current time, `Omit` leaves the stamp untouched, and
/// `Set` installs the literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUpdate {
    Now,
    Omit,
    Set(TimeSpec),
}

impl TimeUpdate {
    /// Resolve against the current stamp, given a shared notion of "now".
    pub fn apply(self, current: TimeSpec, now: TimeSpec) -> TimeSpec {
        match self {
            TimeUpdate::Now => now,
            TimeUpdate::Omit => current,
            TimeUpdate::Set(t) => t,
        }
    }

    pub fn is_omit(self) -> bool {
        matches!(self, TimeUpdate::Omit)
    }
}

/// Identity of the caller issuing an operation, as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub uid: u32,
    pub gid: u32,
}

impl Caller {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// Kind of a directory entry, as far as the flat namespace distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    RegularFile,
    Directory,
    Symlink,
    Other,
}

/// One entry produced by `readdir`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub ino: u64,
    pub kind: FileKind,
}

/// Attributes returned by `getattr`, filled from an inode descriptor.
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub size: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: TimeSpec,
    pub mtime: TimeSpec,
    pub ctime: TimeSpec,
}

impl FileStat {
    pub fn kind(&self) -> FileKind {
        match self.mode & libc::S_IFMT {
            libc::S_IFREG => FileKind::RegularFile,
            libc::S_IFDIR => FileKind::Directory,
            libc::S_IFLNK => FileKind::Symlink,
            _ => FileKind::Other,
        }
    }
}

/// statvfs-shaped counters; block counts are in `bsize` units.
#[derive(Debug, Clone, Copy, Default)]
pub struct VfsStats {
    pub bsize: u64,
    pub frsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub favail: u64,
    pub fsid: u64,
    pub namemax: u64,
}

impl VfsStats {
    /// The federation's reporting template. Leaf counters are rescaled into
    /// this block size before aggregation.
    pub fn federation_template() -> Self {
        VfsStats {
            bsize: BLOCK_SIZE,
            frsize: BLOCK_SIZE,
            fsid: FSID,
            namemax: NAME_MAX,
            ..Default::default()
        }
    }

    /// Fold one leaf's counters into this template, rescaling block counts
    /// from the leaf's block size into ours.
    pub fn absorb(&mut self, leaf: &VfsStats) {
        self.blocks += leaf.blocks * leaf.bsize / self.bsize;
        self.bfree += leaf.bfree * leaf.bsize / self.bsize;
        self.bavail += leaf.bavail * leaf.bsize / self.bsize;
        self.files += leaf.files;
        self.ffree += leaf.ffree;
        self.favail += leaf.favail;
    }
}

/// The three rename disciplines selected by the kernel's flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameMode {
    /// Plain move; an existing target is overwritten.
    Replace,
    /// Fail with `EEXIST` when the target is present.
    NoReplace,
    /// Atomically swap source and target.
    Exchange,
}

impl RenameMode {
    pub fn from_flags(flags: u32) -> FsResult<Self> {
        const NOREPLACE: u32 = libc::RENAME_NOREPLACE;
        const EXCHANGE: u32 = libc::RENAME_EXCHANGE;
        match flags {
            0 => Ok(RenameMode::Replace),
            NOREPLACE => Ok(RenameMode::NoReplace),
            EXCHANGE => Ok(RenameMode::Exchange),
            other => Err(FsError::invalid(format!("rename flags {other:#x}"))),
        }
    }
}
