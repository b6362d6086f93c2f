use crate::types::{Caller, FileStat, TimeSpec, TimeUpdate};

/// A symbolic link held purely in the federation's namespace. Links have no
/// on-leaf representation and are not persisted.
#[derive(Debug, Clone)]
pub struct SymlinkNode {
    target: String,
    uid: u32,
    gid: u32,
    atime: TimeSpec,
    mtime: TimeSpec,
    ctime: TimeSpec,
}

impl SymlinkNode {
    pub fn new(target: impl Into<String>, caller: Caller) -> Self {
        let now = TimeSpec::now();
        SymlinkNode {
            target: target.into(),
            uid: caller.uid,
            gid: caller.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Copy the target into `buf`, NUL-terminated when space permits.
    /// Returns the number of target bytes copied.
    pub fn read_target(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let n = self.target.len().min(buf.len() - 1);
        buf[..n].copy_from_slice(&self.target.as_bytes()[..n]);
        buf[n] = 0;
        n
    }

    pub fn stat(&self, nlink: u32) -> FileStat {
        FileStat {
            size: self.target.len() as u64,
            mode: libc::S_IFLNK | 0o777,
            nlink,
            uid: self.uid,
            gid: self.gid,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }

    pub fn chown(&mut self, uid: u32, gid: u32) {
        self.uid = uid;
        self.gid = gid;
        self.ctime = TimeSpec::now();
    }

    pub fn utimens(&mut self, atime: TimeUpdate, mtime: TimeUpdate) {
        let now = TimeSpec::now();
        self.atime = atime.apply(self.atime, now);
        self.mtime = mtime.apply(self.mtime, now);
        if !atime.is_omit() || !mtime.is_omit() {
            self.ctime = now;
        }
    }
}
