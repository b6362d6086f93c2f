//! In-memory leaf backend with a fixed byte budget.
//!
//! Used by the striping and federation tests to model leaves that run out of
//! space at precise points, and handy as a scratch backend in examples. Plays
//! the role a real mount plays for [`crate::reflector::DirReflector`].

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::types::{
    Caller, DirEntry, FileHandle, FileKind, FileStat, RenameMode, TimeSpec, TimeUpdate, VfsStats,
};

const MEM_BSIZE: u64 = 512;

struct MemFile {
    data: Vec<u8>,
    mode: u32,
    uid: u32,
    gid: u32,
    atime: TimeSpec,
    mtime: TimeSpec,
    ctime: TimeSpec,
}

impl MemFile {
    fn new(mode: u32, caller: Caller) -> Self {
        let now = TimeSpec::now();
        MemFile {
            data: Vec::new(),
            mode,
            uid: caller.uid,
            gid: caller.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }
}

struct MemState {
    files: HashMap<String, MemFile>,
    opens: HashMap<FileHandle, String>,
    next_fh: FileHandle,
    fail_creates: bool,
}

impl MemState {
    fn used(&self) -> u64 {
        self.files.values().map(|f| f.data.len() as u64).sum()
    }
}

/// A leaf that stores file contents in memory, refusing growth past its
/// configured capacity the way a full disk would: short writes first, then
/// `ENOSPC`.
pub struct MemLeaf {
    capacity: u64,
    state: Mutex<MemState>,
}

impl MemLeaf {
    pub fn new(capacity: u64) -> Self {
        MemLeaf {
            capacity,
            state: Mutex::new(MemState {
                files: HashMap::new(),
                opens: HashMap::new(),
                next_fh: 1,
                fail_creates: false,
            }),
        }
    }

    /// Snapshot of a stored file's bytes, for assertions in tests.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.files.get(path).map(|f| f.data.clone())
    }

    pub fn file_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.files.len()
    }

    pub fn bytes_used(&self) -> u64 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.used()
    }

    /// Make subsequent `create` calls fail with `EIO`, the way a dead or
    /// read-only leaf would refuse new files.
    pub fn set_fail_creates(&self, fail: bool) {
        self.lock().fail_creates = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FileSystem for MemLeaf {
    fn getattr(&self, path: &str, _fh: Option<FileHandle>) -> FsResult<FileStat> {
        let state = self.lock();
        let file = state.files.get(path).ok_or_else(|| FsError::not_found(path))?;
        Ok(FileStat {
            size: file.data.len() as u64,
            mode: file.mode,
            nlink: 1,
            uid: file.uid,
            gid: file.gid,
            atime: file.atime,
            mtime: file.mtime,
            ctime: file.ctime,
        })
    }

    fn readlink(&self, _path: &str, _buf: &mut [u8]) -> FsResult<usize> {
        Err(FsError::invalid("readlink on a memory leaf"))
    }

    fn mknod(&self, _path: &str, _mode: u32, _rdev: u64) -> FsResult<()> {
        Err(FsError::not_supported("mknod"))
    }

    fn mkdir(&self, _path: &str, _mode: u32) -> FsResult<()> {
        Err(FsError::not_supported("mkdir"))
    }

    fn rmdir(&self, _path: &str) -> FsResult<()> {
        Err(FsError::not_supported("rmdir"))
    }

    fn symlink(&self, _target: &str, _link_path: &str, _caller: Caller) -> FsResult<()> {
        Err(FsError::not_supported("symlink"))
    }

    fn rename(&self, from: &str, to: &str, mode: RenameMode) -> FsResult<()> {
        if mode != RenameMode::Replace {
            return Err(FsError::invalid("rename flags on a memory leaf"));
        }
        let mut state = self.lock();
        let file = state
            .files
            .remove(from)
            .ok_or_else(|| FsError::not_found(from))?;
        state.files.insert(to.to_string(), file);
        Ok(())
    }

    fn link(&self, _from: &str, _to: &str) -> FsResult<()> {
        Err(FsError::not_supported("link"))
    }

    fn access(&self, path: &str, _mask: i32) -> FsResult<()> {
        let state = self.lock();
        if state.files.contains_key(path) {
            Ok(())
        } else {
            Err(FsError::not_found(path))
        }
    }

    fn readdir(&self, _path: &str) -> FsResult<Vec<DirEntry>> {
        let state = self.lock();
        Ok(state
            .files
            .keys()
            .map(|name| DirEntry {
                name: name.trim_start_matches('/').to_string(),
                ino: 0,
                kind: FileKind::RegularFile,
            })
            .collect())
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        let mut state = self.lock();
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FsError::not_found(path))
    }

    fn chmod(&self, path: &str, mode: u32, _fh: Option<FileHandle>) -> FsResult<()> {
        let mut state = self.lock();
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        file.mode = libc::S_IFREG | (mode & 0o7777);
        file.ctime = TimeSpec::now();
        Ok(())
    }

    fn chown(&self, path: &str, uid: u32, gid: u32, _fh: Option<FileHandle>) -> FsResult<()> {
        let mut state = self.lock();
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        file.uid = uid;
        file.gid = gid;
        file.ctime = TimeSpec::now();
        Ok(())
    }

    fn truncate(&self, path: &str, size: u64, _fh: Option<FileHandle>) -> FsResult<()> {
        let mut state = self.lock();
        let used = state.used();
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        let growth = size.saturating_sub(file.data.len() as u64);
        if growth > self.capacity.saturating_sub(used) {
            return Err(FsError::NoSpace);
        }
        file.data.resize(size as usize, 0);
        file.mtime = TimeSpec::now();
        file.ctime = file.mtime;
        Ok(())
    }

    fn utimens(
        &self,
        path: &str,
        atime: TimeUpdate,
        mtime: TimeUpdate,
        _fh: Option<FileHandle>,
    ) -> FsResult<()> {
        let mut state = self.lock();
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        let now = TimeSpec::now();
        file.atime = atime.apply(file.atime, now);
        file.mtime = mtime.apply(file.mtime, now);
        if !atime.is_omit() || !mtime.is_omit() {
            file.ctime = now;
        }
        Ok(())
    }

    fn open(&self, path: &str, flags: i32) -> FsResult<FileHandle> {
        let mut state = self.lock();
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        if flags & libc::O_TRUNC != 0 && flags & (libc::O_WRONLY | libc::O_RDWR) != 0 {
            file.data.clear();
        }
        let fh = state.next_fh;
        state.next_fh += 1;
        state.opens.insert(fh, path.to_string());
        Ok(fh)
    }

    fn create(&self, path: &str, mode: u32, flags: i32, caller: Caller) -> FsResult<FileHandle> {
        let mut state = self.lock();
        if state.fail_creates {
            return Err(FsError::Os(libc::EIO));
        }
        let file = state
            .files
            .entry(path.to_string())
            .or_insert_with(|| MemFile::new(libc::S_IFREG | (mode & 0o7777), caller));
        if flags & libc::O_TRUNC != 0 {
            file.data.clear();
        }
        let fh = state.next_fh;
        state.next_fh += 1;
        state.opens.insert(fh, path.to_string());
        Ok(fh)
    }

    fn read(&self, path: &str, buf: &mut [u8], offset: u64, _fh: Option<FileHandle>)
        -> FsResult<usize> {
        let state = self.lock();
        let file = state.files.get(path).ok_or_else(|| FsError::not_found(path))?;
        let len = file.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(len - offset) as usize;
        let start = offset as usize;
        buf[..n].copy_from_slice(&file.data[start..start + n]);
        Ok(n)
    }

    fn write(&self, path: &str, buf: &[u8], offset: u64, _fh: Option<FileHandle>)
        -> FsResult<usize> {
        let mut state = self.lock();
        let used = state.used();
        let avail = self.capacity.saturating_sub(used);
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        let end = offset + buf.len() as u64;
        let growth = end.saturating_sub(file.data.len() as u64);
        let n = if growth > avail {
            let over = (growth - avail) as usize;
            buf.len().saturating_sub(over)
        } else {
            buf.len()
        };
        if n == 0 {
            return Err(FsError::NoSpace);
        }
        let write_end = offset as usize + n;
        if write_end > file.data.len() {
            file.data.resize(write_end, 0);
        }
        file.data[offset as usize..write_end].copy_from_slice(&buf[..n]);
        file.mtime = TimeSpec::now();
        file.ctime = file.mtime;
        Ok(n)
    }

    fn statfs(&self, _path: &str) -> FsResult<VfsStats> {
        let state = self.lock();
        let free = self.capacity.saturating_sub(state.used());
        Ok(VfsStats {
            bsize: MEM_BSIZE,
            frsize: MEM_BSIZE,
            blocks: self.capacity / MEM_BSIZE,
            bfree: free / MEM_BSIZE,
            bavail: free / MEM_BSIZE,
            files: state.files.len() as u64,
            ffree: u32::MAX as u64,
            favail: u32::MAX as u64,
            ..Default::default()
        })
    }

    fn release(&self, _path: &str, fh: Option<FileHandle>) -> FsResult<()> {
        if let Some(fh) = fh {
            self.lock().opens.remove(&fh);
        }
        Ok(())
    }

    fn fsync(&self, path: &str, _datasync: bool, _fh: Option<FileHandle>) -> FsResult<()> {
        let state = self.lock();
        if state.files.contains_key(path) {
            Ok(())
        } else {
            Err(FsError::not_found(path))
        }
    }

    fn fallocate(
        &self,
        path: &str,
        mode: i32,
        offset: u64,
        length: u64,
        fh: Option<FileHandle>,
    ) -> FsResult<()> {
        if mode != 0 {
            return Err(FsError::not_supported("fallocate mode"));
        }
        let wanted = offset + length;
        let current = self.getattr(path, fh)?.size;
        if wanted > current {
            self.truncate(path, wanted, fh)?;
        }
        Ok(())
    }

    fn lseek(&self, path: &str, offset: i64, whence: i32, _fh: Option<FileHandle>)
        -> FsResult<i64> {
        let state = self.lock();
        let file = state.files.get(path).ok_or_else(|| FsError::not_found(path))?;
        let len = file.data.len() as i64;
        match whence {
            libc::SEEK_DATA => Ok(offset),
            libc::SEEK_HOLE | libc::SEEK_END => Ok(len),
            libc::SEEK_SET | libc::SEEK_CUR => Ok(offset),
            _ => Err(FsError::invalid("lseek whence")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller() -> Caller {
        Caller::new(1000, 1000)
    }

    #[test]
    fn create_then_stat_reports_empty_file() {
        let leaf = MemLeaf::new(1024);
        leaf.create("/a.chunk", 0o644, 0, caller()).unwrap();
        let stat = leaf.getattr("/a.chunk", None).unwrap();
        assert_eq!(stat.size, 0);
        assert_eq!(stat.mode & 0o7777, 0o644);
        assert_eq!(stat.uid, 1000);
    }

    #[test]
    fn write_and_read_round_trip() {
        let leaf = MemLeaf::new(1024);
        leaf.create("/a.chunk", 0o644, 0, caller()).unwrap();
        assert_eq!(leaf.write("/a.chunk", b"hello", 0, None).unwrap(), 5);
        let mut buf = [0u8; 16];
        let n = leaf.read("/a.chunk", &mut buf, 0, None).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn write_past_capacity_is_short() {
        let leaf = MemLeaf::new(4);
        leaf.create("/b.chunk", 0o644, 0, caller()).unwrap();
        assert_eq!(leaf.write("/b.chunk", b"HELLOWORLD", 0, None).unwrap(), 4);
        assert_eq!(leaf.contents("/b.chunk").unwrap(), b"HELL");
    }

    #[test]
    fn write_with_no_room_reports_enospc() {
        let leaf = MemLeaf::new(4);
        leaf.create("/b.chunk", 0o644, 0, caller()).unwrap();
        leaf.write("/b.chunk", b"HELL", 0, None).unwrap();
        let err = leaf.write("/b.chunk", b"OW", 4, None).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOSPC);
    }

    #[test]
    fn overwrite_in_place_needs_no_new_space() {
        let leaf = MemLeaf::new(4);
        leaf.create("/c.chunk", 0o644, 0, caller()).unwrap();
        leaf.write("/c.chunk", b"abcd", 0, None).unwrap();
        assert_eq!(leaf.write("/c.chunk", b"XY", 1, None).unwrap(), 2);
        assert_eq!(leaf.contents("/c.chunk").unwrap(), b"aXYd");
    }

    #[test]
    fn read_past_end_returns_zero() {
        let leaf = MemLeaf::new(64);
        leaf.create("/d.chunk", 0o644, 0, caller()).unwrap();
        leaf.write("/d.chunk", b"xyz", 0, None).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(leaf.read("/d.chunk", &mut buf, 10, None).unwrap(), 0);
    }

    #[test]
    fn unlink_reclaims_space() {
        let leaf = MemLeaf::new(8);
        leaf.create("/e.chunk", 0o644, 0, caller()).unwrap();
        leaf.write("/e.chunk", b"12345678", 0, None).unwrap();
        leaf.unlink("/e.chunk").unwrap();
        assert_eq!(leaf.bytes_used(), 0);
        leaf.create("/f.chunk", 0o644, 0, caller()).unwrap();
        assert_eq!(leaf.write("/f.chunk", b"12345678", 0, None).unwrap(), 8);
    }

    #[test]
    fn truncate_shrinks_and_grows() {
        let leaf = MemLeaf::new(16);
        leaf.create("/g.chunk", 0o644, 0, caller()).unwrap();
        leaf.write("/g.chunk", b"0123456789", 0, None).unwrap();
        leaf.truncate("/g.chunk", 4, None).unwrap();
        assert_eq!(leaf.contents("/g.chunk").unwrap(), b"0123");
        leaf.truncate("/g.chunk", 6, None).unwrap();
        assert_eq!(leaf.contents("/g.chunk").unwrap(), b"0123\0\0");
    }

    #[test]
    fn truncate_past_capacity_fails() {
        let leaf = MemLeaf::new(4);
        leaf.create("/h.chunk", 0o644, 0, caller()).unwrap();
        let err = leaf.truncate("/h.chunk", 100, None).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOSPC);
    }

    #[test]
    fn open_with_trunc_clears_contents() {
        let leaf = MemLeaf::new(64);
        leaf.create("/i.chunk", 0o644, 0, caller()).unwrap();
        leaf.write("/i.chunk", b"data", 0, None).unwrap();
        let fh = leaf.open("/i.chunk", libc::O_WRONLY | libc::O_TRUNC).unwrap();
        assert_eq!(leaf.contents("/i.chunk").unwrap(), b"");
        leaf.release("/i.chunk", Some(fh)).unwrap();
    }

    #[test]
    fn statfs_reports_capacity_in_512_blocks() {
        let leaf = MemLeaf::new(4096);
        let stats = leaf.statfs("/").unwrap();
        assert_eq!(stats.bsize, 512);
        assert_eq!(stats.blocks, 8);
        assert_eq!(stats.bfree, 8);
    }

    #[test]
    fn statfs_free_shrinks_with_use() {
        let leaf = MemLeaf::new(4096);
        leaf.create("/j.chunk", 0o644, 0, caller()).unwrap();
        leaf.write("/j.chunk", &[7u8; 1024], 0, None).unwrap();
        let stats = leaf.statfs("/").unwrap();
        assert_eq!(stats.bfree, 6);
    }

    #[test]
    fn create_can_be_made_to_fail_on_demand() {
        let leaf = MemLeaf::new(64);
        leaf.set_fail_creates(true);
        let err = leaf.create("/x.chunk", 0o644, 0, caller()).unwrap_err();
        assert_eq!(err.to_errno(), libc::EIO);
        leaf.set_fail_creates(false);
        leaf.create("/x.chunk", 0o644, 0, caller()).unwrap();
    }

    #[test]
    fn fallocate_nonzero_mode_rejected() {
        let leaf = MemLeaf::new(64);
        leaf.create("/k.chunk", 0o644, 0, caller()).unwrap();
        let err = leaf.fallocate("/k.chunk", 1, 0, 8, None).unwrap_err();
        assert_eq!(err.to_errno(), libc::EOPNOTSUPP);
    }
}
