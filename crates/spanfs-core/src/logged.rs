//! Operation logging, as a pass-through decorator.
//!
//! When the mount is configured with a log file, every operation entering
//! the stack is recorded as one line naming the operation and its salient
//! arguments before being forwarded unchanged. Log write failures never
//! affect the operation outcome.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::FsResult;
use crate::fs::{FileSystem, LeafRef};
use crate::types::{
    Caller, DirEntry, FileHandle, FileStat, RenameMode, TimeUpdate, VfsStats,
};

pub struct OpLogFs {
    inner: LeafRef,
    out: Mutex<BufWriter<File>>,
}

impl OpLogFs {
    pub fn new(inner: LeafRef, log_path: &Path) -> FsResult<Self> {
        let file = File::create(log_path)?;
        Ok(OpLogFs {
            inner,
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    fn record(&self, line: std::fmt::Arguments<'_>) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "spanfs: {line}");
            let _ = out.flush();
        }
    }
}

impl FileSystem for OpLogFs {
    fn getattr(&self, path: &str, fh: Option<FileHandle>) -> FsResult<FileStat> {
        self.record(format_args!("getattr, path {path}"));
        self.inner.getattr(path, fh)
    }

    fn readlink(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        self.record(format_args!("readlink, path {path}, size {}", buf.len()));
        self.inner.readlink(path, buf)
    }

    fn mknod(&self, path: &str, mode: u32, rdev: u64) -> FsResult<()> {
        self.record(format_args!("mknod, path {path}, mode 0{mode:o}"));
        self.inner.mknod(path, mode, rdev)
    }

    fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        self.record(format_args!("mkdir, path {path}, mode 0{mode:o}"));
        self.inner.mkdir(path, mode)
    }

    fn rmdir(&self, path: &str) -> FsResult<()> {
        self.record(format_args!("rmdir, path {path}"));
        self.inner.rmdir(path)
    }

    fn symlink(&self, target: &str, link_path: &str, caller: Caller) -> FsResult<()> {
        self.record(format_args!("symlink, from {target}, to {link_path}"));
        self.inner.symlink(target, link_path, caller)
    }

    fn rename(&self, from: &str, to: &str, mode: RenameMode) -> FsResult<()> {
        self.record(format_args!("rename, from {from}, to {to}, mode {mode:?}"));
        self.inner.rename(from, to, mode)
    }

    fn link(&self, from: &str, to: &str) -> FsResult<()> {
        self.record(format_args!("link, from {from}, to {to}"));
        self.inner.link(from, to)
    }

    fn access(&self, path: &str, mask: i32) -> FsResult<()> {
        self.record(format_args!("access, path {path}, mask 0{mask:o}"));
        self.inner.access(path, mask)
    }

    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        self.record(format_args!("readdir, path {path}"));
        self.inner.readdir(path)
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        self.record(format_args!("unlink, path {path}"));
        self.inner.unlink(path)
    }

    fn chmod(&self, path: &str, mode: u32, fh: Option<FileHandle>) -> FsResult<()> {
        self.record(format_args!("chmod, path {path}, mode 0{mode:o}, fh {fh:?}"));
        self.inner.chmod(path, mode, fh)
    }

    fn chown(&self, path: &str, uid: u32, gid: u32, fh: Option<FileHandle>) -> FsResult<()> {
        self.record(format_args!("chown, path {path}, uid {uid}, gid {gid}, fh {fh:?}"));
        self.inner.chown(path, uid, gid, fh)
    }

    fn truncate(&self, path: &str, size: u64, fh: Option<FileHandle>) -> FsResult<()> {
        self.record(format_args!("truncate, path {path}, size {size}, fh {fh:?}"));
        self.inner.truncate(path, size, fh)
    }

    fn utimens(
        &self,
        path: &str,
        atime: TimeUpdate,
        mtime: TimeUpdate,
        fh: Option<FileHandle>,
    ) -> FsResult<()> {
        self.record(format_args!("utimens, path {path}, atime {atime:?}, mtime {mtime:?}"));
        self.inner.utimens(path, atime, mtime, fh)
    }

    fn open(&self, path: &str, flags: i32) -> FsResult<FileHandle> {
        self.record(format_args!("open, path {path}, flags 0{flags:o}"));
        self.inner.open(path, flags)
    }

    fn create(&self, path: &str, mode: u32, flags: i32, caller: Caller) -> FsResult<FileHandle> {
        self.record(format_args!("create, path {path}, mode 0{mode:o}, flags 0{flags:o}"));
        self.inner.create(path, mode, flags, caller)
    }

    fn read(&self, path: &str, buf: &mut [u8], offset: u64, fh: Option<FileHandle>)
        -> FsResult<usize> {
        self.record(format_args!(
            "read, path {path}, size {}, off {offset}, fh {fh:?}",
            buf.len()
        ));
        self.inner.read(path, buf, offset, fh)
    }

    fn write(&self, path: &str, buf: &[u8], offset: u64, fh: Option<FileHandle>)
        -> FsResult<usize> {
        self.record(format_args!(
            "write, path {path}, size {}, off {offset}, fh {fh:?}",
            buf.len()
        ));
        self.inner.write(path, buf, offset, fh)
    }

    fn statfs(&self, path: &str) -> FsResult<VfsStats> {
        self.record(format_args!("statfs, path {path}"));
        self.inner.statfs(path)
    }

    fn release(&self, path: &str, fh: Option<FileHandle>) -> FsResult<()> {
        self.record(format_args!("release, path {path}, fh {fh:?}"));
        self.inner.release(path, fh)
    }

    fn fsync(&self, path: &str, datasync: bool, fh: Option<FileHandle>) -> FsResult<()> {
        self.record(format_args!("fsync, path {path}, datasync {datasync}"));
        self.inner.fsync(path, datasync, fh)
    }

    fn fallocate(
        &self,
        path: &str,
        mode: i32,
        offset: u64,
        length: u64,
        fh: Option<FileHandle>,
    ) -> FsResult<()> {
        self.record(format_args!(
            "fallocate, path {path}, mode {mode}, off {offset}, len {length}"
        ));
        self.inner.fallocate(path, mode, offset, length, fh)
    }

    fn lseek(&self, path: &str, offset: i64, whence: i32, fh: Option<FileHandle>) -> FsResult<i64> {
        self.record(format_args!("lseek, path {path}, off {offset}, whence {whence}"));
        self.inner.lseek(path, offset, whence, fh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemLeaf;
    use std::sync::Arc;

    fn caller() -> Caller {
        Caller::new(1000, 1000)
    }

    #[test]
    fn operations_are_recorded_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("ops.log");
        let inner: LeafRef = Arc::new(MemLeaf::new(64));
        let fs = OpLogFs::new(inner, &log_path).unwrap();

        let fh = fs.create("/a", 0o644, 0, caller()).unwrap();
        fs.write("/a", b"abc", 0, Some(fh)).unwrap();
        let mut buf = [0u8; 4];
        fs.read("/a", &mut buf, 0, Some(fh)).unwrap();
        fs.release("/a", Some(fh)).unwrap();
        fs.unlink("/a").unwrap();

        let log = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("spanfs: create, path /a"));
        assert!(lines[1].starts_with("spanfs: write, path /a, size 3, off 0"));
        assert!(lines[2].starts_with("spanfs: read, path /a"));
        assert!(lines[3].starts_with("spanfs: release, path /a"));
        assert!(lines[4].starts_with("spanfs: unlink, path /a"));
    }

    #[test]
    fn forwarding_preserves_results_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("ops.log");
        let inner: LeafRef = Arc::new(MemLeaf::new(64));
        let fs = OpLogFs::new(inner, &log_path).unwrap();

        let err = fs.getattr("/missing", None).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
        fs.create("/a", 0o600, 0, caller()).unwrap();
        assert_eq!(fs.getattr("/a", None).unwrap().mode & 0o7777, 0o600);
    }

    #[test]
    fn log_file_is_created_eagerly() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("ops.log");
        let inner: LeafRef = Arc::new(MemLeaf::new(64));
        let _fs = OpLogFs::new(inner, &log_path).unwrap();
        assert!(log_path.exists());
    }
}
