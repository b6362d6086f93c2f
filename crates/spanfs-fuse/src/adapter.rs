//! The FUSE operation table: thin pass-throughs from `fuser` callbacks into
//! the federation's path-keyed surface.
//!
//! Each entry resolves the kernel's inode number to a logical path, invokes
//! the core, and translates failures through `FsError::to_errno` into the
//! reply's errno slot. No filesystem logic lives here.

use std::ffi::OsStr;
use std::os::raw::c_int;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyLseek, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use tracing::debug;

use spanfs_core::{
    Caller, FileKind, FileStat, FileSystem, FsError, LeafRef, RenameMode, TimeSpec, TimeUpdate,
};

use crate::path_table::{PathTable, ROOT_INO};

const TTL: Duration = Duration::from_secs(1);

pub struct SpanFuse {
    fs: LeafRef,
    paths: PathTable,
}

fn file_kind_to_fuser(kind: FileKind) -> FileType {
    match kind {
        FileKind::RegularFile => FileType::RegularFile,
        FileKind::Directory => FileType::Directory,
        FileKind::Symlink => FileType::Symlink,
        FileKind::Other => FileType::RegularFile,
    }
}

fn blocks_for_size(size: u64) -> u64 {
    size.div_ceil(512)
}

fn timespec_to_system(t: TimeSpec) -> SystemTime {
    UNIX_EPOCH
        + Duration::from_secs(t.secs.max(0) as u64)
        + Duration::from_nanos(t.nanos as u64)
}

fn system_to_timespec(t: SystemTime) -> TimeSpec {
    let d = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    TimeSpec::new(d.as_secs() as i64, d.subsec_nanos())
}

fn time_or_now(t: Option<TimeOrNow>) -> TimeUpdate {
    match t {
        None => TimeUpdate::Omit,
        Some(TimeOrNow::Now) => TimeUpdate::Now,
        Some(TimeOrNow::SpecificTime(t)) => TimeUpdate::Set(system_to_timespec(t)),
    }
}

fn stat_to_attr(stat: &FileStat, ino: u64) -> fuser::FileAttr {
    fuser::FileAttr {
        ino,
        size: stat.size,
        blocks: blocks_for_size(stat.size),
        atime: timespec_to_system(stat.atime),
        mtime: timespec_to_system(stat.mtime),
        ctime: timespec_to_system(stat.ctime),
        crtime: UNIX_EPOCH,
        kind: file_kind_to_fuser(stat.kind()),
        perm: (stat.mode & 0o7777) as u16,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

fn caller_of(req: &Request<'_>) -> Caller {
    Caller::new(req.uid(), req.gid())
}

fn child_path(name: &OsStr) -> String {
    format!("/{}", name.to_string_lossy())
}

impl SpanFuse {
    pub fn new(fs: LeafRef) -> Self {
        SpanFuse {
            fs,
            paths: PathTable::new(),
        }
    }

    fn resolve(&self, ino: u64) -> Result<String, i32> {
        self.paths
            .path_of(ino)
            .map(str::to_string)
            .ok_or(libc::ENOENT)
    }

    fn attr_for(&mut self, path: &str, fh: Option<u64>) -> Result<fuser::FileAttr, FsError> {
        let stat = self.fs.getattr(path, fh)?;
        let ino = self.paths.intern(path);
        Ok(stat_to_attr(&stat, ino))
    }
}

impl Filesystem for SpanFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        debug!("spanfs session started");
        Ok(())
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let path = child_path(name);
        debug!(path, "lookup");
        match self.attr_for(&path, None) {
            Ok(attr) => {
                self.paths.remember_lookup(attr.ino);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.paths.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, fh: Option<u64>, reply: ReplyAttr) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.getattr(&path, fh) {
            Ok(stat) => reply.attr(&TTL, &stat_to_attr(&stat, ino)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        debug!(path, ?mode, ?uid, ?gid, ?size, "setattr");

        if let Some(mode) = mode {
            if let Err(e) = self.fs.chmod(&path, mode, fh) {
                return reply.error(e.to_errno());
            }
        }
        if uid.is_some() || gid.is_some() {
            let current = match self.fs.getattr(&path, fh) {
                Ok(stat) => stat,
                Err(e) => return reply.error(e.to_errno()),
            };
            let res = self.fs.chown(
                &path,
                uid.unwrap_or(current.uid),
                gid.unwrap_or(current.gid),
                fh,
            );
            if let Err(e) = res {
                return reply.error(e.to_errno());
            }
        }
        if let Some(size) = size {
            if let Err(e) = self.fs.truncate(&path, size, fh) {
                return reply.error(e.to_errno());
            }
        }
        if atime.is_some() || mtime.is_some() {
            let res = self
                .fs
                .utimens(&path, time_or_now(atime), time_or_now(mtime), fh);
            if let Err(e) = res {
                return reply.error(e.to_errno());
            }
        }

        match self.fs.getattr(&path, fh) {
            Ok(stat) => reply.attr(&TTL, &stat_to_attr(&stat, ino)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let mut buf = vec![0u8; libc::PATH_MAX as usize];
        match self.fs.readlink(&path, &mut buf) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let path = child_path(name);
        match self.fs.mknod(&path, mode, rdev as u64) {
            Ok(()) => match self.attr_for(&path, None) {
                Ok(attr) => {
                    self.paths.remember_lookup(attr.ino);
                    reply.entry(&TTL, &attr, 0);
                }
                Err(e) => reply.error(e.to_errno()),
            },
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let path = child_path(name);
        match self.fs.mkdir(&path, mode) {
            Ok(()) => match self.attr_for(&path, None) {
                Ok(attr) => {
                    self.paths.remember_lookup(attr.ino);
                    reply.entry(&TTL, &attr, 0);
                }
                Err(e) => reply.error(e.to_errno()),
            },
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let path = child_path(name);
        debug!(path, "unlink");
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.paths.unbind(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let path = child_path(name);
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.paths.unbind(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn symlink(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let path = child_path(link_name);
        let target = target.to_string_lossy();
        debug!(path, %target, "symlink");
        match self.fs.symlink(&target, &path, caller_of(req)) {
            Ok(()) => match self.attr_for(&path, None) {
                Ok(attr) => {
                    self.paths.remember_lookup(attr.ino);
                    reply.entry(&TTL, &attr, 0);
                }
                Err(e) => reply.error(e.to_errno()),
            },
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        if parent != ROOT_INO || newparent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let from = child_path(name);
        let to = child_path(newname);
        let mode = match RenameMode::from_flags(flags) {
            Ok(mode) => mode,
            Err(e) => return reply.error(e.to_errno()),
        };
        debug!(from, to, ?mode, "rename");
        match self.fs.rename(&from, &to, mode) {
            Ok(()) => {
                match mode {
                    RenameMode::Exchange => self.paths.exchange(&from, &to),
                    _ => self.paths.rebind(&from, &to),
                }
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        if newparent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let from = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let to = child_path(newname);
        debug!(from, to, "link");
        match self.fs.link(&from, &to) {
            Ok(()) => match self.attr_for(&to, None) {
                Ok(attr) => {
                    self.paths.remember_lookup(attr.ino);
                    reply.entry(&TTL, &attr, 0);
                }
                Err(e) => reply.error(e.to_errno()),
            },
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        debug!(path, flags, "open");
        match self.fs.open(&path, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let mut buf = vec![0u8; size as usize];
        match self.fs.read(&path, &mut buf, offset.max(0) as u64, Some(fh)) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.write(&path, data, offset.max(0) as u64, Some(fh)) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        debug!(path, fh, "release");
        match self.fs.release(&path, Some(fh)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.fsync(&path, datasync, Some(fh)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.resolve(ino) {
            Ok(path) if path == "/" => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(e) => reply.error(e),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let entries = match self.fs.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.to_errno()),
        };
        for (i, entry) in entries.iter().enumerate().skip(offset.max(0) as usize) {
            let entry_ino = match entry.name.as_str() {
                "." | ".." => ROOT_INO,
                name => self.paths.intern(&format!("/{name}")),
            };
            let kind = file_kind_to_fuser(entry.kind);
            if reply.add(entry_ino, (i + 1) as i64, kind, &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let path = self.resolve(ino).unwrap_or_else(|_| "/".to_string());
        match self.fs.statfs(&path) {
            Ok(s) => reply.statfs(
                s.blocks,
                s.bfree,
                s.bavail,
                s.files,
                s.ffree,
                s.bsize as u32,
                s.namemax as u32,
                s.frsize as u32,
            ),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.access(&path, mask) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        if parent != ROOT_INO {
            reply.error(libc::ENOENT);
            return;
        }
        let path = child_path(name);
        let effective_mode = mode & !umask;
        debug!(path, mode = format_args!("{effective_mode:o}"), flags, "create");
        match self.fs.create(&path, effective_mode, flags, caller_of(req)) {
            Ok(fh) => match self.attr_for(&path, Some(fh)) {
                Ok(attr) => {
                    self.paths.remember_lookup(attr.ino);
                    reply.created(&TTL, &attr, 0, fh, flags as u32);
                }
                Err(e) => reply.error(e.to_errno()),
            },
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn fallocate(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        length: i64,
        mode: i32,
        reply: ReplyEmpty,
    ) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.fallocate(
            &path,
            mode,
            offset.max(0) as u64,
            length.max(0) as u64,
            Some(fh),
        ) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn lseek(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        whence: i32,
        reply: ReplyLseek,
    ) {
        let path = match self.resolve(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.lseek(&path, offset, whence, Some(fh)) {
            Ok(off) => reply.offset(off),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_to_attr_carries_identity_through() {
        let stat = FileStat {
            size: 1500,
            mode: libc::S_IFREG | 0o640,
            nlink: 2,
            uid: 10,
            gid: 20,
            atime: TimeSpec::new(100, 0),
            mtime: TimeSpec::new(200, 0),
            ctime: TimeSpec::new(300, 0),
        };
        let attr = stat_to_attr(&stat, 7);
        assert_eq!(attr.ino, 7);
        assert_eq!(attr.size, 1500);
        assert_eq!(attr.blocks, 3);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm, 0o640);
        assert_eq!(attr.nlink, 2);
        assert_eq!(attr.uid, 10);
        assert_eq!(attr.gid, 20);
    }

    #[test]
    fn symlink_stat_maps_to_symlink_type() {
        let stat = FileStat {
            size: 8,
            mode: libc::S_IFLNK | 0o777,
            nlink: 1,
            uid: 0,
            gid: 0,
            atime: TimeSpec::default(),
            mtime: TimeSpec::default(),
            ctime: TimeSpec::default(),
        };
        assert_eq!(stat_to_attr(&stat, 2).kind, FileType::Symlink);
    }

    #[test]
    fn time_or_now_mapping() {
        assert_eq!(time_or_now(None), TimeUpdate::Omit);
        assert_eq!(time_or_now(Some(TimeOrNow::Now)), TimeUpdate::Now);
        let t = UNIX_EPOCH + Duration::from_secs(42);
        assert_eq!(
            time_or_now(Some(TimeOrNow::SpecificTime(t))),
            TimeUpdate::Set(TimeSpec::new(42, 0))
        );
    }

    #[test]
    fn blocks_round_up() {
        assert_eq!(blocks_for_size(0), 0);
        assert_eq!(blocks_for_size(1), 1);
        assert_eq!(blocks_for_size(512), 1);
        assert_eq!(blocks_for_size(513), 2);
    }

    #[test]
    fn child_path_prefixes_root() {
        assert_eq!(child_path(OsStr::new("file.txt")), "/file.txt");
    }
}
