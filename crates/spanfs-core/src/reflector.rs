//! The directory-reflecting leaf: proxies every operation onto an on-disk
//! directory by prefixing the leaf's root onto the logical path.

use std::collections::HashMap;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, DirEntryExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::types::{
    Caller, DirEntry, FileHandle, FileKind, FileStat, RenameMode, TimeSpec, TimeUpdate, VfsStats,
};

/// Alignment required for buffers handed to direct-I/O reads and writes.
const DIRECT_IO_ALIGN: usize = 512;

/// A leaf backed by a host directory. The configured root must be an
/// absolute path to an existing directory.
#[derive(Debug)]
pub struct DirReflector {
    root: PathBuf,
    // Flags of live opens, so positional I/O can tell direct-I/O handles
    // apart. This is the only state the reflector keeps.
    open_flags: Mutex<HashMap<FileHandle, i32>>,
}

/// Closes a raw fd on scope exit unless it was borrowed from an open handle.
struct FdGuard {
    fd: i32,
    owned: bool,
}

impl Drop for FdGuard {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

fn last_errno<T>() -> FsResult<T> {
    let errno = std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EIO);
    Err(FsError::from_errno(errno))
}

fn stat_from_metadata(meta: &fs::Metadata) -> FileStat {
    FileStat {
        size: meta.size(),
        mode: meta.mode(),
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        atime: TimeSpec::new(meta.atime(), meta.atime_nsec() as u32),
        mtime: TimeSpec::new(meta.mtime(), meta.mtime_nsec() as u32),
        ctime: TimeSpec::new(meta.ctime(), meta.ctime_nsec() as u32),
    }
}

fn kind_from_file_type(ft: fs::FileType) -> FileKind {
    if ft.is_file() {
        FileKind::RegularFile
    } else if ft.is_dir() {
        FileKind::Directory
    } else if ft.is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::Other
    }
}

/// 512-byte-aligned scratch buffer for direct I/O bounces.
struct AlignedBuf {
    ptr: *mut u8,
    layout: std::alloc::Layout,
}

impl AlignedBuf {
    fn new(len: usize) -> FsResult<Self> {
        let layout = std::alloc::Layout::from_size_align(len.max(1), DIRECT_IO_ALIGN)
            .map_err(|_| FsError::invalid("direct I/O buffer layout"))?;
        let ptr = unsafe { std::alloc::alloc(layout) };
        if ptr.is_null() {
            return Err(FsError::OutOfMemory);
        }
        Ok(AlignedBuf { ptr, layout })
    }

    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        unsafe { std::alloc::dealloc(self.ptr, self.layout) }
    }
}

impl DirReflector {
    pub fn new(root: impl Into<PathBuf>) -> FsResult<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(FsError::invalid(format!(
                "leaf root must be absolute: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(FsError::invalid(format!(
                "leaf root must be an existing directory: {}",
                root.display()
            )));
        }
        debug!(root = %root.display(), "leaf attached");
        Ok(DirReflector {
            root,
            open_flags: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn c_path(&self, path: &str) -> FsResult<CString> {
        CString::new(self.full(path).as_os_str().as_bytes())
            .map_err(|_| FsError::invalid("path contains an interior NUL"))
    }

    fn flags_of(&self, fh: FileHandle) -> i32 {
        self.open_flags
            .lock()
            .map(|m| m.get(&fh).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn remember_open(&self, fd: i32, flags: i32) {
        if let Ok(mut m) = self.open_flags.lock() {
            m.insert(fd as FileHandle, flags);
        }
    }

    /// Borrow the open handle's fd, or open the path transiently.
    fn fd_for(&self, path: &str, fh: Option<FileHandle>, fallback_flags: i32) -> FsResult<FdGuard> {
        match fh {
            Some(fh) => Ok(FdGuard {
                fd: fh as i32,
                owned: false,
            }),
            None => {
                let cpath = self.c_path(path)?;
                let fd = unsafe { libc::open(cpath.as_ptr(), fallback_flags) };
                if fd < 0 {
                    return last_errno();
                }
                Ok(FdGuard { fd, owned: true })
            }
        }
    }

    fn is_direct(&self, fh: Option<FileHandle>) -> bool {
        fh.map(|fh| self.flags_of(fh) & libc::O_DIRECT != 0)
            .unwrap_or(false)
    }
}

impl FileSystem for DirReflector {
    fn getattr(&self, path: &str, _fh: Option<FileHandle>) -> FsResult<FileStat> {
        let meta = fs::symlink_metadata(self.full(path))?;
        Ok(stat_from_metadata(&meta))
    }

    fn readlink(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let target = fs::read_link(self.full(path))?;
        let bytes = target.as_os_str().as_bytes();
        let n = bytes.len().min(buf.len() - 1);
        buf[..n].copy_from_slice(&bytes[..n]);
        buf[n] = 0;
        Ok(n)
    }

    fn mknod(&self, path: &str, mode: u32, rdev: u64) -> FsResult<()> {
        let cpath = self.c_path(path)?;
        let res = unsafe { libc::mknod(cpath.as_ptr(), mode, rdev as libc::dev_t) };
        if res < 0 {
            return last_errno();
        }
        Ok(())
    }

    fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        fs::DirBuilder::new().mode(mode).create(self.full(path))?;
        Ok(())
    }

    fn rmdir(&self, path: &str) -> FsResult<()> {
        fs::remove_dir(self.full(path))?;
        Ok(())
    }

    fn symlink(&self, target: &str, link_path: &str, _caller: Caller) -> FsResult<()> {
        std::os::unix::fs::symlink(self.full(target), self.full(link_path))?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str, mode: RenameMode) -> FsResult<()> {
        if mode != RenameMode::Replace {
            return Err(FsError::invalid("rename flags on a reflector leaf"));
        }
        fs::rename(self.full(from), self.full(to))?;
        Ok(())
    }

    fn link(&self, from: &str, to: &str) -> FsResult<()> {
        fs::hard_link(self.full(from), self.full(to))?;
        Ok(())
    }

    fn access(&self, path: &str, mask: i32) -> FsResult<()> {
        let cpath = self.c_path(path)?;
        let res = unsafe { libc::access(cpath.as_ptr(), mask) };
        if res < 0 {
            return last_errno();
        }
        Ok(())
    }

    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
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
        for entry in fs::read_dir(self.full(path))? {
            let entry = entry?;
            let kind = entry.file_type().map(kind_from_file_type).unwrap_or(FileKind::Other);
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                ino: entry.ino(),
                kind,
            });
        }
        Ok(entries)
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        fs::remove_file(self.full(path))?;
        Ok(())
    }

    fn chmod(&self, path: &str, mode: u32, _fh: Option<FileHandle>) -> FsResult<()> {
        fs::set_permissions(self.full(path), fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    fn chown(&self, path: &str, uid: u32, gid: u32, _fh: Option<FileHandle>) -> FsResult<()> {
        let cpath = self.c_path(path)?;
        let res = unsafe { libc::lchown(cpath.as_ptr(), uid, gid) };
        if res < 0 {
            return last_errno();
        }
        Ok(())
    }

    fn truncate(&self, path: &str, size: u64, fh: Option<FileHandle>) -> FsResult<()> {
        let res = match fh {
            Some(fh) => unsafe { libc::ftruncate(fh as i32, size as libc::off_t) },
            None => {
                let cpath = self.c_path(path)?;
                unsafe { libc::truncate(cpath.as_ptr(), size as libc::off_t) }
            }
        };
        if res < 0 {
            return last_errno();
        }
        Ok(())
    }

    fn utimens(
        &self,
        path: &str,
        atime: TimeUpdate,
        mtime: TimeUpdate,
        _fh: Option<FileHandle>,
    ) -> FsResult<()> {
        fn to_timespec(update: TimeUpdate) -> libc::timespec {
            let (sec, nsec) = match update {
                TimeUpdate::Now => (0, libc::UTIME_NOW),
                TimeUpdate::Omit => (0, libc::UTIME_OMIT),
                TimeUpdate::Set(t) => (t.secs, t.nanos as libc::c_long),
            };
            libc::timespec {
                tv_sec: sec,
                tv_nsec: nsec,
            }
        }
        let times = [to_timespec(atime), to_timespec(mtime)];
        let cpath = self.c_path(path)?;
        // utime/utimes would follow symlinks; utimensat can be told not to.
        let res = unsafe {
            libc::utimensat(libc::AT_FDCWD, cpath.as_ptr(), times.as_ptr(), libc::AT_SYMLINK_NOFOLLOW)
        };
        if res < 0 {
            return last_errno();
        }
        Ok(())
    }

    fn open(&self, path: &str, flags: i32) -> FsResult<FileHandle> {
        let cpath = self.c_path(path)?;
        let fd = unsafe { libc::open(cpath.as_ptr(), flags) };
        if fd < 0 {
            return last_errno();
        }
        self.remember_open(fd, flags);
        Ok(fd as FileHandle)
    }

    fn create(&self, path: &str, mode: u32, flags: i32, _caller: Caller) -> FsResult<FileHandle> {
        let cpath = self.c_path(path)?;
        let fd = unsafe { libc::open(cpath.as_ptr(), flags | libc::O_CREAT, mode as libc::c_uint) };
        if fd < 0 {
            return last_errno();
        }
        self.remember_open(fd, flags);
        Ok(fd as FileHandle)
    }

    fn read(&self, path: &str, buf: &mut [u8], offset: u64, fh: Option<FileHandle>)
        -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let guard = self.fd_for(path, fh, libc::O_RDONLY)?;
        let res = if self.is_direct(fh) {
            let bounce = AlignedBuf::new(buf.len())?;
            let res = unsafe {
                libc::pread(
                    guard.fd,
                    bounce.as_ptr() as *mut libc::c_void,
                    buf.len(),
                    offset as libc::off_t,
                )
            };
            if res > 0 {
                unsafe {
                    std::ptr::copy_nonoverlapping(bounce.as_ptr(), buf.as_mut_ptr(), res as usize)
                };
            }
            res
        } else {
            unsafe {
                libc::pread(
                    guard.fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    offset as libc::off_t,
                )
            }
        };
        if res < 0 {
            return last_errno();
        }
        Ok(res as usize)
    }

    fn write(&self, path: &str, buf: &[u8], offset: u64, fh: Option<FileHandle>)
        -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let guard = self.fd_for(path, fh, libc::O_WRONLY)?;
        let res = if self.is_direct(fh) {
            let bounce = AlignedBuf::new(buf.len())?;
            unsafe {
                std::ptr::copy_nonoverlapping(buf.as_ptr(), bounce.as_ptr(), buf.len());
                libc::pwrite(
                    guard.fd,
                    bounce.as_ptr() as *const libc::c_void,
                    buf.len(),
                    offset as libc::off_t,
                )
            }
        } else {
            unsafe {
                libc::pwrite(
                    guard.fd,
                    buf.as_ptr() as *const libc::c_void,
                    buf.len(),
                    offset as libc::off_t,
                )
            }
        };
        if res < 0 {
            return last_errno();
        }
        Ok(res as usize)
    }

    fn statfs(&self, path: &str) -> FsResult<VfsStats> {
        let cpath = self.c_path(path)?;
        let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
        let res = unsafe { libc::statvfs(cpath.as_ptr(), &mut st) };
        if res < 0 {
            return last_errno();
        }
        Ok(VfsStats {
            bsize: st.f_bsize as u64,
            frsize: st.f_frsize as u64,
            blocks: st.f_blocks as u64,
            bfree: st.f_bfree as u64,
            bavail: st.f_bavail as u64,
            files: st.f_files as u64,
            ffree: st.f_ffree as u64,
            favail: st.f_favail as u64,
            fsid: st.f_fsid as u64,
            namemax: st.f_namemax as u64,
        })
    }

    fn release(&self, _path: &str, fh: Option<FileHandle>) -> FsResult<()> {
        let Some(fh) = fh else {
            return Ok(());
        };
        if let Ok(mut m) = self.open_flags.lock() {
            m.remove(&fh);
        }
        unsafe {
            libc::close(fh as i32);
        }
        Ok(())
    }

    fn fsync(&self, path: &str, datasync: bool, fh: Option<FileHandle>) -> FsResult<()> {
        let guard = self.fd_for(path, fh, libc::O_WRONLY)?;
        let res = unsafe {
            if datasync {
                libc::fdatasync(guard.fd)
            } else {
                libc::fsync(guard.fd)
            }
        };
        if res < 0 {
            return last_errno();
        }
        Ok(())
    }

    fn fallocate(
        &self,
        path: &str,
        mode: i32,
        offset: u64,
        length: u64,
        fh: Option<FileHandle>,
    ) -> FsResult<()> {
        // Only plain allocation is supported; punch/zero modes are not.
        if mode != 0 {
            return Err(FsError::not_supported("fallocate mode"));
        }
        let guard = self.fd_for(path, fh, libc::O_WRONLY)?;
        let res = unsafe {
            libc::posix_fallocate(guard.fd, offset as libc::off_t, length as libc::off_t)
        };
        if res != 0 {
            return Err(FsError::from_errno(res));
        }
        Ok(())
    }

    fn lseek(&self, path: &str, offset: i64, whence: i32, fh: Option<FileHandle>) -> FsResult<i64> {
        let guard = self.fd_for(path, fh, libc::O_RDONLY)?;
        let res = unsafe { libc::lseek(guard.fd, offset as libc::off_t, whence) };
        if res < 0 {
            return last_errno();
        }
        Ok(res)
    }
}
