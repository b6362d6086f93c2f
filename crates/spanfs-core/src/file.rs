//! The striped-file engine.
//!
//! A striped file owns an ordered chunk list; each chunk is a single file on
//! one leaf, named after the logical path plus a fixed suffix. Writes grow
//! the file by sealing the current tail and enlisting the next leaf in the
//! federation's declaration order whenever a leaf runs out of room.

use std::sync::Arc;

use tracing::debug;

use crate::chunk::{covering_chunk, seal_tail, Chunk};
use crate::error::{FsError, FsResult};
use crate::fs::{FileSystem, LeafRef};
use crate::types::{Caller, FileHandle, FileStat, TimeSpec, TimeUpdate};

/// Suffix appended to the logical path to name per-chunk files on leaves.
/// Leaves cannot tell logical from physical namespaces apart, so the suffix
/// keeps chunk files clear of accidental collisions.
pub const CHUNK_SUFFIX: &str = ".chunk";

/// Metadata of a striped file, mirrored to every backing chunk on change.
#[derive(Debug, Clone, Copy)]
pub struct FileDesc {
    pub size: u64,
    pub owner_uid: u32,
    pub owner_gid: u32,
    pub mode: u32,
    pub open_flags: i32,
    pub atime: TimeSpec,
    pub mtime: TimeSpec,
    pub ctime: TimeSpec,
}

/// A logical regular file spread across leaves in chunk order.
pub struct StripedFile {
    chunk_path: String,
    leaves: Arc<[LeafRef]>,
    cursor: usize,
    chunks: Vec<Chunk>,
    desc: FileDesc,
}

impl StripedFile {
    /// A new, empty striped file. No chunk is materialized until the first
    /// write needs one.
    pub fn new(
        logical_path: &str,
        mode: u32,
        flags: i32,
        caller: Caller,
        leaves: Arc<[LeafRef]>,
    ) -> Self {
        let now = TimeSpec::now();
        StripedFile {
            chunk_path: format!("{logical_path}{CHUNK_SUFFIX}"),
            leaves,
            cursor: 0,
            chunks: Vec::new(),
            desc: FileDesc {
                size: 0,
                owner_uid: caller.uid,
                owner_gid: caller.gid,
                mode: libc::S_IFREG | (mode & 0o7777),
                open_flags: flags,
                atime: now,
                mtime: now,
                ctime: now,
            },
        }
    }

    pub fn desc(&self) -> &FileDesc {
        &self.desc
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk_path(&self) -> &str {
        &self.chunk_path
    }

    pub fn stat(&self, nlink: u32) -> FileStat {
        FileStat {
            size: self.desc.size,
            mode: self.desc.mode,
            nlink,
            uid: self.desc.owner_uid,
            gid: self.desc.owner_gid,
            atime: self.desc.atime,
            mtime: self.desc.mtime,
            ctime: self.desc.ctime,
        }
    }

    fn owner(&self) -> Caller {
        Caller::new(self.desc.owner_uid, self.desc.owner_gid)
    }

    fn touch_modified(&mut self) {
        let now = TimeSpec::now();
        self.desc.mtime = now;
        self.desc.ctime = now;
    }

    /// Open every chunk on its leaf, producing the per-open handle sequence.
    /// A leaf failure short-circuits; handles already opened are released.
    pub fn open(&mut self, flags: i32) -> FsResult<Vec<FileHandle>> {
        let mut fds = Vec::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            match chunk.leaf.open(&self.chunk_path, flags) {
                Ok(fd) => fds.push(fd),
                Err(e) => {
                    for (done, fd) in fds.into_iter().enumerate() {
                        let _ = self.chunks[done].leaf.release(&self.chunk_path, Some(fd));
                    }
                    return Err(e);
                }
            }
        }
        self.desc.open_flags = flags;
        if flags & libc::O_TRUNC != 0 && flags & (libc::O_WRONLY | libc::O_RDWR) != 0 {
            // The leaves have already truncated their chunk files on O_TRUNC.
            self.desc.size = 0;
            self.touch_modified();
        }
        Ok(fds)
    }

    /// Release every chunk's per-open handle. Chunks enlisted after the open
    /// have no handle in the sequence and need none.
    pub fn release(&mut self, fds: &[FileHandle]) -> FsResult<()> {
        for (idx, chunk) in self.chunks.iter().enumerate() {
            let fd = fds.get(idx).copied();
            chunk.leaf.release(&self.chunk_path, fd)?;
        }
        self.desc.open_flags = 0;
        Ok(())
    }

    pub fn read(
        &self,
        buf: &mut [u8],
        offset: u64,
        fds: Option<&[FileHandle]>,
    ) -> FsResult<usize> {
        let size = self.desc.size;
        let mut offset = offset.min(size);
        let mut remaining = (buf.len() as u64).min(size - offset);
        if remaining == 0 {
            return Ok(0);
        }

        let mut idx = covering_chunk(&self.chunks, offset);
        let mut done = 0usize;
        while remaining > 0 && idx < self.chunks.len() {
            let chunk = &self.chunks[idx];
            let span = chunk.span_from(offset, remaining) as usize;
            let fd = fds.and_then(|v| v.get(idx)).copied();
            let r = chunk
                .leaf
                .read(&self.chunk_path, &mut buf[done..done + span], offset - chunk.start, fd)?;
            done += r;
            offset += r as u64;
            remaining -= r as u64;
            if r < span {
                // Short read: that leaf holds no more bytes for this chunk.
                break;
            }
            idx += 1;
        }
        Ok(done)
    }

    pub fn write(
        &mut self,
        buf: &[u8],
        offset: u64,
        mut fds: Option<&mut Vec<FileHandle>>,
    ) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut offset = offset.min(self.desc.size);
        let initial = offset;
        let mut idx = covering_chunk(&self.chunks, offset);
        let mut done = 0usize;

        'place: while done < buf.len() {
            if idx >= self.chunks.len() {
                if self.cursor >= self.leaves.len() {
                    if done > 0 {
                        break 'place;
                    }
                    return Err(FsError::NoSpace);
                }
                let leaf = self.leaves[self.cursor].clone();
                self.cursor += 1;
                // A create failure surfaces verbatim, bytes already placed
                // in earlier chunks notwithstanding. Nothing was pushed
                // yet, so the chunk list needs no repair.
                let fd = leaf.create(
                    &self.chunk_path,
                    self.desc.mode & 0o7777,
                    self.desc.open_flags,
                    self.owner(),
                )?;
                seal_tail(&mut self.chunks, offset);
                self.chunks.push(Chunk::new_tail(offset, leaf));
                let chunk_index = self.chunks.len() - 1;
                debug!(
                    path = %self.chunk_path,
                    chunk = chunk_index,
                    start = offset,
                    "enlisted tail chunk"
                );
                match &mut fds {
                    // Keep the per-open sequence index-aligned with the
                    // chunk list; a stale sequence cannot adopt the handle.
                    Some(seq) if seq.len() == chunk_index => seq.push(fd),
                    _ => {
                        let _ = self.chunks[chunk_index]
                            .leaf
                            .release(&self.chunk_path, Some(fd));
                    }
                }
                idx = chunk_index;
            }

            let is_tail = idx == self.chunks.len() - 1;
            let chunk = &self.chunks[idx];
            let span = chunk.span_from(offset, (buf.len() - done) as u64) as usize;
            let fd = fds.as_deref().and_then(|v| v.get(idx)).copied();
            match chunk
                .leaf
                .write(&self.chunk_path, &buf[done..done + span], offset - chunk.start, fd)
            {
                Ok(r) => {
                    done += r;
                    offset += r as u64;
                    if r < span {
                        if is_tail {
                            // The tail leaf is full; enlist a successor at
                            // the current position.
                            idx = self.chunks.len();
                        } else {
                            break 'place;
                        }
                    } else {
                        idx += 1;
                    }
                }
                Err(e) if e.to_errno() == libc::ENOSPC => {
                    if is_tail && self.cursor < self.leaves.len() {
                        idx = self.chunks.len();
                    } else if done == 0 && is_tail {
                        return Err(e);
                    } else {
                        break 'place;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if done > 0 {
            self.desc.size = self.desc.size.max(initial + done as u64);
            self.touch_modified();
        }
        Ok(done)
    }

    /// Propagate the same logical size to every chunk; each leaf clamps its
    /// own chunk file. Chunk geometry is left untouched: a chunk lying past
    /// the new size simply holds no live bytes until the file regrows.
    pub fn truncate(&mut self, size: u64, fds: Option<&[FileHandle]>) -> FsResult<()> {
        for (idx, chunk) in self.chunks.iter().enumerate() {
            let fd = fds.and_then(|v| v.get(idx)).copied();
            chunk.leaf.truncate(&self.chunk_path, size, fd)?;
        }
        self.desc.size = size;
        self.touch_modified();
        Ok(())
    }

    pub fn chmod(&mut self, mode: u32, fds: Option<&[FileHandle]>) -> FsResult<()> {
        for (idx, chunk) in self.chunks.iter().enumerate() {
            let fd = fds.and_then(|v| v.get(idx)).copied();
            chunk.leaf.chmod(&self.chunk_path, mode, fd)?;
        }
        self.desc.mode = libc::S_IFREG | (mode & 0o7777);
        self.desc.ctime = TimeSpec::now();
        Ok(())
    }

    pub fn chown(&mut self, uid: u32, gid: u32, fds: Option<&[FileHandle]>) -> FsResult<()> {
        for (idx, chunk) in self.chunks.iter().enumerate() {
            let fd = fds.and_then(|v| v.get(idx)).copied();
            chunk.leaf.chown(&self.chunk_path, uid, gid, fd)?;
        }
        self.desc.owner_uid = uid;
        self.desc.owner_gid = gid;
        self.desc.ctime = TimeSpec::now();
        Ok(())
    }

    /// Forward to every chunk best-effort, then apply the per-entry rules to
    /// the descriptor.
    pub fn utimens(&mut self, atime: TimeUpdate, mtime: TimeUpdate, fds: Option<&[FileHandle]>) {
        for (idx, chunk) in self.chunks.iter().enumerate() {
            let fd = fds.and_then(|v| v.get(idx)).copied();
            let _ = chunk.leaf.utimens(&self.chunk_path, atime, mtime, fd);
        }
        let now = TimeSpec::now();
        self.desc.atime = atime.apply(self.desc.atime, now);
        self.desc.mtime = mtime.apply(self.desc.mtime, now);
        if !atime.is_omit() || !mtime.is_omit() {
            self.desc.ctime = now;
        }
    }

    /// Remove every per-chunk file, best-effort: the namespace entry is
    /// already gone, so leaf cleanup is all that remains.
    pub fn unlink(&self) {
        for chunk in &self.chunks {
            let _ = chunk.leaf.unlink(&self.chunk_path);
        }
    }

    pub fn fsync(&self, datasync: bool, fds: Option<&[FileHandle]>) -> FsResult<()> {
        for (idx, chunk) in self.chunks.iter().enumerate() {
            let fd = fds.and_then(|v| v.get(idx)).copied();
            chunk.leaf.fsync(&self.chunk_path, datasync, fd)?;
        }
        Ok(())
    }

    pub fn lseek(&self, offset: i64, whence: i32) -> FsResult<i64> {
        match whence {
            libc::SEEK_DATA => Ok(offset),
            libc::SEEK_HOLE => Ok(self.desc.size as i64),
            _ => Err(FsError::invalid("lseek whence")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::layout_is_valid;
    use crate::mem::MemLeaf;

    fn caller() -> Caller {
        Caller::new(1000, 1000)
    }

    fn build(capacities: &[u64]) -> (StripedFile, Vec<Arc<MemLeaf>>) {
        let mems: Vec<Arc<MemLeaf>> =
            capacities.iter().map(|&c| Arc::new(MemLeaf::new(c))).collect();
        let leaves: Arc<[LeafRef]> = mems
            .iter()
            .map(|m| m.clone() as LeafRef)
            .collect::<Vec<_>>()
            .into();
        let file = StripedFile::new("/a", 0o644, 0, caller(), leaves);
        (file, mems)
    }

    #[test]
    fn new_file_is_empty_with_no_chunks() {
        let (file, _) = build(&[10]);
        assert_eq!(file.desc().size, 0);
        assert!(file.chunks().is_empty());
        assert_eq!(file.chunk_path(), "/a.chunk");
        assert_eq!(file.desc().mode, libc::S_IFREG | 0o644);
    }

    #[test]
    fn write_within_one_leaf_makes_one_chunk() {
        let (mut file, mems) = build(&[100, 100]);
        assert_eq!(file.write(b"hello", 0, None).unwrap(), 5);
        assert_eq!(file.chunks().len(), 1);
        assert_eq!(file.desc().size, 5);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"hello");
        assert_eq!(mems[1].file_count(), 0);
        assert!(layout_is_valid(file.chunks()));
    }

    #[test]
    fn write_spills_over_to_second_leaf() {
        // Two leaves of 10 bytes each; a 15-byte write spans both.
        let (mut file, mems) = build(&[10, 10]);
        assert_eq!(file.write(b"abcdefghijKLMNO", 0, None).unwrap(), 15);
        assert_eq!(file.desc().size, 15);
        assert_eq!(file.chunks().len(), 2);
        assert_eq!(file.chunks()[0].start, 0);
        assert_eq!(file.chunks()[0].end, Some(10));
        assert_eq!(file.chunks()[1].start, 10);
        assert_eq!(file.chunks()[1].end, None);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"abcdefghij");
        assert_eq!(mems[1].contents("/a.chunk").unwrap(), b"KLMNO");
        assert!(layout_is_valid(file.chunks()));
    }

    #[test]
    fn read_reassembles_across_chunks() {
        let (mut file, _) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        let mut buf = [0u8; 15];
        assert_eq!(file.read(&mut buf, 0, None).unwrap(), 15);
        assert_eq!(&buf, b"abcdefghijKLMNO");
    }

    #[test]
    fn read_from_mid_file_offset() {
        let (mut file, _) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(file.read(&mut buf, 8, None).unwrap(), 6);
        assert_eq!(&buf, b"ijKLMN");
    }

    #[test]
    fn partial_write_when_all_leaves_fill_up() {
        // Two leaves of 4 bytes; 10 bytes only partially fit.
        let (mut file, mems) = build(&[4, 4]);
        assert_eq!(file.write(b"HELLOWORLD", 0, None).unwrap(), 8);
        assert_eq!(file.desc().size, 8);
        assert_eq!(file.chunks().len(), 2);
        assert_eq!(file.chunks()[0].end, Some(4));
        assert_eq!(file.chunks()[1].start, 4);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"HELL");
        assert_eq!(mems[1].contents("/a.chunk").unwrap(), b"OWOR");
    }

    #[test]
    fn create_failure_mid_write_surfaces_the_leaf_error() {
        // The first leaf fills and the write tries to enlist the second,
        // whose create fails: the leaf error comes back even though four
        // bytes already landed.
        let (mut file, mems) = build(&[4, 4]);
        mems[1].set_fail_creates(true);
        let err = file.write(b"HELLOWORLD", 0, None).unwrap_err();
        assert_eq!(err.to_errno(), libc::EIO);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"HELL");
        assert_eq!(mems[1].file_count(), 0);
        // The failed chunk never entered the list.
        assert_eq!(file.chunks().len(), 1);
        assert!(layout_is_valid(file.chunks()));
    }

    #[test]
    fn create_failure_on_first_chunk_surfaces_the_leaf_error() {
        let (mut file, mems) = build(&[4]);
        mems[0].set_fail_creates(true);
        let err = file.write(b"abc", 0, None).unwrap_err();
        assert_eq!(err.to_errno(), libc::EIO);
        assert!(file.chunks().is_empty());
        assert_eq!(file.desc().size, 0);
    }

    #[test]
    fn write_with_leaves_exhausted_reports_enospc() {
        let (mut file, _) = build(&[4, 4]);
        file.write(b"HELLOWORLD", 0, None).unwrap();
        let err = file.write(b"MORE", 8, None).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOSPC);
    }

    #[test]
    fn empty_write_returns_zero_and_changes_nothing() {
        let (mut file, _) = build(&[10]);
        file.write(b"abc", 0, None).unwrap();
        let mtime = file.desc().mtime;
        assert_eq!(file.write(b"", 100, None).unwrap(), 0);
        assert_eq!(file.desc().size, 3);
        assert_eq!(file.desc().mtime, mtime);
    }

    #[test]
    fn read_past_size_returns_zero() {
        let (mut file, _) = build(&[10]);
        file.write(b"abc", 0, None).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf, 3, None).unwrap(), 0);
        assert_eq!(file.read(&mut buf, 100, None).unwrap(), 0);
    }

    #[test]
    fn write_offset_past_size_is_clamped_to_append() {
        let (mut file, mems) = build(&[32]);
        file.write(b"abc", 0, None).unwrap();
        assert_eq!(file.write(b"XYZ", 100, None).unwrap(), 3);
        assert_eq!(file.desc().size, 6);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"abcXYZ");
    }

    #[test]
    fn overwrite_does_not_grow_the_file() {
        let (mut file, mems) = build(&[32]);
        file.write(b"abcdef", 0, None).unwrap();
        assert_eq!(file.write(b"XY", 2, None).unwrap(), 2);
        assert_eq!(file.desc().size, 6);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"abXYef");
    }

    #[test]
    fn overwrite_spanning_the_chunk_seam() {
        let (mut file, mems) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        assert_eq!(file.write(b"1234", 8, None).unwrap(), 4);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"abcdefgh12");
        assert_eq!(mems[1].contents("/a.chunk").unwrap(), b"34MNO");
        let mut buf = [0u8; 15];
        file.read(&mut buf, 0, None).unwrap();
        assert_eq!(&buf, b"abcdefgh1234MNO");
    }

    #[test]
    fn truncate_propagates_and_updates_size() {
        let (mut file, mems) = build(&[32]);
        file.write(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9], 0, None).unwrap();
        file.truncate(4, None).unwrap();
        assert_eq!(file.desc().size, 4);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), &[0, 1, 2, 3]);
        let mut buf = [0u8; 10];
        assert_eq!(file.read(&mut buf, 0, None).unwrap(), 4);
        assert_eq!(&buf[..4], &[0, 1, 2, 3]);
    }

    #[test]
    fn truncate_keeps_chunk_geometry() {
        let (mut file, _) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        file.truncate(4, None).unwrap();
        assert_eq!(file.chunks().len(), 2);
        assert!(layout_is_valid(file.chunks()));
    }

    #[test]
    fn regrow_after_truncate_reuses_existing_chunks() {
        let (mut file, mems) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        file.truncate(0, None).unwrap();
        assert_eq!(file.write(b"fresh", 0, None).unwrap(), 5);
        // The write lands inside the sealed [0, 10) chunk; geometry is kept.
        assert_eq!(file.chunks().len(), 2);
        assert_eq!(file.desc().size, 5);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"fresh");
        assert_eq!(mems[1].contents("/a.chunk").unwrap(), b"");
    }

    #[test]
    fn open_collects_one_handle_per_chunk() {
        let (mut file, _) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        let fds = file.open(libc::O_RDONLY).unwrap();
        assert_eq!(fds.len(), 2);
        file.release(&fds).unwrap();
    }

    #[test]
    fn open_with_trunc_resets_logical_size() {
        let (mut file, _) = build(&[32]);
        file.write(b"payload", 0, None).unwrap();
        let fds = file.open(libc::O_WRONLY | libc::O_TRUNC).unwrap();
        assert_eq!(file.desc().size, 0);
        file.release(&fds).unwrap();
    }

    #[test]
    fn open_with_trunc_readonly_keeps_size() {
        let (mut file, _) = build(&[32]);
        file.write(b"payload", 0, None).unwrap();
        let fds = file.open(libc::O_RDONLY | libc::O_TRUNC).unwrap();
        assert_eq!(file.desc().size, 7);
        file.release(&fds).unwrap();
    }

    #[test]
    fn write_under_open_handle_extends_fd_sequence() {
        let (mut file, _) = build(&[10, 10]);
        let mut fds = file.open(libc::O_WRONLY).unwrap();
        assert!(fds.is_empty());
        file.write(b"abcdefghijKLMNO", 0, Some(&mut fds)).unwrap();
        // One handle per chunk, appended as chunks were enlisted.
        assert_eq!(fds.len(), file.chunks().len());
        file.release(&fds).unwrap();
    }

    #[test]
    fn unlink_removes_per_chunk_files() {
        let (mut file, mems) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        file.unlink();
        assert_eq!(mems[0].file_count(), 0);
        assert_eq!(mems[1].file_count(), 0);
    }

    #[test]
    fn chmod_propagates_to_chunks() {
        let (mut file, mems) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        file.chmod(0o600, None).unwrap();
        assert_eq!(file.desc().mode, libc::S_IFREG | 0o600);
        let stat = mems[0].getattr("/a.chunk", None).unwrap();
        assert_eq!(stat.mode & 0o7777, 0o600);
    }

    #[test]
    fn chown_propagates_to_chunks() {
        let (mut file, mems) = build(&[10, 10]);
        file.write(b"abcdefghijKLMNO", 0, None).unwrap();
        file.chown(42, 43, None).unwrap();
        assert_eq!(file.desc().owner_uid, 42);
        let stat = mems[1].getattr("/a.chunk", None).unwrap();
        assert_eq!(stat.uid, 42);
        assert_eq!(stat.gid, 43);
    }

    #[test]
    fn lseek_data_and_hole() {
        let (mut file, _) = build(&[32]);
        file.write(b"abcdef", 0, None).unwrap();
        assert_eq!(file.lseek(2, libc::SEEK_DATA).unwrap(), 2);
        assert_eq!(file.lseek(2, libc::SEEK_HOLE).unwrap(), 6);
        let err = file.lseek(0, libc::SEEK_SET).unwrap_err();
        assert_eq!(err.to_errno(), libc::EINVAL);
    }

    #[test]
    fn many_small_leaves_chain_correctly() {
        let (mut file, mems) = build(&[3, 3, 3, 3]);
        assert_eq!(file.write(b"0123456789AB", 0, None).unwrap(), 12);
        assert_eq!(file.chunks().len(), 4);
        assert!(layout_is_valid(file.chunks()));
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"012");
        assert_eq!(mems[3].contents("/a.chunk").unwrap(), b"9AB");
        let mut buf = [0u8; 12];
        assert_eq!(file.read(&mut buf, 0, None).unwrap(), 12);
        assert_eq!(&buf, b"0123456789AB");
    }

    #[test]
    fn appending_write_extends_the_tail_chunk() {
        let (mut file, mems) = build(&[10, 10]);
        file.write(b"abc", 0, None).unwrap();
        file.write(b"defg", 3, None).unwrap();
        assert_eq!(file.chunks().len(), 1);
        assert_eq!(file.desc().size, 7);
        assert_eq!(mems[0].contents("/a.chunk").unwrap(), b"abcdefg");
    }
}
