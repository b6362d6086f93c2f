use thiserror::Error;

/// Failures raised inside the federation core.
///
/// Every variant maps onto a POSIX errno via [`FsError::to_errno`]; the FUSE
/// boundary converts that code into the kernel's negative-errno convention.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such entry: {path}")]
    NotFound { path: String },

    #[error("entry already exists: {path}")]
    AlreadyExists { path: String },

    #[error("entry is busy: {path}")]
    Busy { path: String },

    #[error("invalid argument: {msg}")]
    InvalidArgument { msg: String },

    #[error("no space left on any leaf")]
    NoSpace,

    #[error("operation not supported: {op}")]
    NotSupported { op: String },

    #[error("allocation failed")]
    OutOfMemory,

    #[error("federation lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("errno {0}")]
    Os(i32),
}

pub type FsResult<T> = std::result::Result<T, FsError>;

impl FsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        FsError::NotFound { path: path.into() }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        FsError::AlreadyExists { path: path.into() }
    }

    pub fn busy(path: impl Into<String>) -> Self {
        FsError::Busy { path: path.into() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        FsError::InvalidArgument { msg: msg.into() }
    }

    pub fn not_supported(op: impl Into<String>) -> Self {
        FsError::NotSupported { op: op.into() }
    }

    /// Build from a raw errno value, as reported by a leaf syscall.
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::ENOSPC => FsError::NoSpace,
            libc::ENOMEM => FsError::OutOfMemory,
            e => FsError::Os(e),
        }
    }

    /// The positive errno this failure surfaces as.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound { .. } => libc::ENOENT,
            FsError::AlreadyExists { .. } => libc::EEXIST,
            FsError::Busy { .. } => libc::EBUSY,
            FsError::InvalidArgument { .. } => libc::EINVAL,
            FsError::NoSpace => libc::ENOSPC,
            FsError::NotSupported { .. } => libc::EOPNOTSUPP,
            FsError::OutOfMemory => libc::ENOMEM,
            // A poisoned lock is a failed invariant, not a system error.
            FsError::LockPoisoned => libc::EINVAL,
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            FsError::Os(e) => *e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_enoent() {
        assert_eq!(FsError::not_found("/a").to_errno(), libc::ENOENT);
    }

    #[test]
    fn already_exists_maps_to_eexist() {
        assert_eq!(FsError::already_exists("/a").to_errno(), libc::EEXIST);
    }

    #[test]
    fn busy_maps_to_ebusy() {
        assert_eq!(FsError::busy("/").to_errno(), libc::EBUSY);
    }

    #[test]
    fn invalid_maps_to_einval() {
        assert_eq!(FsError::invalid("bad").to_errno(), libc::EINVAL);
    }

    #[test]
    fn no_space_maps_to_enospc() {
        assert_eq!(FsError::NoSpace.to_errno(), libc::ENOSPC);
    }

    #[test]
    fn not_supported_maps_to_eopnotsupp() {
        assert_eq!(FsError::not_supported("fallocate").to_errno(), libc::EOPNOTSUPP);
    }

    #[test]
    fn out_of_memory_maps_to_enomem() {
        assert_eq!(FsError::OutOfMemory.to_errno(), libc::ENOMEM);
    }

    #[test]
    fn io_error_carries_raw_errno() {
        let err = FsError::Io(std::io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(err.to_errno(), libc::EACCES);
    }

    #[test]
    fn io_error_without_errno_falls_back_to_eio() {
        let err = FsError::Io(std::io::Error::new(std::io::ErrorKind::Other, "synthetic"));
        assert_eq!(err.to_errno(), libc::EIO);
    }

    #[test]
    fn from_errno_recognizes_enospc() {
        assert!(matches!(FsError::from_errno(libc::ENOSPC), FsError::NoSpace));
    }

    #[test]
    fn from_errno_recognizes_enomem() {
        assert!(matches!(FsError::from_errno(libc::ENOMEM), FsError::OutOfMemory));
    }

    #[test]
    fn from_errno_passes_through_other_codes() {
        assert_eq!(FsError::from_errno(libc::EACCES).to_errno(), libc::EACCES);
    }

    #[test]
    fn display_messages_non_empty() {
        let errors = [
            FsError::not_found("/a"),
            FsError::already_exists("/a"),
            FsError::busy("/"),
            FsError::invalid("bad"),
            FsError::NoSpace,
            FsError::not_supported("mkdir"),
            FsError::OutOfMemory,
            FsError::LockPoisoned,
            FsError::Os(libc::EPERM),
        ];
        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
