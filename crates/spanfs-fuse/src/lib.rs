//! FUSE boundary for the spanfs federation: the kernel adapter, the
//! inode-to-path table, and the command-line surface of the `spanfs` binary.

/// `fuser::Filesystem` implementation over the path-keyed core.
pub mod adapter;
/// Command-line argument surface.
pub mod cli;
/// Inode-number to logical-path translation.
pub mod path_table;

pub use adapter::SpanFuse;
pub use cli::Cli;
pub use path_table::{PathTable, ROOT_INO};
