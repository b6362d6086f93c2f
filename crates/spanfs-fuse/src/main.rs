//! spanfs mount daemon.
//!
//! Usage: spanfs [options] <mountpoint>

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use fuser::MountOption;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spanfs_core::{build_filesystem, Caller};
use spanfs_fuse::{Cli, SpanFuse};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(libc::EINVAL as u8);
        }
    };

    let config = cli.to_config();
    if config.leaf_roots.is_empty() {
        eprintln!("spanfs: no leaf filesystems to federate; pass --fss=<p1>:<p2>:...");
        return ExitCode::from(libc::EINVAL as u8);
    }

    let owner = unsafe { Caller::new(libc::getuid(), libc::getgid()) };
    let fs = match build_filesystem(&config, owner) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("spanfs: {e}");
            return ExitCode::from(e.to_errno() as u8);
        }
    };

    let mut options = vec![
        MountOption::FSName("spanfs".to_string()),
        MountOption::AutoUnmount,
    ];
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }

    tracing::info!(
        mountpoint = %cli.mountpoint.display(),
        leaves = config.leaf_roots.len(),
        "mounting spanfs"
    );

    match fuser::mount2(SpanFuse::new(fs), &cli.mountpoint, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("spanfs: mount failed: {e}");
            ExitCode::from(e.raw_os_error().unwrap_or(1) as u8)
        }
    }
}
