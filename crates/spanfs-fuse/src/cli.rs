use std::path::PathBuf;

use clap::Parser;

use spanfs_core::FederationConfig;

/// Federate several directories into one striped FUSE mount.
#[derive(Parser, Debug)]
#[command(name = "spanfs", version, about)]
pub struct Cli {
    /// Colon-separated paths to leaf directories; repeat to concatenate.
    #[arg(long = "fss", value_name = "p1:p2:p3:...", action = clap::ArgAction::Append)]
    pub fss: Vec<String>,

    /// Record every operation to this file.
    #[arg(long = "log", value_name = "path")]
    pub log: Option<PathBuf>,

    /// Allow other users to access the mount.
    #[arg(long = "allow-other")]
    pub allow_other: bool,

    /// Where to mount the federation.
    #[arg(value_name = "mountpoint")]
    pub mountpoint: PathBuf,
}

impl Cli {
    /// Flatten repeated `--fss` values into the ordered leaf-root list.
    pub fn leaf_roots(&self) -> Vec<PathBuf> {
        self.fss
            .iter()
            .flat_map(|group| group.split(':'))
            .filter(|part| !part.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    pub fn to_config(&self) -> FederationConfig {
        let mut config = FederationConfig::new(self.leaf_roots());
        config.log_path = self.log.clone();
        config
    }
}
