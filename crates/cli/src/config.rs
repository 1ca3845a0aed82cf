//! Command line flags, the optional TOML config file, and how they merge.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use clap::Parser;
use mirrorfs_fuse::MountConfig;
use serde::Deserialize;

pub const DEFAULT_THREADS: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "mirrorfs")]
#[command(about = "Mirror a directory tree through a FUSE mount")]
#[command(version)]
pub struct Args {
    /// Where to mount the mirror
    pub mountpoint: PathBuf,

    /// Real directory shown at the mount root (default: /)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Stay in the foreground instead of detaching
    #[arg(long, short)]
    pub foreground: bool,

    /// Log every request (implies --foreground)
    #[arg(long, short)]
    pub debug: bool,

    /// Append logs to this file. Without it logs go to stderr, which is
    /// closed once mirrorfs detaches.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Serve requests one at a time on the session thread
    #[arg(long, short)]
    pub single_threaded: bool,

    /// Upper bound on concurrently running requests
    #[arg(long)]
    pub threads: Option<usize>,

    /// Allow other users to access the mount
    #[arg(long)]
    pub allow_other: bool,

    /// Allow root to access the mount
    #[arg(long)]
    pub allow_root: bool,

    /// Unmount automatically when the process exits
    #[arg(long)]
    pub auto_unmount: bool,

    /// Mount read-only
    #[arg(long)]
    pub read_only: bool,
}

/// Contents of the config file. Every key is optional.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub source: Option<PathBuf>,
    pub foreground: bool,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub single_threaded: bool,
    pub threads: Option<usize>,
    pub allow_other: bool,
    pub allow_root: bool,
    pub auto_unmount: bool,
    pub read_only: bool,
    pub fsname: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Effective settings after flags are laid over the config file.
#[derive(Debug)]
pub struct Settings {
    pub mountpoint: PathBuf,
    pub source: PathBuf,
    pub foreground: bool,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub single_threaded: bool,
    pub threads: usize,
    pub mount: MountConfig,
}

impl Settings {
    pub fn resolve(args: &Args, file: FileConfig) -> anyhow::Result<Self> {
        let threads = args.threads.or(file.threads).unwrap_or(DEFAULT_THREADS);
        ensure!(threads > 0, "--threads must be at least 1");

        let debug = args.debug || file.debug;
        let mount = MountConfig {
            fsname: file.fsname.unwrap_or_else(|| MountConfig::default().fsname),
            allow_other: args.allow_other || file.allow_other,
            allow_root: args.allow_root || file.allow_root,
            auto_unmount: args.auto_unmount || file.auto_unmount,
            read_only: args.read_only || file.read_only,
        };
        ensure!(
            !(mount.allow_other && mount.allow_root),
            "--allow-other and --allow-root are mutually exclusive"
        );

        Ok(Self {
            mountpoint: args.mountpoint.clone(),
            source: args
                .source
                .clone()
                .or(file.source)
                .unwrap_or_else(|| PathBuf::from("/")),
            foreground: args.foreground || file.foreground || debug,
            debug,
            log_file: args.log_file.clone().or(file.log_file),
            single_threaded: args.single_threaded || file.single_threaded,
            threads,
            mount,
        })
    }

    /// Makes every path absolute and checks source and mountpoint are
    /// directories.
    pub fn canonicalize(mut self) -> anyhow::Result<Self> {
        self.source = canonical_dir(&self.source, "source")?;
        self.mountpoint = canonical_dir(&self.mountpoint, "mountpoint")?;
        if let Some(log_file) = &self.log_file {
            let absolute = std::path::absolute(log_file)
                .with_context(|| format!("resolving log file {}", log_file.display()))?;
            self.log_file = Some(absolute);
        }
        Ok(self)
    }
}

fn canonical_dir(path: &Path, what: &str) -> anyhow::Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("{what} not found: {}", path.display()))?;
    ensure!(canonical.is_dir(), "{what} is not a directory: {}", path.display());
    Ok(canonical)
}
