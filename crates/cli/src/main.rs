mod config;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use mirrorfs_core::MirrorFs;
use mirrorfs_fuse::{MirrorFuse, WorkerPool};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Args, FileConfig, Settings};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

/// Logs go to `log_file` when given. Otherwise they go to stderr, which
/// daemon(3) points at /dev/null, so a detached mount without a log file
/// is silent.
fn init_logging(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    // daemon(3) moves to /, so relative paths must be resolved first.
    let settings = Settings::resolve(&args, file)?.canonicalize()?;

    // Opened before detaching; daemon(3) only redirects the standard streams.
    init_logging(settings.debug, settings.log_file.as_deref())?;
    info!(
        source = %settings.source.display(),
        mountpoint = %settings.mountpoint.display(),
        threads = settings.threads,
        single_threaded = settings.single_threaded,
        "starting mirrorfs"
    );

    // Detach before the worker pool spawns any thread.
    if !settings.foreground {
        nix::unistd::daemon(false, false).context("detaching from terminal")?;
    }

    let pool = if settings.single_threaded {
        WorkerPool::inline()
    } else {
        WorkerPool::threads(settings.threads).context("starting worker pool")?
    };

    let fs = MirrorFuse::new(MirrorFs::new(), settings.source.clone(), pool);
    mirrorfs_fuse::mount(fs, &settings.mountpoint, &settings.mount)
        .with_context(|| format!("mounting {}", settings.mountpoint.display()))?;

    info!("unmounted");
    Ok(())
}
