//! Bridge binary: mounts a [`kvfs_core::fs::FileSystem`] as a FUSE
//! filesystem at a given mountpoint.

mod bridge;

use std::path::PathBuf;
use std::str::FromStr;

use clap::error::ErrorKind;
use clap::Parser;
use fuser::MountOption;

/// A userspace filesystem whose entire persistent state lives in an
/// embedded key-value store.
#[derive(Parser, Debug)]
#[command(name = "kvfs", version, about)]
struct Cli {
    /// Directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Path to the on-disk key-value store backing this filesystem.
    /// Created on first use.
    #[arg(long, default_value = "./db")]
    dbpath: PathBuf,

    /// Automatically unmount when this process exits.
    #[arg(long)]
    auto_unmount: bool,

    /// Allow the root user to access this filesystem even though it was
    /// mounted by another user.
    #[arg(long)]
    allow_root: bool,

    /// Extra `-o`-style mount options, passed through to the FUSE layer
    /// verbatim (e.g. `-o ro`, `-o default_permissions`).
    #[arg(short = 'o', value_name = "OPT")]
    mount_opts: Vec<String>,
}

/// Exit code on argument-parse failure, per the CLI surface's contract:
/// `0` success, `1` argument-parse failure, bridge-defined otherwise.
const ARG_PARSE_FAILURE: i32 = 1;

fn main() {
    env_logger::init();
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        let code = match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => ARG_PARSE_FAILURE,
        };
        std::process::exit(code);
    });

    let fs = kvfs_core::fs::FileSystem::mount(&cli.dbpath)
        .unwrap_or_else(|e| panic!("failed to open store at {:?}: {}", cli.dbpath, e));

    let mut options = vec![MountOption::RW, MountOption::FSName("kvfs".to_string())];
    if cli.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    if cli.allow_root {
        options.push(MountOption::AllowRoot);
    }
    options.extend(cli.mount_opts.iter().map(|o| MountOption::from_str(o)));

    log::info!("mounting {:?} at {:?}", cli.dbpath, cli.mountpoint);
    fuser::mount2(bridge::FuseBridge::new(fs), &cli.mountpoint, &options)
        .unwrap_or_else(|e| panic!("failed to mount FUSE filesystem: {}", e));
}
