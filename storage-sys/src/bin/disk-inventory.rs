// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use storage_sys::mountinfo::{MOUNTINFO_PATH, lookup_mount_by_minor, lookup_mount_target};
use storage_sys::{
    BlockDeviceDiscovery, DiscoveryConfig, FindMnt, FindMntCommand, Op, PartitionDiscovery,
    ScanContext,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "disk-inventory")]
#[command(about = "Discover block devices, partitions and mounts on Linux")]
struct Args {
    /// TOML file with filter, partition and scan settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overall deadline for the scan
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Match every device, filesystem and mount point
    #[arg(long, global = true)]
    all: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Block device tree from lsblk
    Devices {
        /// Print a flat list with parent/child names instead of a tree
        #[arg(long)]
        flatten: bool,
    },

    /// Mounted partitions with capacity
    Partitions {
        #[arg(long)]
        skip_usage: bool,

        #[arg(long)]
        stat_timeout_ms: Option<u64>,
    },

    /// Capacity per block device, joined through mount points
    Usage,

    /// Filesystems serving a path, as reported by findmnt
    Findmnt { target: String },

    /// Mount table entry serving a path, or mounted from a device minor number
    MountSource {
        #[arg(required_unless_present = "minor")]
        target: Option<String>,

        /// Look the entry up by device minor number instead of path
        #[arg(long, conflicts_with = "target")]
        minor: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "storage_sys={},warn",
                args.log_level.as_directive()
            ))
        }))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => DiscoveryConfig::load(path)?,
        None => DiscoveryConfig::default(),
    };
    if args.all {
        config.filter.use_default_predicates = false;
    }
    if let Some(secs) = args.timeout_secs {
        config.scan.timeout_secs = Some(secs);
    }
    if let Command::Partitions {
        skip_usage,
        stat_timeout_ms,
    } = &args.command
    {
        config.partitions.skip_usage |= *skip_usage;
        if let Some(ms) = stat_timeout_ms {
            config.partitions.stat_timeout_ms = *ms;
        }
    }

    let token = CancellationToken::new();
    let ctx = config.context(token.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received interrupt, cancelling scan");
            token.cancel();
        }
    });

    run(&args.command, &ctx, &config.op()).await
}

async fn run(command: &Command, ctx: &ScanContext, op: &Op) -> Result<()> {
    match command {
        Command::Devices { flatten: false } => {
            let devs = BlockDeviceDiscovery::default()
                .discover(ctx, op)
                .await
                .context("block device discovery failed")?;
            tracing::info!(
                "Found {} root devices, {} bytes total",
                devs.len(),
                devs.total_bytes()
            );
            print_json(&devs)
        }
        Command::Devices { flatten: true } => {
            let devs = BlockDeviceDiscovery::default()
                .discover_flattened(ctx, op)
                .await
                .context("block device discovery failed")?;
            print_json(&devs)
        }
        Command::Partitions { .. } => {
            let parts = PartitionDiscovery::default()
                .discover(ctx, op)
                .await
                .context("partition discovery failed")?;
            tracing::info!(
                "Found {} partitions, {} bytes mounted",
                parts.len(),
                parts.mounted_total_bytes()
            );
            print_json(&parts)
        }
        Command::Usage => {
            let devs = BlockDeviceDiscovery::default()
                .discover_flattened(ctx, op)
                .await
                .context("block device discovery failed")?;
            let parts = PartitionDiscovery::default()
                .discover(ctx, op)
                .await
                .context("partition discovery failed")?;
            print_json(&devs.device_usages(&parts))
        }
        Command::Findmnt { target } => {
            let found = FindMntCommand::default()
                .find_mnt(ctx, target)
                .await
                .with_context(|| format!("findmnt failed for {target}"))?;
            print_json(&found)
        }
        Command::MountSource { target, minor } => {
            let table = Path::new(MOUNTINFO_PATH);
            let (entry, wanted) = match (target, minor) {
                (_, Some(minor)) => (
                    ctx.run(lookup_mount_by_minor(table, *minor)).await,
                    format!("minor {minor}"),
                ),
                (Some(target), None) => (
                    ctx.run(lookup_mount_target(table, target)).await,
                    target.clone(),
                ),
                (None, None) => anyhow::bail!("a target path or --minor is required"),
            };
            match entry.context("mount table lookup failed")? {
                Some(entry) => {
                    println!("{} {}", entry.source, entry.fs_type);
                    Ok(())
                }
                None => anyhow::bail!("no mount found for {wanted}"),
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
