//! Command-line interface definitions for the `flotilla` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `flotilla` binary.
#[derive(Debug, Parser)]
#[command(
    name = "flotilla",
    version,
    about = "Inspect and clone Scaleway instances, volumes, and snapshots",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Availability zone to operate in instead of the configured default.
    #[arg(long, global = true, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands, one per fleet operation.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List the regions the provider can reach.
    Regions,
    /// Print a table of every instance.
    Instances,
    /// Print a table of the snapshots owned by the account.
    Snapshots,
    /// Print the non-root volumes attached to an instance.
    Volumes(VolumesCommand),
    /// Launch new instances from an image.
    Start(StartCommand),
    /// Request termination of an instance.
    Terminate(TerminateCommand),
    /// Launch copies of an instance without its volumes.
    Duplicate(DuplicateCommand),
    /// Launch copies of an instance with volumes restored from fresh snapshots.
    DuplicateWithVolumes(DuplicateWithVolumesCommand),
    /// Restore a snapshot into a new volume and attach it to an instance.
    AttachSnapshot(AttachSnapshotCommand),
}

/// Arguments for `flotilla volumes`.
#[derive(Debug, Args)]
pub(crate) struct VolumesCommand {
    /// Instance whose volumes are listed.
    pub(crate) instance: String,
}

/// Arguments for `flotilla start`.
#[derive(Debug, Args)]
pub(crate) struct StartCommand {
    /// Boot image identifier.
    pub(crate) image: String,
    /// Instance (commercial) type, for example `DEV1-S`.
    #[arg(value_name = "TYPE")]
    pub(crate) instance_type: String,
    /// Key-pair name to record; defaults to the configured key.
    #[arg(long, value_name = "NAME")]
    pub(crate) key: Option<String>,
    /// Security group to apply; defaults to the configured group.
    #[arg(long = "security-group", value_name = "ID")]
    pub(crate) security_groups: Vec<String>,
    /// Number of instances to launch.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) count: Option<u32>,
}

/// Arguments for `flotilla terminate`.
#[derive(Debug, Args)]
pub(crate) struct TerminateCommand {
    /// Instance to terminate.
    pub(crate) instance: String,
}

/// Arguments for `flotilla duplicate`.
#[derive(Debug, Args)]
pub(crate) struct DuplicateCommand {
    /// Instance to copy.
    pub(crate) instance: String,
    /// Boot image to use instead of the source's.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// Instance type to use instead of the source's.
    #[arg(long, value_name = "TYPE")]
    pub(crate) instance_type: Option<String>,
    /// Key-pair name to use instead of the source's.
    #[arg(long, value_name = "NAME")]
    pub(crate) key: Option<String>,
    /// Number of copies to launch.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) count: Option<u32>,
}

/// Arguments for `flotilla duplicate-with-volumes`.
#[derive(Debug, Args)]
pub(crate) struct DuplicateWithVolumesCommand {
    /// Instance to copy.
    pub(crate) instance: String,
    /// Boot image to use instead of the source's.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// Number of copies to launch.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) count: Option<u32>,
    /// Snapshot polling settings.
    #[command(flatten)]
    pub(crate) wait: WaitArgs,
}

/// Arguments for `flotilla attach-snapshot`.
#[derive(Debug, Args)]
pub(crate) struct AttachSnapshotCommand {
    /// Snapshot to restore.
    pub(crate) snapshot: String,
    /// Instance receiving the new volume.
    pub(crate) instance: String,
    /// Device (volume slot on Scaleway) to attach at.
    pub(crate) device: String,
    /// Volume polling settings.
    #[command(flatten)]
    pub(crate) wait: WaitArgs,
}

/// Polling overrides shared by the waiting subcommands.
#[derive(Debug, Args)]
pub(crate) struct WaitArgs {
    /// Seconds between status checks.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) poll_interval_secs: Option<u64>,
    /// Seconds to wait before giving up.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) timeout_secs: Option<u64>,
}
