//! Binary entry point for the Flotilla CLI.

mod cli;

#[cfg(feature = "test-backdoors")]
use std::env;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use flotilla::{
    ConfigError, FleetConfig, FleetError, FleetManager, InstanceHandle, LaunchOverrides, Provider,
    SNAPSHOT_WAIT, ScalewayProvider, VOLUME_WAIT, WaitSettings,
};

use cli::{Cli, Command, WaitArgs};

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("{0}")]
    Fleet(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn fleet_error<E>(err: FleetError<E>) -> CliError
where
    E: std::error::Error + 'static,
{
    CliError::Fleet(err.to_string())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { zone, command } = cli;
    let loaded = FleetConfig::load_without_cli_args()?;
    let config = match zone {
        Some(name) => loaded.with_zone(name),
        None => loaded,
    };

    #[cfg(feature = "test-backdoors")]
    if let Some(provider) = fake_provider_from_env() {
        let fleet = FleetManager::connect(provider.clone(), config)
            .await
            .map_err(fleet_error)?;
        execute(&fleet, command).await?;
        return dump_launches(&provider);
    }

    config.validate()?;
    let provider =
        ScalewayProvider::new(config.clone()).map_err(|err| CliError::Provider(err.to_string()))?;
    let fleet = FleetManager::connect(provider, config)
        .await
        .map_err(fleet_error)?;
    execute(&fleet, command).await
}

async fn execute<P>(fleet: &FleetManager<P>, command: Command) -> Result<(), CliError>
where
    P: Provider,
{
    let mut out = io::stdout();
    match command {
        Command::Regions => {
            for region in fleet.list_regions().await.map_err(fleet_error)? {
                writeln!(out, "{region}")?;
            }
        }
        Command::Instances => fleet
            .describe_instances(&mut out)
            .await
            .map_err(fleet_error)?,
        Command::Snapshots => fleet
            .describe_snapshots(&mut out)
            .await
            .map_err(fleet_error)?,
        Command::Volumes(args) => fleet
            .describe_volumes(&args.instance, &mut out)
            .await
            .map_err(fleet_error)?,
        Command::Start(args) => {
            let overrides = LaunchOverrides {
                key_name: args.key,
                security_groups: (!args.security_groups.is_empty())
                    .then_some(args.security_groups),
                count: args.count,
                ..LaunchOverrides::default()
            };
            let handles = fleet
                .start_instance(&args.image, &args.instance_type, &overrides)
                .await
                .map_err(fleet_error)?;
            write_handles(&mut out, &handles)?;
        }
        Command::Terminate(args) => {
            fleet
                .terminate_instance(&args.instance)
                .await
                .map_err(fleet_error)?;
            writeln!(out, "termination requested for {}", args.instance)?;
        }
        Command::Duplicate(args) => {
            let overrides = LaunchOverrides {
                image_id: args.image,
                instance_type: args.instance_type,
                key_name: args.key,
                count: args.count,
                ..LaunchOverrides::default()
            };
            let handles = fleet
                .duplicate_instance(&args.instance, &overrides)
                .await
                .map_err(fleet_error)?;
            write_handles(&mut out, &handles)?;
        }
        Command::DuplicateWithVolumes(args) => {
            let overrides = LaunchOverrides {
                image_id: args.image,
                count: args.count,
                ..LaunchOverrides::default()
            };
            let handles = fleet
                .duplicate_instance_with_volumes(
                    &args.instance,
                    &overrides,
                    wait_settings(&args.wait, SNAPSHOT_WAIT),
                )
                .await
                .map_err(fleet_error)?;
            write_handles(&mut out, &handles)?;
        }
        Command::AttachSnapshot(args) => {
            let volume = fleet
                .attach_snapshot_instance(
                    &args.snapshot,
                    &args.instance,
                    &args.device,
                    wait_settings(&args.wait, VOLUME_WAIT),
                )
                .await
                .map_err(fleet_error)?;
            writeln!(
                out,
                "{} attached to {} at {}",
                volume.id, args.instance, args.device
            )?;
        }
    }
    Ok(())
}

fn wait_settings(args: &WaitArgs, defaults: WaitSettings) -> WaitSettings {
    WaitSettings::new(
        args.poll_interval_secs
            .map_or(defaults.interval, Duration::from_secs),
        args.timeout_secs.map_or(defaults.timeout, Duration::from_secs),
    )
}

fn write_handles(mut target: impl Write, handles: &[InstanceHandle]) -> io::Result<()> {
    for handle in handles {
        writeln!(target, "{} ({})", handle.id, handle.zone)?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

/// Selects the in-memory provider when `FLOTILLA_FAKE_PROVIDER` names a
/// known scenario.
#[cfg(feature = "test-backdoors")]
fn fake_provider_from_env() -> Option<flotilla::test_support::FakeProvider> {
    use flotilla::model::{SnapshotStatus, VolumeStatus};

    let mode = env::var("FLOTILLA_FAKE_PROVIDER").ok()?;
    let provider = flotilla::test_support::FakeProvider::demo();
    match mode.as_str() {
        "demo" => {}
        "snapshot-error" => provider.push_snapshot_status(SnapshotStatus::Error),
        "volume-error" => provider.push_volume_status(VolumeStatus::Error),
        _ => return None,
    }
    Some(provider)
}

/// Writes every launch the fake provider received as `key=value` lines.
#[cfg(feature = "test-backdoors")]
fn dump_launches(provider: &flotilla::test_support::FakeProvider) -> Result<(), CliError> {
    let mut out = io::stdout();
    for request in provider.launches() {
        let devices = request
            .block_devices
            .iter()
            .map(|mapping| format!("{}:{}", mapping.device, mapping.snapshot_id))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "image_id={}", request.image_id)?;
        writeln!(out, "instance_type={}", request.instance_type)?;
        writeln!(
            out,
            "key_name={}",
            request.key_name.as_deref().unwrap_or_default()
        )?;
        writeln!(out, "security_groups={}", request.security_groups.join(","))?;
        writeln!(out, "count={}", request.count)?;
        writeln!(out, "block_devices={devices}")?;
    }
    Ok(())
}
