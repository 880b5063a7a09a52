//! PairKit CLI — exercise the pairing flow from a terminal
//!
//! Scans for nearby hotspots, runs the full pair flow against one, validates
//! antenna parameters, and resolves onboarding records.

mod ble;
mod term;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::info;

use pairkit_core::{
    AntennaConfigValidator, AntennaProfile, DeviceId, FlowProgress, HttpOnboardingClient,
    LocaleFormat, OnboardingClient, PairingFlow, Platform, SelectOutcome, SessionConfig,
};

use ble::BtleplugTransport;
use term::{GrantAll, TermPrompter, TermSettings};

#[derive(Parser)]
#[command(name = "pairkit-cli", about = "Hotspot pairing and provisioning tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one discovery pass and list pairing candidates
    Scan {
        /// Scan duration in milliseconds
        #[arg(long, default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Scan, then pair with the named device
    Pair {
        /// Device name (substring) or id to select
        name: String,
        #[arg(long, default_value_t = 2000)]
        duration_ms: u64,
        /// Settle delay after a successful handshake, in milliseconds
        #[arg(long, default_value_t = 500)]
        settle_ms: u64,
    },
    /// Validate antenna gain/elevation input
    Antenna {
        /// Antenna profile id (custom, helium_us, rak_eu, ...)
        #[arg(long)]
        profile: Option<String>,
        /// Gain text as the user would type it
        #[arg(long)]
        gain: Option<String>,
        /// Elevation text as the user would type it
        #[arg(long)]
        elevation: Option<String>,
        /// Parse with comma-decimal locale separators
        #[arg(long)]
        comma_decimal: bool,
    },
    /// Look up a gateway's onboarding record
    Resolve {
        /// Gateway public key (base58)
        gateway: String,
        #[arg(long, default_value = "https://onboarding.dewi.org/api/v2")]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan { duration_ms } => scan(duration_ms).await,
        Command::Pair {
            name,
            duration_ms,
            settle_ms,
        } => pair(&name, duration_ms, settle_ms).await,
        Command::Antenna {
            profile,
            gain,
            elevation,
            comma_decimal,
        } => antenna(profile, gain, elevation, comma_decimal),
        Command::Resolve { gateway, base_url } => resolve(&gateway, &base_url).await,
    }
}

fn session_config(duration_ms: u64, settle_ms: u64) -> SessionConfig {
    SessionConfig {
        scan_duration: Duration::from_millis(duration_ms),
        settle_delay: Duration::from_millis(settle_ms),
    }
}

async fn scan(duration_ms: u64) -> Result<()> {
    let transport = BtleplugTransport::new().await?;
    let prompter = TermPrompter;
    let settings = TermSettings;
    let mut flow = PairingFlow::new(
        Platform::Android,
        &transport,
        &prompter,
        &settings,
        GrantAll,
        session_config(duration_ms, 500),
    );

    match flow.scan().await? {
        FlowProgress::Blocked(status) => bail!("flow blocked: {status:?}"),
        FlowProgress::ScanComplete => {}
    }

    if flow.snapshot().is_empty() {
        println!("no pairing candidates found");
        return Ok(());
    }
    for device in flow.snapshot().devices() {
        println!(
            "{}  {}",
            device.id,
            device.display_name().unwrap_or_default()
        );
    }
    Ok(())
}

async fn pair(name: &str, duration_ms: u64, settle_ms: u64) -> Result<()> {
    let transport = BtleplugTransport::new().await?;
    let prompter = TermPrompter;
    let settings = TermSettings;
    let mut flow = PairingFlow::new(
        Platform::Android,
        &transport,
        &prompter,
        &settings,
        GrantAll,
        session_config(duration_ms, settle_ms),
    );

    match flow.scan().await? {
        FlowProgress::Blocked(status) => bail!("flow blocked: {status:?}"),
        FlowProgress::ScanComplete => {}
    }

    let id: DeviceId = flow
        .snapshot()
        .devices()
        .iter()
        .find(|d| {
            d.id.0 == name
                || d.display_name()
                    .is_some_and(|n| n.to_lowercase().contains(&name.to_lowercase()))
        })
        .map(|d| d.id.clone())
        .ok_or_else(|| anyhow!("no candidate matching {name:?}"))?;

    info!(device = %id, "selecting");
    match flow.select(&id).await? {
        SelectOutcome::Connected(device) => {
            println!(
                "connected: {} ({})",
                device.display_name().unwrap_or_default(),
                device.id
            );
        }
        SelectOutcome::FailedAndRescanned(failure) => {
            println!("pairing failed ({failure}); rescan found:");
            for device in flow.snapshot().devices() {
                println!(
                    "{}  {}",
                    device.id,
                    device.display_name().unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

fn antenna(
    profile: Option<String>,
    gain: Option<String>,
    elevation: Option<String>,
    comma_decimal: bool,
) -> Result<()> {
    let locale = if comma_decimal {
        LocaleFormat::comma_decimal()
    } else {
        LocaleFormat::default()
    };
    let mut validator = AntennaConfigValidator::new(locale);

    if let Some(id) = profile {
        let profile =
            AntennaProfile::from_id(&id).ok_or_else(|| anyhow!("unknown antenna profile {id:?}"))?;
        validator.apply_profile(profile);
    }
    if let Some(text) = gain {
        if !validator.gain_editable() {
            bail!("gain is fixed for the {} profile", validator.profile());
        }
        validator.edit_gain(&text);
    }
    if let Some(text) = elevation {
        validator.edit_elevation(&text);
    }

    let config = validator.config();
    println!(
        "profile: {}  gain: {} dBi  elevation: {} m",
        validator.profile(),
        config.display_gain(),
        config.elevation_m
    );
    Ok(())
}

async fn resolve(gateway: &str, base_url: &str) -> Result<()> {
    let client = HttpOnboardingClient::new(base_url);
    let record = client.record(gateway).await?;
    println!("macEth0: {}", record.mac_eth0);
    Ok(())
}
