// fesd test application -- CLI tool for exercising SC2470 converters
// against real hardware.
//
// Usage:
//   fesd-test-app --ports /dev/ttyUSB0,/dev/ttyUSB1 list
//   fesd-test-app --ports /dev/ttyUSB0 --slot 1 info
//   fesd-test-app --ports COM3 freq rf-if --path rx 12.7e9 6e9
//   fesd-test-app --ports COM3 --serial 00A1 gain set --path tx 10
//   fesd-test-app --ports COM3 stress --count 200

use std::io::{self, Write};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use tracing_subscriber::EnvFilter;

use fesd::{
    format_freq_ghz, BypassFrequency, DcBias, DuplexSetting, FeSerialDriver, FrequencySet,
    IfFrequency, LoFrequency, Path, RfFrequency, Sc2470Commander,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// fesd test application -- drives SC2470 converters from the command line.
#[derive(Parser)]
#[command(name = "fesd-test-app", version, about)]
struct Cli {
    /// Comma-separated serial ports to search (e.g. /dev/ttyUSB0,COM3).
    #[arg(long)]
    ports: String,

    /// Select the device by slot id.
    #[arg(long, conflicts_with = "serial")]
    slot: Option<u16>,

    /// Select the device by serial number.
    #[arg(long)]
    serial: Option<String>,

    /// Log every transaction (same as RUST_LOG=debug).
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List discovered devices.
    List,

    /// Print identification and current settings of one device.
    Info,

    /// Frequency plan operations.
    Freq {
        #[command(subcommand)]
        action: FreqAction,
    },

    /// Gain operations.
    Gain {
        #[command(subcommand)]
        action: ValueAction,
    },

    /// Attenuation operations.
    Atten {
        #[command(subcommand)]
        action: ValueAction,
    },

    /// LO frequency operations.
    Lo {
        #[command(subcommand)]
        action: ValueAction,
    },

    /// LO phase offset operations (degrees).
    Phase {
        #[command(subcommand)]
        action: ValueAction,
    },

    /// IQ DC bias operations.
    Bias {
        #[command(subcommand)]
        action: BiasAction,
    },

    /// Duplex operations.
    Duplex {
        #[command(subcommand)]
        action: DuplexAction,
    },

    /// Reset the device. Blocks for about ten seconds.
    Reset,

    /// Stress test: random frequency plans with range-checked read-back.
    Stress {
        /// Number of plan/read-back cycles.
        #[arg(long, default_value_t = 100)]
        count: u32,

        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
    },
}

#[derive(Subcommand)]
enum FreqAction {
    /// Read the current RF/IF/LO triple.
    Get {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
    },
    /// Plan from RF and IF (Hz).
    RfIf {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
        rf_hz: f64,
        if_hz: f64,
    },
    /// Plan from RF and LO (Hz).
    RfLo {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
        rf_hz: f64,
        lo_hz: f64,
    },
    /// Plan from IF and LO (Hz).
    IfLo {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
        if_hz: f64,
        lo_hz: f64,
    },
    /// Send an explicit triple (Hz). Zero leaves a field to the device.
    Set {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
        rf_hz: f64,
        if_hz: f64,
        lo_hz: f64,
    },
    /// Bypass the mixer at one frequency (Hz).
    Bypass {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
        freq_hz: f64,
    },
}

/// Get/set of a single per-path number.
#[derive(Subcommand)]
enum ValueAction {
    Get {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
    },
    Set {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },
    /// Calibrated limits (gain only).
    Limits {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
    },
}

#[derive(Subcommand)]
enum BiasAction {
    Get {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
    },
    Set {
        #[arg(long, value_enum, default_value = "rx")]
        path: PathArg,
        #[arg(allow_hyphen_values = true)]
        i: i32,
        #[arg(allow_hyphen_values = true)]
        q: i32,
    },
}

#[derive(Subcommand)]
enum DuplexAction {
    Get,
    Set {
        #[arg(value_enum)]
        setting: DuplexArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PathArg {
    Rx,
    Tx,
}

impl From<PathArg> for Path {
    fn from(arg: PathArg) -> Self {
        match arg {
            PathArg::Rx => Path::Rx,
            PathArg::Tx => Path::Tx,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DuplexArg {
    Fdd,
    TddRx,
    TddTx,
}

impl From<DuplexArg> for DuplexSetting {
    fn from(arg: DuplexArg) -> Self {
        match arg {
            DuplexArg::Fdd => DuplexSetting::Fdd,
            DuplexArg::TddRx => DuplexSetting::TddRx,
            DuplexArg::TddTx => DuplexSetting::TddTx,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Prompt the user for y/N confirmation. Returns true only if "y" or "Y" entered.
fn confirm(prompt: &str) -> bool {
    print!("{prompt}");
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim(), "y" | "Y")
}

fn print_set(path: Path, set: &FrequencySet) {
    println!("{path}: {set}");
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    (min..=max).contains(&value)
}

/// Pick the device named on the command line, or the only one found.
fn select(cli: &Cli, driver: &FeSerialDriver) -> Result<Sc2470Commander> {
    if let Some(serial) = &cli.serial {
        return Ok(driver.sc2470_commander_by_serial(serial)?);
    }
    if let Some(slot) = cli.slot {
        return Ok(driver.sc2470_commander_by_slot(slot)?);
    }
    let mut all = driver.sc2470_commanders();
    match all.len() {
        0 => bail!("no SC2470 found on {}", cli.ports),
        1 => Ok(all.remove(0)),
        n => bail!("{n} devices found; choose one with --serial or --slot"),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_list(driver: &FeSerialDriver) -> Result<()> {
    let devices = driver.devices();
    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }
    println!("{:<6} {:<10} {:<10} {:>8} {:>8}", "SLOT", "TYPE", "SERIAL", "FW", "HW");
    for info in devices {
        println!(
            "{:<6} {:<10} {:<10} {:>8.2} {:>8.2}",
            info.slot_id,
            info.device_type.to_string(),
            info.serial_number_str,
            info.firmware_version,
            info.hardware_version
        );
    }
    Ok(())
}

async fn cmd_info(sc: &Sc2470Commander) -> Result<()> {
    let general = sc.general();
    println!("Slot:             {}", sc.slot_id());
    println!("Identification:   {}", general.id().await?);
    println!("Serial number:    {}", general.serial_number().await?);
    println!("Firmware:         {}", general.firmware_version().await?);
    println!("Hardware:         {}", general.hardware_version().await?);
    println!("Role:             {:?}", general.system_role().await?);
    println!("Reference:        {}", sc.reference_source().await?);
    println!("Duplex:           {}", sc.duplex_setting().await?);
    for path in Path::ALL {
        println!();
        println!("[{path}]");
        println!("  Frequencies:    {}", sc.frequencies(path).await?);
        println!("  Gain:           {:.2} dB", sc.gain(path).await?);
        println!("  Attenuation:    {:.2} dB", sc.attenuation(path).await?);
        println!("  LO enabled:     {}", sc.lo_enable(path).await?);
        println!("  Synth mode:     {:?}", sc.synthesizer_mode(path).await?);
        println!("  Phase offset:   {:.3} deg", sc.phase_offset(path).await?);
    }
    Ok(())
}

async fn cmd_freq(sc: &Sc2470Commander, action: &FreqAction) -> Result<()> {
    let (path, set): (Path, FrequencySet) = match *action {
        FreqAction::Get { path } => (path.into(), sc.frequencies(path.into()).await?),
        FreqAction::RfIf { path, rf_hz, if_hz } => {
            let set = sc
                .configure_rf_if(path.into(), RfFrequency::new(rf_hz), IfFrequency::new(if_hz))
                .await?;
            (path.into(), set)
        }
        FreqAction::RfLo { path, rf_hz, lo_hz } => {
            let set = sc
                .configure_rf_lo(path.into(), RfFrequency::new(rf_hz), LoFrequency::new(lo_hz))
                .await?;
            (path.into(), set)
        }
        FreqAction::IfLo { path, if_hz, lo_hz } => {
            let set = sc
                .configure_if_lo(path.into(), IfFrequency::new(if_hz), LoFrequency::new(lo_hz))
                .await?;
            (path.into(), set)
        }
        FreqAction::Set {
            path,
            rf_hz,
            if_hz,
            lo_hz,
        } => {
            let request = FrequencySet {
                rf_hz,
                if_hz,
                lo_hz,
            };
            (path.into(), sc.configure_frequency_set(path.into(), request).await?)
        }
        FreqAction::Bypass { path, freq_hz } => {
            let set = sc
                .configure_bypass_frequency(path.into(), BypassFrequency::new(freq_hz))
                .await?;
            (path.into(), set)
        }
    };
    print_set(path, &set);
    Ok(())
}

async fn cmd_gain(sc: &Sc2470Commander, action: &ValueAction) -> Result<()> {
    match *action {
        ValueAction::Get { path } => println!("{:.2} dB", sc.gain(path.into()).await?),
        ValueAction::Set { path, value } => {
            println!("{:.2} dB", sc.configure_gain(path.into(), value).await?)
        }
        ValueAction::Limits { path } => {
            let limits = sc.gain_limits(path.into()).await?;
            println!("{:.2} .. {:.2} dB", limits.min_db, limits.max_db);
        }
    }
    Ok(())
}

async fn cmd_atten(sc: &Sc2470Commander, action: &ValueAction) -> Result<()> {
    match *action {
        ValueAction::Get { path } => println!("{:.2} dB", sc.attenuation(path.into()).await?),
        ValueAction::Set { path, value } => {
            println!("{:.2} dB", sc.configure_attenuation(path.into(), value).await?)
        }
        ValueAction::Limits { .. } => bail!("attenuation has fixed limits"),
    }
    Ok(())
}

async fn cmd_lo(sc: &Sc2470Commander, action: &ValueAction) -> Result<()> {
    match *action {
        ValueAction::Get { path } => println!("{}", format_freq_ghz(sc.lo_frequency(path.into()).await?)),
        ValueAction::Set { path, value } => {
            let hz = sc.configure_lo_frequency(path.into(), value).await?;
            println!("{}", format_freq_ghz(hz));
        }
        ValueAction::Limits { .. } => println!(
            "{} .. {}",
            format_freq_ghz(LoFrequency::MIN_HZ),
            format_freq_ghz(LoFrequency::MAX_HZ)
        ),
    }
    Ok(())
}

async fn cmd_phase(sc: &Sc2470Commander, action: &ValueAction) -> Result<()> {
    match *action {
        ValueAction::Get { path } => println!("{:.3} deg", sc.phase_offset(path.into()).await?),
        ValueAction::Set { path, value } => {
            println!("{:.3} deg", sc.configure_phase_offset(path.into(), value).await?)
        }
        ValueAction::Limits { .. } => bail!("phase offset has fixed limits"),
    }
    Ok(())
}

async fn cmd_bias(sc: &Sc2470Commander, action: &BiasAction) -> Result<()> {
    let bias = match *action {
        BiasAction::Get { path } => sc.dc_bias(path.into()).await?,
        BiasAction::Set { path, i, q } => sc.configure_dc_bias(path.into(), DcBias::new(i, q)).await?,
    };
    println!("I={} Q={}", bias.i(), bias.q());
    Ok(())
}

async fn cmd_duplex(sc: &Sc2470Commander, action: &DuplexAction) -> Result<()> {
    let setting = match *action {
        DuplexAction::Get => sc.duplex_setting().await?,
        DuplexAction::Set { setting } => sc.configure_duplex_setting(setting.into()).await?,
    };
    println!("{setting}");
    Ok(())
}

async fn cmd_reset(sc: &Sc2470Commander) -> Result<()> {
    if !confirm("Reset the device? Every channel on the port is interrupted. [y/N] ") {
        println!("Aborted.");
        return Ok(());
    }
    let start = Instant::now();
    sc.reset_device().await.context("device did not come back after reset")?;
    println!("Device back after {:.1} s", start.elapsed().as_secs_f64());
    Ok(())
}

async fn cmd_stress(sc: &Sc2470Commander, count: u32, path: Path) -> Result<()> {
    let baseline = sc.frequencies(path).await?;
    println!("Stress test: {count} cycles on {path}");
    println!("Baseline: {baseline}");

    let mut rng = rand::thread_rng();
    let mut success = 0u32;
    let mut failures = 0u32;
    let start = Instant::now();

    for i in 1..=count {
        let rf = RfFrequency::new(rng.gen_range(RfFrequency::MIN_HZ..=RfFrequency::MAX_HZ));
        let if_ = IfFrequency::new(rng.gen_range(IfFrequency::MIN_HZ..=IfFrequency::MAX_HZ));
        let lo = LoFrequency::new(rng.gen_range(LoFrequency::MIN_HZ..=LoFrequency::MAX_HZ));

        let result = match rng.gen_range(0..3) {
            0 => sc.configure_rf_if(path, rf, if_).await,
            1 => sc.configure_rf_lo(path, rf, lo).await,
            _ => sc.configure_if_lo(path, if_, lo).await,
        };

        match result {
            Ok(set) => {
                let ok = in_range(set.rf_hz, RfFrequency::MIN_HZ, RfFrequency::MAX_HZ)
                    && in_range(set.if_hz, IfFrequency::MIN_HZ, IfFrequency::MAX_HZ)
                    && in_range(set.lo_hz, LoFrequency::MIN_HZ, LoFrequency::MAX_HZ);
                if ok {
                    success += 1;
                } else {
                    eprintln!("[{i}/{count}] out of range read-back: {set}");
                    failures += 1;
                }
            }
            Err(e) => {
                eprintln!("[{i}/{count}] plan failed ({:?}): {e}", e.kind());
                failures += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    let rate = if elapsed.as_secs_f64() > 0.0 {
        count as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    println!();
    println!("Results:");
    println!("  Total cycles:   {count}");
    println!("  Successes:      {success}");
    println!("  Failures:       {failures}");
    println!("  Elapsed:        {:.3} s", elapsed.as_secs_f64());
    println!("  Rate:           {rate:.1} cycles/sec");

    if let Err(e) = sc.configure_frequency_set(path, baseline).await {
        eprintln!("Warning: failed to restore baseline: {e}");
    } else {
        println!("  Restored:       {baseline}");
    }

    if failures > 0 {
        bail!("{failures} out of {count} stress test cycles failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let driver = FeSerialDriver::new(&cli.ports)
        .await
        .with_context(|| format!("failed to open {}", cli.ports))?;

    if matches!(cli.command, Command::List) {
        return cmd_list(&driver);
    }

    let sc = select(&cli, &driver)?;

    let result = match &cli.command {
        Command::List => unreachable!("list handled above"),
        Command::Info => cmd_info(&sc).await,
        Command::Freq { action } => cmd_freq(&sc, action).await,
        Command::Gain { action } => cmd_gain(&sc, action).await,
        Command::Atten { action } => cmd_atten(&sc, action).await,
        Command::Lo { action } => cmd_lo(&sc, action).await,
        Command::Phase { action } => cmd_phase(&sc, action).await,
        Command::Bias { action } => cmd_bias(&sc, action).await,
        Command::Duplex { action } => cmd_duplex(&sc, action).await,
        Command::Reset => cmd_reset(&sc).await,
        Command::Stress { count, path } => cmd_stress(&sc, *count, (*path).into()).await,
    };

    if let Err(e) = &result {
        if let Some(fesd_err) = e.downcast_ref::<fesd::Error>() {
            eprintln!("status {}", fesd_err.kind().status_code());
        }
    }
    result
}
