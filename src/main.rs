//! onac: stimulus presentation and trigger synchronization for optical
//! neuroimaging sessions.
//!
//! ```bash
//! # Live MMN session on the configured trigger port
//! onac mmn --participant 017
//!
//! # Dry run of the memory task without a window or hardware
//! onac memory --headless
//!
//! # Serial ports the recorder could be on
//! onac ports
//! ```

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use onac_app::{WindowDisplay, WindowOptions};
use onac_audio::{AudioSink, NullAudio};
use onac_core::{Display, Error, ExperimentInfo, TEST_PARTICIPANT};
use onac_experiment::{HeadlessDisplay, OnacConfig, Session, Task, DEFAULT_CONFIG_FILE};
use onac_timing::{HighPrecisionTimer, ManualTimer, Timer};
use onac_trigger::{list_ports, NullTrigger, SerialTrigger, TriggerPort};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

const HEADLESS_REFRESH_HZ: f64 = 60.0;

#[derive(Parser, Debug)]
#[command(name = "onac")]
#[command(author, version, about = "Stimulus presentation for optical neuroimaging tasks", long_about = None)]
struct Cli {
    /// Configuration file, created with defaults when missing
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Logging verbosity (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Auditory oddball (mismatch negativity)
    Mmn(RunArgs),
    /// Naturalistic motor task
    Motor(RunArgs),
    /// Resting state block
    Resting(RunArgs),
    /// Implicit memory task
    Memory(RunArgs),
    /// Flickering checkerboard with lateralized wedges
    Visual(RunArgs),
    /// Centred full-field checkerboard for bNIRS
    VisualBnirs(RunArgs),
    /// List serial ports
    Ports,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Participant ID; prompted for in live sessions when omitted
    #[arg(short, long)]
    participant: Option<String>,

    /// Trigger port, e.g. /dev/ttyUSB0 or COM4
    #[arg(long)]
    port: Option<String>,

    /// Run without a window, audio or triggers on a virtual clock
    #[arg(long)]
    headless: bool,

    /// Open a window at the configured resolution instead of fullscreen
    #[arg(long)]
    windowed: bool,

    /// Dry run: no participant prompt and no triggers
    #[arg(long)]
    test: bool,

    /// Seed for trial order and jitter
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (task, args) = match cli.command {
        Commands::Ports => {
            logging::init(&cli.log_level, None)?;
            let ports = list_ports();
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                println!("{port}");
            }
            return Ok(());
        }
        Commands::Mmn(args) => (Task::Mmn, args),
        Commands::Motor(args) => (Task::Motor, args),
        Commands::Resting(args) => (Task::Resting, args),
        Commands::Memory(args) => (Task::Memory, args),
        Commands::Visual(args) => (Task::Visual, args),
        Commands::VisualBnirs(args) => (Task::VisualBnirs, args),
    };

    let mut config = OnacConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    apply_overrides(&mut config, &args);

    let participant = match participant(&config, &args) {
        Ok(participant) => participant,
        Err(Error::Cancelled) => {
            println!("Cancelled");
            return Ok(());
        }
        Err(e) => return Err(e).context("reading the participant ID"),
    };
    let info = ExperimentInfo::new(
        &participant,
        &config.session.experiment_name,
        task.script(),
    );
    let mut log_file = info.output_stem(&config.paths.data_dir).into_os_string();
    log_file.push(".log");
    logging::init(&cli.log_level, Some(&PathBuf::from(log_file)))?;
    info!(
        "onac v{} running {} for participant {}",
        env!("CARGO_PKG_VERSION"),
        task,
        info.participant
    );

    if args.headless {
        let timer = ManualTimer::new();
        let display = HeadlessDisplay::new(
            config.display.resolution,
            timer.clone(),
            HEADLESS_REFRESH_HZ,
        );
        let audio = NullAudio {
            sample_rate: config.audio.sample_rate,
        };
        return run(task, display, timer, Box::new(NullTrigger), Box::new(audio), config, info);
    }

    let port = open_port(&config, task)?;
    let audio = open_audio(&config)?;
    let timer = HighPrecisionTimer::new();
    let options = WindowOptions {
        title: config.session.experiment_name.clone(),
        resolution: config.display.resolution,
        fullscreen: config.display.fullscreen,
        screen: config.display.screen,
        font: config.paths.font.as_ref().map(|f| config.resolve(f)),
    };
    let display = WindowDisplay::open(options, timer.clone()).context("opening the window")?;
    run(task, display, timer, port, audio, config, info)
}

fn apply_overrides(config: &mut OnacConfig, args: &RunArgs) {
    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if args.seed.is_some() {
        config.session.seed = args.seed;
    }
    if args.windowed {
        config.display.fullscreen = false;
    }
    if args.test || args.headless {
        config.session.live = false;
    }
}

/// Flag value, else a terminal prompt in live sessions, else the test ID.
fn participant(config: &OnacConfig, args: &RunArgs) -> onac_core::Result<String> {
    if let Some(participant) = &args.participant {
        return Ok(participant.trim().to_string());
    }
    if !(config.session.live && config.session.prompt_participant) {
        return Ok(TEST_PARTICIPANT.to_string());
    }

    print!("{} participant: ", config.session.experiment_name);
    std::io::stdout().flush()?;
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    let participant = line.trim();
    if read == 0 || participant.is_empty() {
        return Err(Error::Cancelled);
    }
    Ok(participant.to_string())
}

/// The configured serial port for live sessions of tasks that send triggers.
fn open_port(config: &OnacConfig, task: Task) -> Result<Box<dyn TriggerPort>> {
    if !config.session.live || task == Task::VisualBnirs {
        return Ok(Box::new(NullTrigger));
    }
    let Some(name) = &config.serial.port else {
        bail!("live sessions need a trigger port: set [serial] port or pass --port (or use --test)");
    };
    let port = SerialTrigger::open(name, config.serial.baud)
        .with_context(|| format!("opening trigger port {name}"))?;
    Ok(Box::new(port))
}

#[cfg(feature = "audio-output")]
fn open_audio(config: &OnacConfig) -> Result<Box<dyn AudioSink>> {
    let output = onac_audio::CpalOutput::open(config.audio.volume).context("opening audio output")?;
    Ok(Box::new(output))
}

#[cfg(not(feature = "audio-output"))]
fn open_audio(config: &OnacConfig) -> Result<Box<dyn AudioSink>> {
    warn!("built without audio output, sounds will be skipped");
    Ok(Box::new(NullAudio {
        sample_rate: config.audio.sample_rate,
    }))
}

/// Bootstrap, the task, then shutdown whatever happened.
fn run<D, T>(
    task: Task,
    display: D,
    timer: T,
    port: Box<dyn TriggerPort>,
    audio: Box<dyn AudioSink>,
    config: OnacConfig,
    info: ExperimentInfo,
) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
{
    let mut session = Session::new(display, timer, port, audio, config, info);
    let outcome = session.bootstrap().and_then(|_| task.run(&mut session));
    let closed = session.shutdown();

    match outcome {
        Err(e) if e.is_escape() => {
            info!("Experiment aborted with escape");
            closed.context("shutting down")
        }
        Err(e) => {
            if let Err(close_error) = closed {
                warn!(error = %close_error, "shutdown after failure also failed");
            }
            Err(e).with_context(|| format!("running {task}"))
        }
        Ok(()) => {
            info!("{task} finished, results in {}", session.stem().display());
            closed.context("shutting down")
        }
    }
}
