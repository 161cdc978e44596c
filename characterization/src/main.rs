//! Command line entry point for the characterization suite.

use std::{path::PathBuf, process::ExitCode, thread, time::Duration};

use chrono::Local;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

use anritsu_ms9740b::Ms9740b;
use arroyo_ldd7144::{Ldd7144, SerialLinkLdd7144};
use arroyo_tec5240::{SerialLinkTec5240, Tec5240};
use instrumentlink::{InstrumentError, TcpLink};
use zeus_controller::{ZeusController, ZeusSession};

use light_engine_characterization::{
    acquire::AcquisitionStep,
    config::SuiteConfig,
    error::RunError,
    instruments::{AuxMonitor, Instruments},
    notify::{run_message, TeamsNotifier},
    persist::{CsvSink, PostgresSink, ResultSink, SinkObserver},
    procedure::{RunOutcome, SweepController, SweepPlan},
};

const CONNECT_ATTEMPTS: usize = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Characterize one channel of a light engine over bias current and
/// temperature.
#[derive(Debug, Parser)]
#[command(name = "le-char", version)]
struct Args {
    /// Path to the suite configuration file.
    #[arg(short, long, default_value = "characterization.toml")]
    config: PathBuf,

    /// Serial number or label of the light engine under test.
    #[arg(short, long)]
    light_engine_id: String,

    /// Light-engine channel to characterize, 0 through 7.
    #[arg(long, default_value_t = 0)]
    channel: usize,

    /// CSV output path. Defaults to a name derived from the device, channel,
    /// and start time.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Args {
    fn csv_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => PathBuf::from(format!(
                "{}_channel{}_{}.csv",
                self.light_engine_id,
                self.channel,
                Local::now().format("%Y%m%d_%H%M%S")
            )),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(&args) {
        Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
        Ok(RunOutcome::Cancelled) => {
            warn!("run was cancelled");
            ExitCode::FAILURE
        }
        Ok(RunOutcome::Failed(_)) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunOutcome, RunError> {
    let config = SuiteConfig::load(&args.config)?;
    // The notifier is built before any instrument is touched, so connect
    // and setup failures still reach the webhook.
    let notifier = config
        .notification
        .as_ref()
        .map(|section| TeamsNotifier::new(section.webhook_url.as_str()));

    let result = execute_run(args, &config);
    if let Some(notifier) = &notifier {
        notifier.send(&run_message(
            &args.light_engine_id,
            args.channel,
            result.as_ref(),
        ));
    }
    result
}

fn execute_run(args: &Args, config: &SuiteConfig) -> Result<RunOutcome, RunError> {
    let plan = SweepPlan {
        temperature_axis: config.sweep.temperature_axis()?,
        bias_axis: config.sweep.bias_axis()?,
    };
    info!(
        "characterizing {} channel {}: {} grid points",
        args.light_engine_id,
        args.channel,
        plan.total_points()
    );

    let mut tec = Tec5240::new(connect_with_retry("TEC source", || {
        SerialLinkTec5240::open(&config.instruments.tec_port)
    })?);
    let mut ldd = Ldd7144::new(connect_with_retry("laser diode driver", || {
        SerialLinkLdd7144::open(&config.instruments.ldd_port)
    })?);
    let mut osa = Ms9740b::new(connect_with_retry("spectrum analyzer", || {
        TcpLink::connect(config.instruments.osa_address.as_str())
    })?);
    let mut zeus = match &config.instruments.zeus {
        Some(section) => {
            let link = connect_with_retry("zeus board", || {
                ZeusSession::connect(&section.host, &section.username, &section.password)
            })?;
            let mut board = ZeusController::new(link);
            board.set_fan_duty(section.fan_duty)?;
            Some(board)
        }
        None => None,
    };

    osa.set_span(
        config.osa.wavelength_start_nm,
        config.osa.wavelength_stop_nm,
        config.osa.points,
    )?;
    osa.set_resolution(config.osa.resolution_nm, &config.osa.vbw)?;
    ldd.set_channel(config.instruments.ldd_channel)?;
    ldd.set_output(true)?;

    // A sink that cannot be opened degrades the run instead of aborting it:
    // whatever can still be written, is.
    let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
    let csv_path = args.csv_path();
    match CsvSink::create(&csv_path) {
        Ok(sink) => {
            info!("writing records to {}", csv_path.display());
            sinks.push(Box::new(sink));
        }
        Err(err) => warn!("cannot open {}: {err}", csv_path.display()),
    }
    if let Some(database) = &config.database {
        match PostgresSink::connect(&database.url) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => warn!("database unavailable, continuing without it: {err}"),
        }
    }
    if sinks.is_empty() {
        warn!("no sink could be opened; records will only appear in the log");
    }

    let aux: Option<&mut dyn AuxMonitor> = zeus.as_mut().map(|board| board as _);
    let step = AcquisitionStep::new(
        Instruments {
            bias: &mut ldd,
            tec: &mut tec,
            osa: &mut osa,
            aux,
        },
        args.light_engine_id.as_str(),
        args.channel,
    )
    .with_settling(config.settling.to_config())
    .with_sweep_retry_limit(config.sweep.sweep_retry_limit);

    let mut controller = SweepController::new(step, plan);
    let mut observer = SinkObserver::new(sinks);
    Ok(controller.execute(&mut observer, &mut || false))
}

/// Connect to one instrument, retrying a fixed number of times so a rack
/// that is still powering up does not abort the run.
fn connect_with_retry<T>(
    what: &str,
    mut connect: impl FnMut() -> Result<T, InstrumentError>,
) -> Result<T, RunError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match connect() {
            Ok(link) => {
                info!("connected to the {what}");
                return Ok(link);
            }
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                warn!("could not connect to the {what} (attempt {attempt}): {err}");
                thread::sleep(CONNECT_RETRY_DELAY);
            }
            Err(err) => return Err(err.into()),
        }
    }
}
