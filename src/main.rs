// src/main.rs
mod bode;
mod config;
mod drivers;
mod engine;
mod gui;
mod plan;
mod types;
use std::fs;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use crate::bode::BodeSummary;
use crate::config::{BenchArgs, Cli, Command, LabProfile, ProbeArgs, SweepArgs};
use crate::drivers::{
    render_bode_png, FunctionGenerator, Oscilloscope, PlotStyle, Role, SimulatedInstrument,
    TcpTransport, Transport,
};
use crate::engine::{PartialSweep, SweepEngine};
use crate::plan::{SweepPlan, TimedSweep};
use crate::types::{EngineSettings, MeasureMode, SamplePoint};
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG, when set, wins over -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let profile = match &cli.profile {
        Some(path) => LabProfile::load(path)?,
        None => LabProfile::default(),
    };
    match &cli.command {
        Command::Sweep(args) => {
            if args.bench.simulate {
                let mut bench = profile.simulation.clone();
                bench.sample_rate_hz = args.sample_rate;
                let (source, analyzer) = simulated(bench, &args.bench);
                sweep(source, analyzer, args)
            } else {
                let (source, analyzer) = connect(&profile, &args.bench)?;
                sweep(source, analyzer, args)
            }
        }
        Command::Probe(args) => {
            if args.bench.simulate {
                let (source, analyzer) = simulated(profile.simulation.clone(), &args.bench);
                probe(source, analyzer, args)
            } else {
                let (source, analyzer) = connect(&profile, &args.bench)?;
                probe(source, analyzer, args)
            }
        }
    }
}
fn connect(profile: &LabProfile, bench: &BenchArgs) -> Result<(TcpTransport, TcpTransport)> {
    let lab = bench
        .slab
        .as_deref()
        .context("--slab is required unless --simulate is given")?;
    let timeouts = profile.timeouts();
    let source = TcpTransport::connect(
        Role::Source,
        &profile.host(lab, Role::Source),
        profile.port(Role::Source),
        &timeouts,
    )
    .context("connecting to the function generator")?;
    let analyzer = TcpTransport::connect(
        Role::Analyzer,
        &profile.host(lab, Role::Analyzer),
        profile.port(Role::Analyzer),
        &timeouts,
    )
    .context("connecting to the oscilloscope")?;
    Ok((source, analyzer))
}
fn simulated(
    mut bench: drivers::SimulatedBench,
    args: &BenchArgs,
) -> (SimulatedInstrument, SimulatedInstrument) {
    bench.input_channel = args.ch_in;
    bench.output_channel = args.ch_out;
    info!(
        "simulated bench: {} dB DC gain, poles at {} Hz and {} Hz",
        bench.dc_gain_db, bench.dominant_pole_hz, bench.second_pole_hz
    );
    bench.connect()
}
fn open_engine<S: Transport, A: Transport>(
    source: S,
    analyzer: A,
    bench: &BenchArgs,
    settings: EngineSettings,
) -> Result<SweepEngine<S, A>> {
    let mut generator = FunctionGenerator::new(source, bench.mfg_output);
    let mut scope = Oscilloscope::new(analyzer);
    generator
        .identify()
        .context("identifying the function generator")?;
    scope.identify().context("identifying the oscilloscope")?;
    Ok(SweepEngine::new(generator, scope, settings))
}
enum Extent {
    Stepped(SweepPlan),
    Timed(TimedSweep),
}
fn sweep<S: Transport, A: Transport>(source: S, analyzer: A, args: &SweepArgs) -> Result<()> {
    let mut settings = EngineSettings::new(args.bench.channels(), args.measure_mode()?);
    settings.settle = Duration::from_millis(args.settle_ms);
    settings.autoset_each_step = args.autoset_each_step;
    settings.acquire_timeout = args.acquire_timeout_ms.map(Duration::from_millis);
    // validate before touching the bench
    let extent = match (args.points, args.duration) {
        (Some(count), _) => Extent::Stepped(SweepPlan::new(
            args.f_min,
            args.f_max,
            count,
            args.spacing,
        )?),
        (None, Some(seconds)) => Extent::Timed(TimedSweep::new(
            args.f_min,
            args.f_max,
            seconds,
            args.spacing,
        )?),
        (None, None) => bail!("either --points or --duration is required"),
    };
    settings.mode.check_frequency(args.f_max)?;
    let mut engine = open_engine(source, analyzer, &args.bench, settings)?;
    if let MeasureMode::Spectral { sample_rate_hz } = engine.settings().mode {
        info!("spectral measurement at {sample_rate_hz} Sa/s");
    }
    if let Err(err) = engine.prepare(&args.signal(), args.f_min, true) {
        engine.shutdown();
        return Err(err).context("preparing the bench");
    }
    let report = |idx: usize, point: &SamplePoint| {
        println!(
            "[{:>3}] {:>12.3} Hz  in {:.4} V  out {:.4} V  gain {:>8.3} dB  phase {:>8.3} deg",
            idx + 1,
            point.set_point_hz,
            point.input_amplitude,
            point.output_amplitude,
            point.gain_db,
            point.phase_deg
        );
    };
    let outcome = match &extent {
        Extent::Stepped(plan) => engine.run_partial(plan, report),
        Extent::Timed(timed) => engine.run_timed(timed, report),
    };
    engine.shutdown();
    let PartialSweep { points, failure } = outcome;
    match failure {
        None => present(points, args, "Bode sweep"),
        Some(err) if args.keep_partial && !points.is_empty() => {
            warn!("sweep stopped after {} points: {err}", points.len());
            present(points, args, "Bode sweep (partial)")?;
            Err(err).context("sweep aborted")
        }
        Some(err) => Err(err).context("sweep aborted"),
    }
}
fn present(mut points: Vec<SamplePoint>, args: &SweepArgs, title: &str) -> Result<()> {
    // timed sweeps sample whatever the generator is at
    points.sort_by(|a, b| a.set_point_hz.total_cmp(&b.set_point_hz));
    let summary = bode::summarize_points(&points).context("summarizing the sweep")?;
    print_summary(&summary);
    if let Some(path) = &args.png {
        let png = render_bode_png(&points, Some(&summary), PlotStyle::default())
            .context("rendering the Bode plot")?;
        fs::write(path, png).with_context(|| format!("writing {}", path.display()))?;
        info!("Bode plot written to {}", path.display());
    }
    if !args.no_window {
        gui::show(&points, Some(summary), title)?;
    }
    Ok(())
}
fn print_summary(summary: &BodeSummary) {
    println!(
        "unity gain at {:.3} Hz ({:+.3} dB, point {})",
        summary.unity_gain_hz,
        summary.gain_at_unity_db,
        summary.unity_index + 1
    );
    println!("phase margin {:.3} deg", summary.phase_margin_deg);
    if let Some(crossover) = &summary.crossover {
        println!(
            "interpolated 0 dB crossing at {:.3} Hz, phase margin {:.3} deg",
            crossover.frequency_hz, crossover.phase_margin_deg
        );
    }
}
fn probe<S: Transport, A: Transport>(source: S, analyzer: A, args: &ProbeArgs) -> Result<()> {
    let mut settings = EngineSettings::new(args.bench.channels(), MeasureMode::Direct);
    settings.settle = Duration::from_millis(args.settle_ms);
    let mut engine = open_engine(source, analyzer, &args.bench, settings)?;
    info!(
        "probing at {} Hz, settling {:?}",
        args.frequency,
        engine.settings().settle
    );
    let reading = engine.probe(&args.signal(), args.frequency);
    engine.shutdown();
    let point = reading.context("probing the device")?;
    if let Some(output_hz) = point.output_frequency_hz {
        println!("output frequency {output_hz:.3} Hz");
    }
    println!("output amplitude {:.4} V", point.output_amplitude);
    println!("phase difference {:.3} deg", point.phase_deg);
    println!("gain {:.3} dB", point.gain_db);
    Ok(())
}
