// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use crate::drivers::{LinkTimeouts, Role, SimulatedBench, WaveShape};
use crate::plan::Spacing;
use crate::types::{MeasureMode, ProbeChannels, SignalSettings};
#[derive(Parser, Debug)]
#[command(author, version, about = "Bode sweeps of a device under test on a networked bench")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Lab profile (JSON) with host template, ports and timeouts
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,
    /// Raise the log level (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Step the generator across a frequency range and report gain and phase
    Sweep(SweepArgs),
    /// Read gain and phase once at a fixed frequency
    Probe(ProbeArgs),
}
#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    /// Lab bench number substituted into the host template
    #[arg(long, required_unless_present = "simulate")]
    pub slab: Option<String>,
    /// Run against the in-process simulated bench instead of lab hardware
    #[arg(long)]
    pub simulate: bool,
    /// Generator output driving the device (1 or 2)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub mfg_output: u8,
    /// Oscilloscope channel on the device input
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub ch_in: u8,
    /// Oscilloscope channel on the device output
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub ch_out: u8,
}
impl BenchArgs {
    pub fn channels(&self) -> ProbeChannels {
        ProbeChannels {
            input: self.ch_in,
            output: self.ch_out,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Direct,
    Spectral,
}
#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub bench: BenchArgs,
    #[arg(long)]
    pub f_min: f64,
    #[arg(long)]
    pub f_max: f64,
    /// Number of stepped set-points
    #[arg(long, required_unless_present = "duration", conflicts_with = "duration")]
    pub points: Option<usize>,
    /// Let the generator sweep on its own for this many seconds instead
    #[arg(long)]
    pub duration: Option<f64>,
    /// Generator amplitude (Vpp)
    #[arg(long, default_value_t = 0.1)]
    pub amplitude: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub offset: f64,
    #[arg(long, value_enum, default_value_t = WaveShape::Sine)]
    pub waveform: WaveShape,
    #[arg(long, value_enum, default_value_t = Spacing::Log)]
    pub spacing: Spacing,
    #[arg(long, default_value_t = 200)]
    pub settle_ms: u64,
    #[arg(long, value_enum, default_value_t = ModeArg::Direct)]
    pub mode: ModeArg,
    /// Oscilloscope sampling rate used to label captured records (spectral mode)
    #[arg(long, default_value_t = 1e6)]
    pub sample_rate: f64,
    /// Auto-range the oscilloscope after every frequency change
    #[arg(long)]
    pub autoset_each_step: bool,
    /// Wait at most this long for each acquisition before capturing
    #[arg(long)]
    pub acquire_timeout_ms: Option<u64>,
    /// Show what was measured before a failure, then exit with the error
    #[arg(long)]
    pub keep_partial: bool,
    /// Also write the Bode plot to this PNG file
    #[arg(long)]
    pub png: Option<PathBuf>,
    #[arg(long)]
    pub no_window: bool,
}
impl SweepArgs {
    pub fn signal(&self) -> SignalSettings {
        SignalSettings {
            shape: self.waveform,
            amplitude_v: self.amplitude,
            offset_v: self.offset,
        }
    }
    pub fn measure_mode(&self) -> Result<MeasureMode> {
        match (self.mode, self.duration) {
            (ModeArg::Spectral, Some(_)) => {
                bail!("a timed sweep (--duration) only supports --mode direct")
            }
            (ModeArg::Direct, _) => Ok(MeasureMode::Direct),
            (ModeArg::Spectral, None) => Ok(MeasureMode::Spectral {
                sample_rate_hz: self.sample_rate,
            }),
        }
    }
}
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub bench: BenchArgs,
    #[arg(long)]
    pub frequency: f64,
    #[arg(long, default_value_t = 0.1)]
    pub amplitude: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub offset: f64,
    #[arg(long, default_value_t = 10_000)]
    pub settle_ms: u64,
}
impl ProbeArgs {
    pub fn signal(&self) -> SignalSettings {
        SignalSettings {
            shape: WaveShape::Sine,
            amplitude_v: self.amplitude,
            offset_v: self.offset,
        }
    }
}
/// Where the lab instruments live and how long to wait on them.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LabProfile {
    /// `{lab}` and `{role}` are substituted; role is `mfg` or `mdo`.
    pub host_template: String,
    pub source_port: u16,
    pub analyzer_port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub simulation: SimulatedBench,
}
impl Default for LabProfile {
    fn default() -> Self {
        let timeouts = LinkTimeouts::default();
        Self {
            host_template: "nano-slab-{lab}-{role}.uio.no".to_string(),
            source_port: 1026,
            analyzer_port: 3000,
            connect_timeout_ms: timeouts.connect.as_millis() as u64,
            read_timeout_ms: timeouts.read.as_millis() as u64,
            write_timeout_ms: timeouts.write.as_millis() as u64,
            simulation: SimulatedBench::default(),
        }
    }
}
impl LabProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading lab profile {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing lab profile {}", path.display()))
    }
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
    pub fn host(&self, lab: &str, role: Role) -> String {
        self.host_template
            .replace("{lab}", lab)
            .replace("{role}", role.host_tag())
    }
    pub fn port(&self, role: Role) -> u16 {
        match role {
            Role::Source => self.source_port,
            Role::Analyzer => self.analyzer_port,
        }
    }
    pub fn timeouts(&self) -> LinkTimeouts {
        LinkTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
            write: Duration::from_millis(self.write_timeout_ms),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_profile_targets_the_lab_hosts() {
        let profile = LabProfile::default();
        assert_eq!(profile.host("3", Role::Source), "nano-slab-3-mfg.uio.no");
        assert_eq!(profile.host("3", Role::Analyzer), "nano-slab-3-mdo.uio.no");
        assert_eq!(profile.port(Role::Source), 1026);
        assert_eq!(profile.port(Role::Analyzer), 3000);
    }
    #[test]
    fn partial_profile_keeps_defaults() {
        let profile = LabProfile::from_json(
            r#"{"host_template": "bench-{lab}-{role}.local", "read_timeout_ms": 2500,
                "simulation": {"dc_gain_db": 40.0}}"#,
        )
        .unwrap();
        assert_eq!(profile.host("7", Role::Analyzer), "bench-7-mdo.local");
        assert_eq!(profile.analyzer_port, 3000);
        assert_eq!(profile.timeouts().read, Duration::from_millis(2500));
        assert_eq!(profile.timeouts().connect, Duration::from_secs(5));
        assert_eq!(profile.simulation.dc_gain_db, 40.0);
        assert_eq!(profile.simulation.dominant_pole_hz, 10.0);
    }
    #[test]
    fn malformed_profile_is_an_error() {
        assert!(LabProfile::from_json("{\"source_port\": \"many\"}").is_err());
    }
    const BENCH: [&str; 8] = [
        "--slab", "4", "--mfg-output", "1", "--ch-in", "1", "--ch-out", "2",
    ];
    fn parse(subcommand: &str, extra: &[&str]) -> Result<Cli, clap::Error> {
        let mut line = vec!["bodesweep", subcommand];
        line.extend(BENCH);
        if subcommand == "sweep" {
            line.extend(["--f-min", "100", "--f-max", "100000"]);
        }
        line.extend(extra);
        Cli::try_parse_from(line)
    }
    #[test]
    fn sweep_defaults() {
        let cli = parse("sweep", &["--points", "20"]).unwrap();
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.bench.slab.as_deref(), Some("4"));
        assert_eq!(args.bench.mfg_output, 1);
        assert_eq!(args.f_min, 100.0);
        assert_eq!(args.f_max, 100_000.0);
        assert_eq!(args.points, Some(20));
        assert_eq!(args.amplitude, 0.1);
        assert_eq!(args.offset, 0.0);
        assert_eq!(args.waveform, WaveShape::Sine);
        assert_eq!(args.spacing, Spacing::Log);
        assert_eq!(args.bench.channels(), ProbeChannels { input: 1, output: 2 });
        assert_eq!(args.measure_mode().unwrap(), MeasureMode::Direct);
        assert!(!args.bench.simulate);
    }
    #[test]
    fn bench_wiring_has_no_defaults() {
        let full = [
            "bodesweep", "sweep", "--slab", "4", "--mfg-output", "2", "--ch-in", "1",
            "--ch-out", "2", "--f-min", "100", "--f-max", "1000", "--points", "5",
        ];
        assert!(Cli::try_parse_from(full).is_ok());
        // dropping any one of the wiring flags (with its value) is rejected
        for flag in [2, 4, 6, 8, 10, 12] {
            let line: Vec<&str> = full
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != flag && i != flag + 1)
                .map(|(_, arg)| *arg)
                .collect();
            assert!(Cli::try_parse_from(line).is_err(), "accepted without {}", full[flag]);
        }
    }
    #[test]
    fn simulate_replaces_the_lab_number() {
        let cli = Cli::try_parse_from([
            "bodesweep", "probe", "--simulate", "--mfg-output", "2", "--ch-in", "3",
            "--ch-out", "4", "--frequency", "500",
        ])
        .unwrap();
        let Command::Probe(args) = cli.command else {
            panic!("expected probe");
        };
        assert!(args.bench.simulate);
        assert_eq!(args.bench.slab, None);
        assert_eq!(args.bench.mfg_output, 2);
    }
    #[test]
    fn generator_output_is_one_or_two() {
        let line = |output: &'static str| {
            Cli::try_parse_from([
                "bodesweep", "probe", "--slab", "4", "--mfg-output", output, "--ch-in", "1",
                "--ch-out", "2", "--frequency", "500",
            ])
        };
        assert!(line("2").is_ok());
        assert!(line("0").is_err());
        assert!(line("3").is_err());
    }
    #[test]
    fn sweep_needs_exactly_one_extent() {
        assert!(parse("sweep", &[]).is_err());
        assert!(parse("sweep", &["--points", "5", "--duration", "2"]).is_err());
        assert!(parse("sweep", &["--duration", "2"]).is_ok());
    }
    #[test]
    fn timed_sweep_rejects_spectral_mode() {
        let cli = parse("sweep", &["--duration", "2", "--mode", "spectral"]).unwrap();
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert!(args.measure_mode().is_err());
    }
    #[test]
    fn waveform_accepts_instrument_names() {
        let cli = parse("sweep", &["--points", "3", "--waveform", "SQU", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.waveform, WaveShape::Square);
    }
    #[test]
    fn channels_are_bounded() {
        let line = |ch_in: &'static str| {
            Cli::try_parse_from([
                "bodesweep", "probe", "--slab", "4", "--mfg-output", "1", "--ch-in", ch_in,
                "--ch-out", "2", "--frequency", "500",
            ])
        };
        assert!(line("4").is_ok());
        assert!(line("5").is_err());
        assert!(line("0").is_err());
    }
    #[test]
    fn probe_waits_ten_seconds_by_default() {
        let cli = parse("probe", &["--frequency", "2500"]).unwrap();
        let Command::Probe(args) = cli.command else {
            panic!("expected probe");
        };
        assert_eq!(args.settle_ms, 10_000);
        assert_eq!(args.frequency, 2500.0);
        assert_eq!(args.signal().shape, WaveShape::Sine);
    }
}
