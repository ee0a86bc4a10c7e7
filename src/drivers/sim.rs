use std::cell::RefCell;
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::io;
use std::rc::Rc;
use std::time::Instant;
use log::warn;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rustfft::num_complex::Complex64;
use serde::Deserialize;
use crate::drivers::{Role, SweepError, Transport};
use crate::plan::Spacing;
/// Two-pole amplifier wired between a simulated generator and scope.
///
/// The generator output feeds the scope's input channel directly and the
/// scope's output channel through `H(f) = G0 / ((1 + jf/p1)(1 + jf/p2))`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimulatedBench {
    pub dc_gain_db: f64,
    pub dominant_pole_hz: f64,
    pub second_pole_hz: f64,
    /// Relative amplitude noise on every reading.
    pub noise_fraction: f64,
    pub seed: u64,
    pub sample_rate_hz: f64,
    pub record_length: usize,
    pub input_channel: u8,
    pub output_channel: u8,
}
impl Default for SimulatedBench {
    fn default() -> Self {
        Self {
            dc_gain_db: 60.0,
            dominant_pole_hz: 10.0,
            second_pole_hz: 30_000.0,
            noise_fraction: 0.002,
            seed: 0x5eed,
            sample_rate_hz: 1e6,
            record_length: 10_000,
            input_channel: 1,
            output_channel: 2,
        }
    }
}
impl SimulatedBench {
    pub fn response(&self, frequency_hz: f64) -> Complex64 {
        let g0 = 10f64.powf(self.dc_gain_db / 20.0);
        let p1 = Complex64::new(1.0, frequency_hz / self.dominant_pole_hz);
        let p2 = Complex64::new(1.0, frequency_hz / self.second_pole_hz);
        Complex64::new(g0, 0.0) / (p1 * p2)
    }
    /// Generator and scope ends of the bench.
    pub fn connect(self) -> (SimulatedInstrument, SimulatedInstrument) {
        let rng = StdRng::seed_from_u64(self.seed);
        let state = Rc::new(RefCell::new(BenchState {
            bench: self,
            rng,
            generator: GeneratorState::default(),
            measure_slots: [1, 2],
            waveform_channel: 1,
        }));
        (
            SimulatedInstrument::new(Role::Source, Rc::clone(&state)),
            SimulatedInstrument::new(Role::Analyzer, state),
        )
    }
}
#[derive(Debug)]
struct HardwareSweep {
    start_hz: f64,
    stop_hz: f64,
    time_s: f64,
    spacing: Spacing,
    started: Instant,
}
#[derive(Debug)]
struct GeneratorState {
    frequency_hz: f64,
    amplitude_v: f64,
    offset_v: f64,
    output_on: bool,
    sweep_start_hz: f64,
    sweep_stop_hz: f64,
    sweep_time_s: f64,
    sweep_spacing: Spacing,
    sweep: Option<HardwareSweep>,
}
impl Default for GeneratorState {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            amplitude_v: 1.0,
            offset_v: 0.0,
            output_on: false,
            sweep_start_hz: 100.0,
            sweep_stop_hz: 100_000.0,
            sweep_time_s: 1.0,
            sweep_spacing: Spacing::Linear,
            sweep: None,
        }
    }
}
impl GeneratorState {
    fn current_frequency(&self) -> f64 {
        let Some(sweep) = &self.sweep else {
            return self.frequency_hz;
        };
        let t = (sweep.started.elapsed().as_secs_f64() / sweep.time_s).fract();
        match sweep.spacing {
            Spacing::Linear => sweep.start_hz + (sweep.stop_hz - sweep.start_hz) * t,
            Spacing::Log => sweep.start_hz * (sweep.stop_hz / sweep.start_hz).powf(t),
        }
    }
}
struct BenchState {
    bench: SimulatedBench,
    rng: StdRng,
    generator: GeneratorState,
    measure_slots: [u8; 2],
    waveform_channel: u8,
}
impl BenchState {
    /// Peak-to-peak amplitude and phase (rad) seen on `channel`.
    fn channel_signal(&self, channel: u8) -> Option<(f64, f64)> {
        if !self.generator.output_on {
            return None;
        }
        let f = self.generator.current_frequency();
        if channel == self.bench.input_channel {
            Some((self.generator.amplitude_v, 0.0))
        } else if channel == self.bench.output_channel {
            let h = self.bench.response(f);
            Some((self.generator.amplitude_v * h.norm(), h.arg()))
        } else {
            None
        }
    }
    fn jitter(&mut self, value: f64) -> f64 {
        let noise = self.bench.noise_fraction;
        if noise <= 0.0 {
            return value;
        }
        value * (1.0 + self.rng.gen_range(-noise..noise))
    }
    fn measure_frequency(&mut self) -> Option<f64> {
        self.channel_signal(self.measure_slots[0])?;
        let f = self.generator.current_frequency();
        Some(self.jitter(f))
    }
    fn measure_amplitude(&mut self) -> Option<f64> {
        let (vpp, _) = self.channel_signal(self.measure_slots[0])?;
        Some(self.jitter(vpp))
    }
    fn measure_phase(&mut self) -> Option<f64> {
        let (_, reference) = self.channel_signal(self.measure_slots[0])?;
        let (_, other) = self.channel_signal(self.measure_slots[1])?;
        let deg = crate::types::wrap_degrees((other - reference).to_degrees());
        Some(deg + self.bench.noise_fraction * self.rng.gen_range(-1.0..1.0))
    }
    fn waveform(&mut self) -> String {
        let fs = self.bench.sample_rate_hz;
        let f = self.generator.current_frequency();
        let offset = self.generator.offset_v;
        let (vpp, phase) = self
            .channel_signal(self.waveform_channel)
            .unwrap_or((0.0, 0.0));
        let noise = self.bench.noise_fraction * vpp.max(1e-3);
        let samples: Vec<String> = (0..self.bench.record_length)
            .map(|i| {
                let t = i as f64 / fs;
                let clean = offset + 0.5 * vpp * (2.0 * PI * f * t + phase).sin();
                let v = if noise > 0.0 {
                    clean + self.rng.gen_range(-noise..noise)
                } else {
                    clean
                };
                format!("{v:.6e}")
            })
            .collect();
        samples.join(",")
    }
}
/// Value a real scope returns when it cannot measure.
const NOT_A_NUMBER: &str = "9.91E+37";
/// One end of a [`SimulatedBench`], speaking the same command set as the
/// networked instruments.
pub struct SimulatedInstrument {
    role: Role,
    state: Rc<RefCell<BenchState>>,
    pending: VecDeque<String>,
}
impl SimulatedInstrument {
    fn new(role: Role, state: Rc<RefCell<BenchState>>) -> Self {
        Self {
            role,
            state,
            pending: VecDeque::new(),
        }
    }
    fn handle(&mut self, line: &str) -> Option<String> {
        let upper = line.trim().to_ascii_uppercase();
        if upper == "*IDN?" {
            let model = match self.role {
                Role::Source => "MFG-SIM",
                Role::Analyzer => "MDO-SIM",
            };
            return Some(format!("BODESWEEP,{model},0,1.0"));
        }
        let (header, args) = upper.split_once(' ').unwrap_or((upper.as_str(), ""));
        let path: Vec<&str> = header.trim_start_matches(':').split(':').collect();
        let handled = match self.role {
            Role::Source => self.handle_generator(&path, args.trim()),
            Role::Analyzer => self.handle_scope(&path, args.trim()),
        };
        match handled {
            Handled::Reply(reply) => Some(reply),
            Handled::Silent => None,
            Handled::Unknown => {
                warn!("{} ignores unknown command `{line}`", self.role);
                None
            }
        }
    }
    fn handle_generator(&mut self, path: &[&str], args: &str) -> Handled {
        let mut state = self.state.borrow_mut();
        let wavegen = &mut state.generator;
        match path {
            [output, "LOAD"] if indexed(output, "OUTPUT").is_some() => Handled::Silent,
            [output] if indexed(output, "OUTPUT").is_some() => {
                wavegen.output_on = args == "ON" || args == "1";
                Handled::Silent
            }
            [source, "APPLY"] if indexed(source, "SOURCE").is_some() => {
                let values = args
                    .split_once(' ')
                    .map(|(_, rest)| rest)
                    .unwrap_or(args);
                let mut numbers = values.split(',').map(|v| v.trim().parse::<f64>());
                if let Some(Ok(f)) = numbers.next() {
                    wavegen.frequency_hz = f;
                }
                if let Some(Ok(a)) = numbers.next() {
                    wavegen.amplitude_v = a;
                }
                if let Some(Ok(o)) = numbers.next() {
                    wavegen.offset_v = o;
                }
                Handled::Silent
            }
            [source, "FREQUENCY", rest @ ..] if indexed(source, "SOURCE").is_some() => {
                let Ok(value) = args.parse::<f64>() else {
                    return Handled::Unknown;
                };
                match rest {
                    [] => wavegen.frequency_hz = value,
                    ["START"] => wavegen.sweep_start_hz = value,
                    ["STOP"] => wavegen.sweep_stop_hz = value,
                    _ => return Handled::Unknown,
                }
                Handled::Silent
            }
            [source, "SWEEP", setting] if indexed(source, "SOURCE").is_some() => {
                match *setting {
                    "SPACING" => {
                        wavegen.sweep_spacing = if args.starts_with("LOG") {
                            Spacing::Log
                        } else {
                            Spacing::Linear
                        }
                    }
                    "TIME" => match args.parse::<f64>() {
                        Ok(t) if t > 0.0 => wavegen.sweep_time_s = t,
                        _ => return Handled::Unknown,
                    },
                    "STATE" if args == "ON" => {
                        let sweep = HardwareSweep {
                            start_hz: wavegen.sweep_start_hz,
                            stop_hz: wavegen.sweep_stop_hz,
                            time_s: wavegen.sweep_time_s,
                            spacing: wavegen.sweep_spacing,
                            started: Instant::now(),
                        };
                        wavegen.sweep = Some(sweep);
                    }
                    "STATE" => {
                        if let Some(sweep) = wavegen.sweep.take() {
                            wavegen.frequency_hz = sweep.stop_hz;
                        }
                    }
                    _ => return Handled::Unknown,
                }
                Handled::Silent
            }
            _ => Handled::Unknown,
        }
    }
    fn handle_scope(&mut self, path: &[&str], args: &str) -> Handled {
        let mut state = self.state.borrow_mut();
        let reading = |value: Option<f64>| {
            Handled::Reply(value.map_or_else(|| NOT_A_NUMBER.to_string(), |v| format!("{v:.6e}")))
        };
        match path {
            [channel, "DISPLAY"] if indexed(channel, "CHANNEL").is_some() => Handled::Silent,
            ["AUTOSET"] => Handled::Silent,
            ["MEASURE", slot] if indexed(slot, "SOURCE").is_some() => {
                let slot = indexed(slot, "SOURCE").unwrap_or(1);
                match (indexed(args, "CH"), slot) {
                    (Some(ch), 1 | 2) => {
                        state.measure_slots[usize::from(slot - 1)] = ch;
                        Handled::Silent
                    }
                    _ => Handled::Unknown,
                }
            }
            ["MEASURE", "FREQUENCY?"] => reading(state.measure_frequency()),
            ["MEASURE", "AMPLITUDE?"] => reading(state.measure_amplitude()),
            ["MEASURE", "PHASE?"] => reading(state.measure_phase()),
            ["WAVEFORM", "SOURCE"] => match indexed(args, "CH") {
                Some(ch) => {
                    state.waveform_channel = ch;
                    Handled::Silent
                }
                None => Handled::Unknown,
            },
            ["WAVEFORM", "FORMAT"] => Handled::Silent,
            ["WAVEFORM", "DATA?"] => Handled::Reply(state.waveform()),
            [acquire, "STATE?"] if indexed(acquire, "ACQUIRE").is_some() => {
                Handled::Reply("1".to_string())
            }
            _ => Handled::Unknown,
        }
    }
}
enum Handled {
    Reply(String),
    Silent,
    Unknown,
}
/// `SOURCE2` with prefix `SOURCE` gives `Some(2)`.
fn indexed(token: &str, prefix: &str) -> Option<u8> {
    token.strip_prefix(prefix)?.parse().ok()
}
impl Transport for SimulatedInstrument {
    fn role(&self) -> Role {
        self.role
    }
    fn send_line(&mut self, line: &str) -> Result<(), SweepError> {
        if let Some(reply) = self.handle(line) {
            self.pending.push_back(reply);
        }
        Ok(())
    }
    fn recv_line(&mut self) -> Result<String, SweepError> {
        self.pending.pop_front().ok_or_else(|| SweepError::Io {
            role: self.role,
            source: io::Error::new(io::ErrorKind::TimedOut, "no reply pending"),
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::bode;
    use crate::drivers::{FunctionGenerator, Oscilloscope, WaveShape};
    use crate::engine::SweepEngine;
    use crate::plan::SweepPlan;
    use crate::types::{EngineSettings, MeasureMode, ProbeChannels, SignalSettings};
    fn quiet_bench() -> SimulatedBench {
        SimulatedBench {
            noise_fraction: 0.0,
            ..SimulatedBench::default()
        }
    }
    #[test]
    fn scope_reads_not_a_number_until_output_is_on() {
        let (source, scope) = quiet_bench().connect();
        let mut mfg = FunctionGenerator::new(source, 1);
        let mut mdo = Oscilloscope::new(scope);
        mdo.measure_source(1, 1).unwrap();
        assert!(matches!(mdo.measure_amplitude(), Err(SweepError::Parse { .. })));
        mfg.apply(WaveShape::Sine, 1000.0, 0.2, 0.0).unwrap();
        mfg.set_output(true).unwrap();
        assert!((mdo.measure_amplitude().unwrap() - 0.2).abs() < 1e-9);
        assert!((mdo.measure_frequency().unwrap() - 1000.0).abs() < 1e-6);
    }
    #[test]
    fn output_channel_follows_the_transfer_function() {
        let bench = quiet_bench();
        let expected = bench.response(10_000.0);
        let (source, scope) = bench.connect();
        let mut mfg = FunctionGenerator::new(source, 1);
        let mut mdo = Oscilloscope::new(scope);
        mfg.apply(WaveShape::Sine, 10_000.0, 0.01, 0.0).unwrap();
        mfg.set_output(true).unwrap();
        mdo.measure_source(1, 2).unwrap();
        let amplitude = mdo.measure_amplitude().unwrap();
        let exact = 0.01 * expected.norm();
        assert!((amplitude - exact).abs() / exact < 1e-6);
        mdo.measure_source(1, 1).unwrap();
        mdo.measure_source(2, 2).unwrap();
        let phase = mdo.measure_phase().unwrap();
        assert!((phase - expected.arg().to_degrees()).abs() < 1e-3);
    }
    #[test]
    fn waveform_capture_has_configured_length() {
        let bench = SimulatedBench {
            record_length: 256,
            ..quiet_bench()
        };
        let (source, scope) = bench.connect();
        let mut mfg = FunctionGenerator::new(source, 1);
        let mut mdo = Oscilloscope::new(scope);
        mfg.apply(WaveShape::Sine, 1000.0, 2.0, 0.5).unwrap();
        mfg.set_output(true).unwrap();
        let wave = mdo.capture(1, 1e6).unwrap();
        assert_eq!(wave.samples.len(), 256);
        assert!(wave.samples.iter().all(|v| (-0.5..=1.5).contains(v)));
    }
    #[test]
    fn unknown_query_times_out_instead_of_hanging() {
        let (_, scope) = quiet_bench().connect();
        let mut mdo = Oscilloscope::new(scope);
        assert!(matches!(mdo.measure_source(3, 9), Ok(())));
        assert!(matches!(
            mdo.acquisition_complete(1),
            Ok(true)
        ));
        let (_, mut raw) = quiet_bench().connect();
        raw.send_line(":BOGUS?").unwrap();
        assert!(matches!(raw.recv_line(), Err(SweepError::Io { .. })));
    }
    fn bench_engine(
        bench: SimulatedBench,
        mode: MeasureMode,
    ) -> SweepEngine<SimulatedInstrument, SimulatedInstrument> {
        let (source, scope) = bench.connect();
        let mut settings = EngineSettings::new(ProbeChannels { input: 1, output: 2 }, mode);
        settings.settle = Duration::ZERO;
        let mut engine = SweepEngine::new(
            FunctionGenerator::new(source, 1),
            Oscilloscope::new(scope),
            settings,
        );
        let signal = SignalSettings {
            shape: WaveShape::Sine,
            amplitude_v: 0.01,
            offset_v: 0.0,
        };
        engine.prepare(&signal, 100.0, true).unwrap();
        engine
    }
    #[test]
    fn stepped_sweep_finds_the_amplifier_crossover() {
        let bench = quiet_bench();
        let mut engine = bench_engine(bench.clone(), MeasureMode::Direct);
        let plan = SweepPlan::new(100.0, 1e6, 41, Spacing::Log).unwrap();
        let points = engine.run(&plan).unwrap();
        engine.shutdown();
        assert_eq!(points.len(), 41);
        let summary = bode::summarize_points(&points).unwrap();
        assert!(summary.unity_gain_hz > 5e3 && summary.unity_gain_hz < 2e4);
        let expected = 180.0 + bench.response(summary.unity_gain_hz).arg().to_degrees();
        assert!((summary.phase_margin_deg - expected).abs() < 1e-3);
        let crossover = summary.crossover.unwrap();
        assert!((crossover.frequency_hz - 9.5e3).abs() < 1e3);
    }
    #[test]
    fn spectral_sweep_matches_the_transfer_function() {
        let bench = quiet_bench();
        let mode = MeasureMode::Spectral {
            sample_rate_hz: bench.sample_rate_hz,
        };
        let mut engine = bench_engine(bench.clone(), mode);
        // bin spacing is 100 Hz, so every set-point lands on a bin
        let plan = SweepPlan::new(1000.0, 5000.0, 5, Spacing::Linear).unwrap();
        let points = engine.run(&plan).unwrap();
        for point in &points {
            let h = bench.response(point.set_point_hz);
            assert!((point.gain_db - 20.0 * h.norm().log10()).abs() < 0.05);
            assert!((point.phase_deg - h.arg().to_degrees()).abs() < 0.5);
            // same volts as the direct mode readings
            assert!((point.input_amplitude - 0.01).abs() < 1e-4);
            assert!(point.input_frequency_hz.is_none());
        }
    }
}
