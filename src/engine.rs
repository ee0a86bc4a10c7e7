// src/engine.rs
use std::thread;
use std::time::Duration;
use log::{debug, info, warn};
use crate::drivers::{fft, CapturedWaveform, FunctionGenerator, Oscilloscope, SweepError, Transport};
use crate::plan::{SweepPlan, TimedSweep};
use crate::types::*;
/// Points collected before a sweep stopped, plus the reason it stopped.
#[derive(Debug)]
pub struct PartialSweep {
    pub points: Vec<SamplePoint>,
    pub failure: Option<SweepError>,
}
impl PartialSweep {
    pub fn into_result(self) -> Result<Vec<SamplePoint>, SweepError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.points),
        }
    }
}
/// Owns both instruments for the duration of a run and steps them through a
/// plan one set-point at a time.
pub struct SweepEngine<S: Transport, A: Transport> {
    generator: FunctionGenerator<S>,
    scope: Oscilloscope<A>,
    settings: EngineSettings,
}
impl<S: Transport, A: Transport> SweepEngine<S, A> {
    pub fn new(
        generator: FunctionGenerator<S>,
        scope: Oscilloscope<A>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            generator,
            scope,
            settings,
        }
    }
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
    /// Configures the generator output at `start_hz` and shows both probe channels.
    pub fn prepare(
        &mut self,
        signal: &SignalSettings,
        start_hz: f64,
        autoset: bool,
    ) -> Result<(), SweepError> {
        let ProbeChannels { input, output } = self.settings.channels;
        self.generator.set_load_infinite()?;
        self.generator
            .apply(signal.shape, start_hz, signal.amplitude_v, signal.offset_v)?;
        self.generator.set_output(true)?;
        self.scope.display_channel(input)?;
        self.scope.display_channel(output)?;
        self.scope.measure_source(1, input)?;
        self.scope.measure_source(2, output)?;
        if autoset {
            self.scope.autoset()?;
        }
        Ok(())
    }
    /// Disables the generator output. Failures are logged, not returned.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.generator.set_output(false) {
            warn!("could not switch generator output off: {err}");
        }
    }
    pub fn run(&mut self, plan: &SweepPlan) -> Result<Vec<SamplePoint>, SweepError> {
        self.run_partial(plan, |_, _| {}).into_result()
    }
    /// Steps through `plan`, handing each point to `on_point` as it lands.
    /// Stops at the first instrument failure.
    pub fn run_partial(
        &mut self,
        plan: &SweepPlan,
        mut on_point: impl FnMut(usize, &SamplePoint),
    ) -> PartialSweep {
        info!(
            "stepping {} set-points ({:?} spacing), settle {:?}",
            plan.len(),
            plan.spacing(),
            self.settings.settle
        );
        let mut points = Vec::with_capacity(plan.len());
        for (idx, &frequency_hz) in plan.frequencies().iter().enumerate() {
            match self.step(frequency_hz) {
                Ok(point) => {
                    on_point(idx, &point);
                    points.push(point);
                }
                Err(err) => {
                    return PartialSweep {
                        points,
                        failure: Some(err),
                    }
                }
            }
        }
        PartialSweep {
            points,
            failure: None,
        }
    }
    fn step(&mut self, frequency_hz: f64) -> Result<SamplePoint, SweepError> {
        self.generator.set_frequency(frequency_hz)?;
        if self.settings.autoset_each_step {
            self.scope.autoset()?;
        }
        thread::sleep(self.settings.settle);
        self.measure(frequency_hz)
    }
    /// Reads one point at the frequency the generator is currently set to.
    pub fn measure(&mut self, set_point_hz: f64) -> Result<SamplePoint, SweepError> {
        match self.settings.mode {
            MeasureMode::Direct => self.measure_direct(set_point_hz),
            MeasureMode::Spectral { sample_rate_hz } => {
                self.measure_spectral(set_point_hz, sample_rate_hz)
            }
        }
    }
    fn measure_direct(&mut self, set_point_hz: f64) -> Result<SamplePoint, SweepError> {
        let ProbeChannels { input, output } = self.settings.channels;
        // frequency and amplitude always read measurement slot 1
        self.scope.measure_source(1, input)?;
        let input_hz = self.scope.measure_frequency()?;
        let input_amplitude = self.scope.measure_amplitude()?;
        self.scope.measure_source(1, output)?;
        let output_hz = self.scope.measure_frequency()?;
        let output_amplitude = self.scope.measure_amplitude()?;
        self.scope.measure_source(1, input)?;
        self.scope.measure_source(2, output)?;
        let phase_deg = self.scope.measure_phase()?;
        Ok(
            SamplePoint::new(set_point_hz, input_amplitude, output_amplitude, phase_deg)
                .with_read_back(input_hz, output_hz),
        )
    }
    fn measure_spectral(
        &mut self,
        set_point_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<SamplePoint, SweepError> {
        let ProbeChannels { input, output } = self.settings.channels;
        let input_wave = self.acquire(input, sample_rate_hz)?;
        let output_wave = self.acquire(output, sample_rate_hz)?;
        let input_spectrum = fft::estimate(&input_wave.samples, sample_rate_hz)?;
        let output_spectrum = fft::estimate(&output_wave.samples, sample_rate_hz)?;
        let no_bin = || SweepError::NoSpectralBin {
            frequency_hz: set_point_hz,
        };
        let input_bin = input_spectrum.at(set_point_hz).ok_or_else(no_bin)?;
        let output_bin = output_spectrum.at(set_point_hz).ok_or_else(no_bin)?;
        debug!(
            "CH{} {:?} record, {} bins, reading bin {} at {:.3} Hz (within {:.3} Hz)",
            input_wave.channel,
            input_wave.duration(),
            input_spectrum.len(),
            input_bin.index,
            input_bin.frequency_hz,
            input_spectrum.max_quantization_hz()
        );
        let phase_deg = wrap_degrees((output_bin.phase_rad - input_bin.phase_rad).to_degrees());
        Ok(SamplePoint::new(
            set_point_hz,
            input_spectrum.peak_to_peak(&input_bin),
            output_spectrum.peak_to_peak(&output_bin),
            phase_deg,
        ))
    }
    fn acquire(
        &mut self,
        channel: u8,
        sample_rate_hz: f64,
    ) -> Result<CapturedWaveform, SweepError> {
        if let Some(timeout) = self.settings.acquire_timeout {
            self.scope
                .wait_for_acquisition(channel, timeout, self.settings.acquire_poll)?;
        }
        self.scope.capture(channel, sample_rate_hz)
    }
    /// Lets the generator run its own sweep and samples the scope at a fixed
    /// rate. Each point's set-point is the measured input frequency.
    pub fn run_timed(
        &mut self,
        sweep: &TimedSweep,
        mut on_point: impl FnMut(usize, &SamplePoint),
    ) -> PartialSweep {
        let mut points = Vec::with_capacity(sweep.steps());
        if let Err(err) = self.generator.start_sweep(
            sweep.start_hz,
            sweep.stop_hz,
            sweep.duration.as_secs_f64(),
            sweep.spacing,
        ) {
            return PartialSweep {
                points,
                failure: Some(err),
            };
        }
        info!(
            "generator sweeping for {:?}, sampling {} steps",
            sweep.duration,
            sweep.steps()
        );
        let half = sweep.interval() / 2;
        let mut failure = None;
        for idx in 0..sweep.steps() {
            match self.timed_step(half) {
                Ok(point) => {
                    on_point(idx, &point);
                    points.push(point);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Err(err) = self.generator.stop_sweep() {
            if failure.is_none() {
                failure = Some(err);
            } else {
                warn!("could not stop generator sweep: {err}");
            }
        }
        PartialSweep { points, failure }
    }
    fn timed_step(&mut self, half_interval: Duration) -> Result<SamplePoint, SweepError> {
        if self.settings.autoset_each_step {
            self.scope.autoset()?;
        }
        thread::sleep(half_interval);
        let mut point = self.measure_direct(0.0)?;
        point.set_point_hz = point.input_frequency_hz.unwrap_or_default();
        thread::sleep(half_interval);
        Ok(point)
    }
    /// Single reading at a fixed frequency after the bench has settled.
    pub fn probe(
        &mut self,
        signal: &SignalSettings,
        frequency_hz: f64,
    ) -> Result<SamplePoint, SweepError> {
        self.prepare(signal, frequency_hz, true)?;
        thread::sleep(self.settings.settle);
        self.measure(frequency_hz)
    }
}
