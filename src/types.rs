// src/types.rs
use std::time::Duration;
use crate::drivers::{SweepError, WaveShape};
/// Where gain and phase come from during a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeasureMode {
    /// Oscilloscope's built-in frequency/amplitude/phase measurements.
    Direct,
    /// Raw capture of both channels, reduced by FFT at the set-point.
    Spectral { sample_rate_hz: f64 },
}
impl MeasureMode {
    /// Rejects set-points the mode cannot read. Spectral bins stop short of
    /// the Nyquist frequency of the capture.
    pub fn check_frequency(&self, frequency_hz: f64) -> Result<(), SweepError> {
        match *self {
            MeasureMode::Spectral { sample_rate_hz } if frequency_hz >= sample_rate_hz / 2.0 => {
                Err(SweepError::InvalidPlan(format!(
                    "{frequency_hz} Hz is at or above the {} Hz Nyquist frequency of a {sample_rate_hz} Sa/s capture",
                    sample_rate_hz / 2.0
                )))
            }
            _ => Ok(()),
        }
    }
}
/// Oscilloscope channels probing the device under test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeChannels {
    pub input: u8,
    pub output: u8,
}
/// Generator output applied before the first set-point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalSettings {
    pub shape: WaveShape,
    pub amplitude_v: f64,
    pub offset_v: f64,
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub channels: ProbeChannels,
    pub settle: Duration,
    pub mode: MeasureMode,
    /// Issue `:AUTOSET` after every frequency change.
    pub autoset_each_step: bool,
    /// Bounded wait on the acquisition state before each capture.
    pub acquire_timeout: Option<Duration>,
    pub acquire_poll: Duration,
}
impl EngineSettings {
    pub fn new(channels: ProbeChannels, mode: MeasureMode) -> Self {
        Self {
            channels,
            settle: Duration::from_millis(200),
            mode,
            autoset_each_step: false,
            acquire_timeout: None,
            acquire_poll: Duration::from_millis(50),
        }
    }
}
/// One measurement, aligned with its set-point.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplePoint {
    pub set_point_hz: f64,
    /// Peak-to-peak volts in both measurement modes.
    pub input_amplitude: f64,
    pub output_amplitude: f64,
    pub input_frequency_hz: Option<f64>,
    pub output_frequency_hz: Option<f64>,
    pub phase_deg: f64,
    pub gain_db: f64,
}
impl SamplePoint {
    pub fn new(
        set_point_hz: f64,
        input_amplitude: f64,
        output_amplitude: f64,
        phase_deg: f64,
    ) -> Self {
        Self {
            set_point_hz,
            input_amplitude,
            output_amplitude,
            input_frequency_hz: None,
            output_frequency_hz: None,
            phase_deg,
            gain_db: gain_db(input_amplitude, output_amplitude),
        }
    }
    pub fn with_read_back(mut self, input_hz: f64, output_hz: f64) -> Self {
        self.input_frequency_hz = Some(input_hz);
        self.output_frequency_hz = Some(output_hz);
        self
    }
}
/// `20 log10(out / in)`; a zero input amplitude reads as 0 dB.
pub fn gain_db(input_amplitude: f64, output_amplitude: f64) -> f64 {
    if input_amplitude == 0.0 {
        return 0.0;
    }
    20.0 * (output_amplitude / input_amplitude).log10()
}
/// Folds an angle in degrees into (-180, 180].
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}
