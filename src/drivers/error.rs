use std::io;
use std::time::Duration;
use thiserror::Error;
use crate::drivers::Role;
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to connect to {role} at {address}: {source}")]
    Connect {
        role: Role,
        address: String,
        source: io::Error,
    },
    #[error("{role} transport error: {source}")]
    Io { role: Role, source: io::Error },
    #[error("{role} closed the connection")]
    Disconnected { role: Role },
    #[error("{role} replied {reply:?} to `{command}`, expected {expected}")]
    Parse {
        role: Role,
        command: String,
        reply: String,
        expected: &'static str,
    },
    #[error("{role} did not finish acquiring channel {channel} within {waited:?}")]
    AcquireTimeout {
        role: Role,
        channel: u8,
        waited: Duration,
    },
    #[error("invalid sweep plan: {0}")]
    InvalidPlan(String),
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("captured waveform has {len} samples, need at least two")]
    ShortWaveform { len: usize },
    #[error("no spectral bin available near {frequency_hz} Hz")]
    NoSpectralBin { frequency_hz: f64 },
    #[error("sweep arrays are misaligned: {frequencies} frequencies, {gains} gains, {phases} phases")]
    Misaligned {
        frequencies: usize,
        gains: usize,
        phases: usize,
    },
    #[error("sweep produced no points")]
    EmptySweep,
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for SweepError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        SweepError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for SweepError {
    fn from(value: image::ImageError) -> Self {
        SweepError::Plot(value.to_string())
    }
}
