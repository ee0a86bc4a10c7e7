use std::f64::consts::PI;
use rustfft::{num_complex::Complex64, FftPlanner};
use crate::drivers::SweepError;
/// Single-sided spectrum of one captured record.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralEstimate {
    pub sample_rate_hz: f64,
    pub fft_size: usize,
    pub frequencies_hz: Vec<f64>,
    pub magnitudes: Vec<f64>,
    /// Unwrapped bin angle in radians.
    pub phases_rad: Vec<f64>,
    /// Sum of the window coefficients, the coherent gain times N.
    pub window_sum: f64,
}
/// Magnitude and phase read from one bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinReading {
    pub index: usize,
    pub frequency_hz: f64,
    pub magnitude: f64,
    pub phase_rad: f64,
}
impl SpectralEstimate {
    pub fn len(&self) -> usize {
        self.frequencies_hz.len()
    }
    /// Worst-case distance between a requested frequency and its nearest bin.
    pub fn max_quantization_hz(&self) -> f64 {
        self.sample_rate_hz / (2.0 * self.fft_size as f64)
    }
    /// Index of the bin closest to `frequency_hz`; the lower bin wins a tie.
    /// `None` when no bin lies within [`Self::max_quantization_hz`], as for
    /// frequencies at or past Nyquist.
    pub fn nearest_bin(&self, frequency_hz: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, bin_hz) in self.frequencies_hz.iter().enumerate() {
            let distance = (bin_hz - frequency_hz).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }
        let bound = self.max_quantization_hz() * (1.0 + 1e-12);
        best.filter(|&(_, distance)| distance <= bound)
            .map(|(idx, _)| idx)
    }
    /// Peak-to-peak volts of a sine centred on the bin, undoing the window's
    /// coherent gain.
    pub fn peak_to_peak(&self, reading: &BinReading) -> f64 {
        if self.window_sum > 0.0 {
            4.0 * reading.magnitude / self.window_sum
        } else {
            0.0
        }
    }
    pub fn at(&self, frequency_hz: f64) -> Option<BinReading> {
        let index = self.nearest_bin(frequency_hz)?;
        Some(BinReading {
            index,
            frequency_hz: self.frequencies_hz[index],
            magnitude: self.magnitudes[index],
            phase_rad: self.phases_rad[index],
        })
    }
}
/// Mean removal, Hann window, forward FFT, first half of the bins.
pub fn estimate(samples: &[f64], sample_rate_hz: f64) -> Result<SpectralEstimate, SweepError> {
    if !(sample_rate_hz > 0.0) || !sample_rate_hz.is_finite() {
        return Err(SweepError::InvalidSampleRate);
    }
    let n = samples.len();
    if n < 2 {
        return Err(SweepError::ShortWaveform { len: n });
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let window = hann_window(n);
    let mut buffer: Vec<Complex64> = samples
        .iter()
        .zip(&window)
        .map(|(v, w)| Complex64::new((v - mean) * w, 0.0))
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);
    let half = n / 2;
    let frequencies_hz = (0..half)
        .map(|k| k as f64 * sample_rate_hz / n as f64)
        .collect();
    let magnitudes = buffer.iter().take(half).map(|c| c.norm()).collect();
    let angles: Vec<f64> = buffer.iter().take(half).map(|c| c.arg()).collect();
    Ok(SpectralEstimate {
        sample_rate_hz,
        fft_size: n,
        frequencies_hz,
        magnitudes,
        phases_rad: unwrap_phase(&angles),
        window_sum: window.iter().sum(),
    })
}
/// Symmetric Hann window, `0.5 - 0.5 cos(2 pi n / (N - 1))`.
pub fn hann_window(len: usize) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f64;
            (0..len)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
                .collect()
        }
    }
}
/// Removes 2 pi jumps so adjacent angles never differ by more than pi.
pub fn unwrap_phase(phases_rad: &[f64]) -> Vec<f64> {
    let mut unwrapped = Vec::with_capacity(phases_rad.len());
    let Some(&first) = phases_rad.first() else {
        return unwrapped;
    };
    unwrapped.push(first);
    let mut correction = 0.0;
    for pair in phases_rad.windows(2) {
        let step = pair[1] - pair[0];
        if step.abs() >= PI {
            let mut wrapped = (step + PI).rem_euclid(2.0 * PI) - PI;
            if wrapped == -PI && step > 0.0 {
                wrapped = PI;
            }
            correction += wrapped - step;
        }
        unwrapped.push(pair[1] + correction);
    }
    unwrapped
}
