// src/bode.rs
use crate::drivers::SweepError;
use crate::types::SamplePoint;
/// Unity-gain frequency and phase margin of a finished sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodeSummary {
    /// Index of the sampled set-point whose gain is closest to 0 dB.
    pub unity_index: usize,
    pub unity_gain_hz: f64,
    pub gain_at_unity_db: f64,
    pub phase_margin_deg: f64,
    /// 0 dB crossing between two set-points, when the gain changes sign.
    pub crossover: Option<Crossover>,
}
/// Linearly interpolated 0 dB crossing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crossover {
    pub frequency_hz: f64,
    pub phase_margin_deg: f64,
}
pub fn summarize_points(points: &[SamplePoint]) -> Result<BodeSummary, SweepError> {
    let frequencies: Vec<f64> = points.iter().map(|p| p.set_point_hz).collect();
    let gains: Vec<f64> = points.iter().map(|p| p.gain_db).collect();
    let phases: Vec<f64> = points.iter().map(|p| p.phase_deg).collect();
    summarize(&frequencies, &gains, &phases)
}
/// Reduces aligned (frequency, gain, phase) arrays, ordered by increasing
/// frequency, to a [`BodeSummary`]. Ties in |gain| go to the first sample.
pub fn summarize(
    frequencies_hz: &[f64],
    gains_db: &[f64],
    phases_deg: &[f64],
) -> Result<BodeSummary, SweepError> {
    if frequencies_hz.len() != gains_db.len() || frequencies_hz.len() != phases_deg.len() {
        return Err(SweepError::Misaligned {
            frequencies: frequencies_hz.len(),
            gains: gains_db.len(),
            phases: phases_deg.len(),
        });
    }
    let mut unity_index: Option<usize> = None;
    for (idx, gain) in gains_db.iter().enumerate() {
        if gain.is_nan() {
            continue;
        }
        match unity_index {
            Some(best) if gain.abs() >= gains_db[best].abs() => {}
            _ => unity_index = Some(idx),
        }
    }
    let unity_index = unity_index.ok_or(SweepError::EmptySweep)?;
    let crossover = find_crossover(frequencies_hz, gains_db).and_then(|frequency_hz| {
        interpolate(frequencies_hz, phases_deg, frequency_hz).map(|phase| Crossover {
            frequency_hz,
            phase_margin_deg: 180.0 + phase,
        })
    });
    Ok(BodeSummary {
        unity_index,
        unity_gain_hz: frequencies_hz[unity_index],
        gain_at_unity_db: gains_db[unity_index],
        phase_margin_deg: 180.0 + phases_deg[unity_index],
        crossover,
    })
}
/// First frequency where the gain reaches or crosses 0 dB.
fn find_crossover(frequencies_hz: &[f64], gains_db: &[f64]) -> Option<f64> {
    for (i, &g1) in gains_db.iter().enumerate() {
        if g1 == 0.0 {
            return Some(frequencies_hz[i]);
        }
        let Some(&g2) = gains_db.get(i + 1) else {
            break;
        };
        // an exact zero at i + 1 is reported on the next pass
        if g1.is_finite() && g2.is_finite() && g2 != 0.0 && g1.signum() != g2.signum() {
            let (f1, f2) = (frequencies_hz[i], frequencies_hz[i + 1]);
            return Some(f1 + (0.0 - g1) / (g2 - g1) * (f2 - f1));
        }
    }
    None
}
/// Piecewise-linear lookup of `y` at `x_target`; clamps outside the data.
fn interpolate(x: &[f64], y: &[f64], x_target: f64) -> Option<f64> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    if x_target <= x[0] {
        return Some(y[0]);
    }
    let last = x.len() - 1;
    if x_target >= x[last] {
        return Some(y[last]);
    }
    let idx = x.windows(2).position(|w| x_target <= w[1])?;
    let (x1, x2, y1, y2) = (x[idx], x[idx + 1], y[idx], y[idx + 1]);
    if x2 == x1 {
        return Some(y1);
    }
    let t = (x_target - x1) / (x2 - x1);
    Some(y1 + t * (y2 - y1))
}
