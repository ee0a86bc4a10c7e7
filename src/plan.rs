use std::time::Duration;
use crate::drivers::SweepError;
/// Steps per second of a timed (generator-driven) sweep.
pub const TIMED_STEPS_PER_SECOND: f64 = 10.0;
/// Upper bound on set-points or timed steps in one sweep.
pub const MAX_POINTS: usize = 100_000;
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Spacing {
    Linear,
    Log,
}
/// Frequency set-points of one stepped sweep, in increasing order.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepPlan {
    spacing: Spacing,
    frequencies_hz: Vec<f64>,
}
impl SweepPlan {
    pub fn new(
        min_hz: f64,
        max_hz: f64,
        count: usize,
        spacing: Spacing,
    ) -> Result<Self, SweepError> {
        check_bounds(min_hz, max_hz, count > 1)?;
        if count == 0 || count > MAX_POINTS {
            return Err(SweepError::InvalidPlan(format!(
                "point count must be between 1 and {MAX_POINTS}, got {count}"
            )));
        }
        let last = (count - 1).max(1) as f64;
        let mut frequencies_hz: Vec<f64> = (0..count)
            .map(|i| {
                let t = i as f64 / last;
                match spacing {
                    Spacing::Linear => min_hz + (max_hz - min_hz) * t,
                    Spacing::Log => min_hz * (max_hz / min_hz).powf(t),
                }
            })
            .collect();
        // pin the endpoints against powf rounding
        frequencies_hz[0] = min_hz;
        if count > 1 {
            frequencies_hz[count - 1] = max_hz;
        }
        Ok(Self {
            spacing,
            frequencies_hz,
        })
    }
    pub fn spacing(&self) -> Spacing {
        self.spacing
    }
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies_hz
    }
    pub fn len(&self) -> usize {
        self.frequencies_hz.len()
    }
}
/// Generator-driven sweep sampled at a fixed rate for a fixed duration.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedSweep {
    pub start_hz: f64,
    pub stop_hz: f64,
    pub duration: Duration,
    pub spacing: Spacing,
    steps: usize,
}
impl TimedSweep {
    pub fn new(
        start_hz: f64,
        stop_hz: f64,
        duration_s: f64,
        spacing: Spacing,
    ) -> Result<Self, SweepError> {
        check_bounds(start_hz, stop_hz, true)?;
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(SweepError::InvalidPlan(format!(
                "sweep duration must be positive, got {duration_s} s"
            )));
        }
        let steps = (duration_s * TIMED_STEPS_PER_SECOND).floor();
        if steps < 1.0 {
            return Err(SweepError::InvalidPlan(format!(
                "sweep duration {duration_s} s is shorter than one step"
            )));
        }
        if steps > MAX_POINTS as f64 {
            return Err(SweepError::InvalidPlan(format!(
                "sweep duration {duration_s} s exceeds {MAX_POINTS} steps"
            )));
        }
        let duration = Duration::try_from_secs_f64(duration_s).map_err(|err| {
            SweepError::InvalidPlan(format!("sweep duration {duration_s} s: {err}"))
        })?;
        Ok(Self {
            start_hz,
            stop_hz,
            duration,
            spacing,
            steps: steps as usize,
        })
    }
    pub fn steps(&self) -> usize {
        self.steps
    }
    /// Dwell per sample; the measurement sits in the middle of it.
    pub fn interval(&self) -> Duration {
        self.duration / self.steps as u32
    }
}
fn check_bounds(min_hz: f64, max_hz: f64, need_span: bool) -> Result<(), SweepError> {
    if !(min_hz.is_finite() && max_hz.is_finite()) || min_hz <= 0.0 {
        return Err(SweepError::InvalidPlan(format!(
            "frequencies must be finite and positive, got {min_hz}..{max_hz} Hz"
        )));
    }
    if max_hz < min_hz || (need_span && max_hz == min_hz) {
        return Err(SweepError::InvalidPlan(format!(
            "maximum frequency {max_hz} Hz must exceed minimum {min_hz} Hz"
        )));
    }
    Ok(())
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn log_plan_follows_geometric_progression() {
        let plan = SweepPlan::new(100.0, 100_000.0, 7, Spacing::Log).unwrap();
        assert_eq!(plan.len(), 7);
        assert_eq!(plan.frequencies()[0], 100.0);
        assert_eq!(plan.frequencies()[6], 100_000.0);
        for (i, f) in plan.frequencies().iter().enumerate() {
            let expected = 100.0 * 1000f64.powf(i as f64 / 6.0);
            assert!((f - expected).abs() / expected < 1e-12);
        }
        assert!((plan.frequencies()[2] - 1000.0).abs() < 1e-9);
    }
    #[test]
    fn linear_plan_is_evenly_spaced() {
        let plan = SweepPlan::new(10.0, 50.0, 5, Spacing::Linear).unwrap();
        assert_eq!(plan.frequencies(), &[10.0, 20.0, 30.0, 40.0, 50.0]);
    }
    #[test]
    fn plans_are_strictly_increasing() {
        for count in [2, 3, 10, 101] {
            for spacing in [Spacing::Linear, Spacing::Log] {
                let plan = SweepPlan::new(1.0, 2.0e6, count, spacing).unwrap();
                assert_eq!(plan.len(), count);
                assert!(plan.frequencies().windows(2).all(|w| w[1] > w[0]));
            }
        }
    }
    #[test]
    fn single_point_plan_is_the_minimum() {
        let plan = SweepPlan::new(440.0, 440.0, 1, Spacing::Log).unwrap();
        assert_eq!(plan.frequencies(), &[440.0]);
    }
    #[test]
    fn invalid_plans_are_rejected() {
        assert!(SweepPlan::new(100.0, 1000.0, 0, Spacing::Log).is_err());
        assert!(SweepPlan::new(0.0, 1000.0, 5, Spacing::Log).is_err());
        assert!(SweepPlan::new(-1.0, 1000.0, 5, Spacing::Linear).is_err());
        assert!(SweepPlan::new(1000.0, 100.0, 5, Spacing::Log).is_err());
        assert!(SweepPlan::new(100.0, 100.0, 5, Spacing::Log).is_err());
        assert!(SweepPlan::new(100.0, f64::INFINITY, 5, Spacing::Log).is_err());
    }
    #[test]
    fn timed_sweep_takes_ten_steps_per_second() {
        let sweep = TimedSweep::new(10.0, 1e4, 2.5, Spacing::Log).unwrap();
        assert_eq!(sweep.steps(), 25);
        assert_eq!(sweep.interval(), Duration::from_millis(100));
        assert!(TimedSweep::new(10.0, 1e4, 0.05, Spacing::Log).is_err());
        assert!(TimedSweep::new(10.0, 1e4, -1.0, Spacing::Log).is_err());
    }
    #[test]
    fn oversized_sweeps_are_rejected_not_allocated() {
        assert!(SweepPlan::new(100.0, 1000.0, MAX_POINTS, Spacing::Log).is_ok());
        assert!(matches!(
            SweepPlan::new(100.0, 1000.0, usize::MAX, Spacing::Log),
            Err(SweepError::InvalidPlan(_))
        ));
        let longest = MAX_POINTS as f64 / TIMED_STEPS_PER_SECOND;
        assert_eq!(
            TimedSweep::new(10.0, 1e4, longest, Spacing::Log).unwrap().steps(),
            MAX_POINTS
        );
        for duration_s in [longest + 1.0, 1e20, f64::MAX] {
            assert!(matches!(
                TimedSweep::new(10.0, 1e4, duration_s, Spacing::Log),
                Err(SweepError::InvalidPlan(_))
            ));
        }
    }
}
