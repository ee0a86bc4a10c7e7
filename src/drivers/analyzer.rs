use std::thread;
use std::time::{Duration, Instant};
use crate::drivers::{ScpiPort, SweepError, Transport};
/// One channel's record as streamed by `:WAVEFORM:DATA?`.
#[derive(Clone, Debug)]
pub struct CapturedWaveform {
    pub channel: u8,
    pub sample_rate_hz: f64,
    pub samples: Vec<f64>,
}
impl CapturedWaveform {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate_hz)
    }
}
/// Oscilloscope measurement and capture functions.
pub struct Oscilloscope<T: Transport> {
    port: ScpiPort<T>,
}
impl<T: Transport> Oscilloscope<T> {
    pub fn new(transport: T) -> Self {
        Self {
            port: ScpiPort::new(transport),
        }
    }
    pub fn identify(&mut self) -> Result<String, SweepError> {
        self.port.identify()
    }
    pub fn display_channel(&mut self, channel: u8) -> Result<(), SweepError> {
        self.port.write(&format!(":CHANNEL{channel}:DISPLAY ON"))
    }
    /// Points measurement slot `slot` (1 or 2) at `channel`. Single-channel
    /// measurements read slot 1; phase is slot 2 relative to slot 1.
    pub fn measure_source(&mut self, slot: u8, channel: u8) -> Result<(), SweepError> {
        self.port
            .write(&format!(":MEASURE:SOURCE{slot} CH{channel}"))
    }
    pub fn measure_frequency(&mut self) -> Result<f64, SweepError> {
        self.port.query_f64(":MEASURE:FREQUENCY?")
    }
    pub fn measure_amplitude(&mut self) -> Result<f64, SweepError> {
        self.port.query_f64(":MEASURE:AMPLITUDE?")
    }
    pub fn measure_phase(&mut self) -> Result<f64, SweepError> {
        self.port.query_f64(":MEASURE:PHASE?")
    }
    pub fn autoset(&mut self) -> Result<(), SweepError> {
        self.port.write(":AUTOSET")
    }
    pub fn acquisition_complete(&mut self, channel: u8) -> Result<bool, SweepError> {
        let state = self
            .port
            .query_f64(&format!(":ACQUIRE{channel}:STATE?"))?;
        Ok(state != 0.0)
    }
    /// Polls the acquisition state until it completes or `timeout` elapses.
    pub fn wait_for_acquisition(
        &mut self,
        channel: u8,
        timeout: Duration,
        poll: Duration,
    ) -> Result<(), SweepError> {
        let started = Instant::now();
        loop {
            if self.acquisition_complete(channel)? {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(SweepError::AcquireTimeout {
                    role: self.port.role(),
                    channel,
                    waited,
                });
            }
            thread::sleep(poll.min(timeout - waited));
        }
    }
    pub fn capture(
        &mut self,
        channel: u8,
        sample_rate_hz: f64,
    ) -> Result<CapturedWaveform, SweepError> {
        self.port
            .write(&format!(":WAVEFORM:SOURCE CH{channel}"))?;
        self.port.write(":WAVEFORM:FORMAT ASCII")?;
        let samples = self.port.query_f64_list(":WAVEFORM:DATA?")?;
        Ok(CapturedWaveform {
            channel,
            sample_rate_hz,
            samples,
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{Role, ScriptedTransport};
    use std::cell::Cell;
    use std::rc::Rc;
    #[test]
    fn capture_selects_channel_and_ascii_format() {
        let transport = ScriptedTransport::new(Role::Analyzer, |line| {
            (line == ":WAVEFORM:DATA?").then(|| "1,2,3,4".to_string())
        });
        let sent = transport.sent_log();
        let mut scope = Oscilloscope::new(transport);
        let wave = scope.capture(3, 1000.0).unwrap();
        assert_eq!(wave.channel, 3);
        assert_eq!(wave.samples, vec![1.0, 2.0, 3.0, 4.0]);
        assert!((wave.duration().as_secs_f64() - 0.004).abs() < 1e-9);
        assert_eq!(
            *sent.borrow(),
            vec![":WAVEFORM:SOURCE CH3", ":WAVEFORM:FORMAT ASCII", ":WAVEFORM:DATA?"]
        );
    }
    #[test]
    fn acquisition_wait_returns_once_state_is_set() {
        let polls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&polls);
        let transport = ScriptedTransport::new(Role::Analyzer, move |line| {
            if line != ":ACQUIRE1:STATE?" {
                return None;
            }
            counter.set(counter.get() + 1);
            Some(if counter.get() < 3 { "0" } else { "1" }.to_string())
        });
        let mut scope = Oscilloscope::new(transport);
        scope
            .wait_for_acquisition(1, Duration::from_secs(5), Duration::from_millis(1))
            .unwrap();
        assert_eq!(polls.get(), 3);
    }
    #[test]
    fn acquisition_wait_is_bounded() {
        let transport = ScriptedTransport::constant(Role::Analyzer, "0");
        let mut scope = Oscilloscope::new(transport);
        let err = scope
            .wait_for_acquisition(2, Duration::from_millis(20), Duration::from_millis(5))
            .unwrap_err();
        match err {
            SweepError::AcquireTimeout { channel, waited, .. } => {
                assert_eq!(channel, 2);
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
