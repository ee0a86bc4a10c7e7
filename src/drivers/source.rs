use crate::drivers::{ScpiPort, SweepError, Transport};
use crate::plan::Spacing;
/// Output waveform of the function generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum WaveShape {
    #[value(name = "SIN", alias = "sine")]
    Sine,
    #[value(name = "SQU", alias = "square")]
    Square,
    #[value(name = "RAMP", alias = "ramp")]
    Ramp,
    #[value(name = "PULS", alias = "pulse")]
    Pulse,
    #[value(name = "NOIS", alias = "noise")]
    Noise,
}
impl WaveShape {
    pub fn scpi_name(self) -> &'static str {
        match self {
            WaveShape::Sine => "SIN",
            WaveShape::Square => "SQU",
            WaveShape::Ramp => "RAMP",
            WaveShape::Pulse => "PULS",
            WaveShape::Noise => "NOIS",
        }
    }
}
/// Function generator output channel.
pub struct FunctionGenerator<T: Transport> {
    port: ScpiPort<T>,
    output: u8,
}
impl<T: Transport> FunctionGenerator<T> {
    pub fn new(transport: T, output: u8) -> Self {
        Self {
            port: ScpiPort::new(transport),
            output,
        }
    }
    pub fn identify(&mut self) -> Result<String, SweepError> {
        self.port.identify()
    }
    /// High-impedance load so the displayed amplitude matches the open-circuit voltage.
    pub fn set_load_infinite(&mut self) -> Result<(), SweepError> {
        self.port.write(&format!("OUTPUT{}:LOAD INF", self.output))
    }
    pub fn apply(
        &mut self,
        shape: WaveShape,
        frequency_hz: f64,
        amplitude_v: f64,
        offset_v: f64,
    ) -> Result<(), SweepError> {
        self.port.write(&format!(
            "SOURCE{}:APPLY {} {frequency_hz},{amplitude_v},{offset_v}",
            self.output,
            shape.scpi_name()
        ))
    }
    pub fn set_frequency(&mut self, frequency_hz: f64) -> Result<(), SweepError> {
        self.port
            .write(&format!("SOURCE{}:FREQUENCY {frequency_hz}", self.output))
    }
    pub fn set_output(&mut self, enabled: bool) -> Result<(), SweepError> {
        let state = if enabled { "ON" } else { "OFF" };
        self.port.write(&format!("OUTPUT{} {state}", self.output))
    }
    /// Starts the generator's own frequency sweep; it keeps running until
    /// [`FunctionGenerator::stop_sweep`].
    pub fn start_sweep(
        &mut self,
        start_hz: f64,
        stop_hz: f64,
        sweep_time_s: f64,
        spacing: Spacing,
    ) -> Result<(), SweepError> {
        let ch = self.output;
        let spacing = match spacing {
            Spacing::Linear => "LIN",
            Spacing::Log => "LOG",
        };
        self.port
            .write(&format!("SOURCE{ch}:FREQUENCY:START {start_hz}"))?;
        self.port
            .write(&format!("SOURCE{ch}:FREQUENCY:STOP {stop_hz}"))?;
        self.port.write(&format!("SOURCE{ch}:SWEEP:SPACING {spacing}"))?;
        self.port.write(&format!("SOURCE{ch}:SWEEP:TIME {sweep_time_s}"))?;
        self.port.write(&format!("SOURCE{ch}:SWEEP:STATE ON"))
    }
    pub fn stop_sweep(&mut self) -> Result<(), SweepError> {
        self.port
            .write(&format!("SOURCE{}:SWEEP:STATE OFF", self.output))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{Role, ScriptedTransport};
    #[test]
    fn commands_address_the_configured_output() {
        let transport = ScriptedTransport::new(Role::Source, |_| None);
        let sent = transport.sent_log();
        let mut mfg = FunctionGenerator::new(transport, 2);
        mfg.set_load_infinite().unwrap();
        mfg.apply(WaveShape::Sine, 100.0, 0.5, 0.0).unwrap();
        mfg.set_output(true).unwrap();
        mfg.set_frequency(2500.5).unwrap();
        mfg.set_output(false).unwrap();
        assert_eq!(
            *sent.borrow(),
            vec![
                "OUTPUT2:LOAD INF",
                "SOURCE2:APPLY SIN 100,0.5,0",
                "OUTPUT2 ON",
                "SOURCE2:FREQUENCY 2500.5",
                "OUTPUT2 OFF",
            ]
        );
    }
    #[test]
    fn hardware_sweep_is_configured_before_it_is_armed() {
        let transport = ScriptedTransport::new(Role::Source, |_| None);
        let sent = transport.sent_log();
        let mut mfg = FunctionGenerator::new(transport, 1);
        mfg.start_sweep(10.0, 1e5, 2.5, Spacing::Log).unwrap();
        mfg.stop_sweep().unwrap();
        let sent = sent.borrow();
        assert_eq!(sent[0], "SOURCE1:FREQUENCY:START 10");
        assert_eq!(sent[1], "SOURCE1:FREQUENCY:STOP 100000");
        assert_eq!(sent[2], "SOURCE1:SWEEP:SPACING LOG");
        assert_eq!(sent[3], "SOURCE1:SWEEP:TIME 2.5");
        assert_eq!(sent[4], "SOURCE1:SWEEP:STATE ON");
        assert_eq!(sent[5], "SOURCE1:SWEEP:STATE OFF");
    }
}
