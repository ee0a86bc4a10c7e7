use log::{debug, info};
use crate::drivers::{Role, SweepError, Transport};
/// Value SCPI instruments return when a measurement cannot be made.
const SCPI_NOT_A_NUMBER: f64 = 9.9e37;
/// Command/query layer over a line transport.
pub struct ScpiPort<T: Transport> {
    transport: T,
}
impl<T: Transport> ScpiPort<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
    pub fn role(&self) -> Role {
        self.transport.role()
    }
    pub fn write(&mut self, command: &str) -> Result<(), SweepError> {
        debug!("{} <- {command}", self.role());
        self.transport.send_line(command)
    }
    pub fn query(&mut self, command: &str) -> Result<String, SweepError> {
        self.write(command)?;
        let reply = self.transport.recv_line()?;
        debug!("{} -> {reply}", self.role());
        Ok(reply)
    }
    pub fn query_f64(&mut self, command: &str) -> Result<f64, SweepError> {
        let reply = self.query(command)?;
        parse_number(&reply).ok_or_else(|| SweepError::Parse {
            role: self.role(),
            command: command.to_string(),
            reply,
            expected: "a finite number",
        })
    }
    /// Queries a comma separated block of numbers (ASCII waveform data).
    pub fn query_f64_list(&mut self, command: &str) -> Result<Vec<f64>, SweepError> {
        let reply = self.query(command)?;
        let parsed: Option<Vec<f64>> = reply
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| token.parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect();
        parsed.ok_or_else(|| SweepError::Parse {
            role: self.role(),
            command: command.to_string(),
            reply,
            expected: "a comma separated list of numbers",
        })
    }
    pub fn identify(&mut self) -> Result<String, SweepError> {
        let idn = self.query("*IDN?")?;
        info!("{} identifies as {idn}", self.role());
        Ok(idn)
    }
}
/// Parses a numeric reply, tolerating a leading response header
/// (`:MEAS:FREQ 1.000E+03`). The SCPI not-a-number sentinel is rejected.
fn parse_number(reply: &str) -> Option<f64> {
    let token = reply.split_whitespace().last()?;
    let value = token.parse::<f64>().ok()?;
    (value.is_finite() && value.abs() < SCPI_NOT_A_NUMBER).then_some(value)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ScriptedTransport;
    #[test]
    fn numeric_replies_parse_with_or_without_header() {
        assert_eq!(parse_number("1.5E+03"), Some(1500.0));
        assert_eq!(parse_number(" -12.25 "), Some(-12.25));
        assert_eq!(parse_number(":MEASURE:PHASE 45.0"), Some(45.0));
        assert_eq!(parse_number("9.91E+37"), None);
        assert_eq!(parse_number("OFF"), None);
        assert_eq!(parse_number(""), None);
    }
    #[test]
    fn non_numeric_reply_is_a_parse_error() {
        let transport = ScriptedTransport::constant(Role::Analyzer, "chan off");
        let mut port = ScpiPort::new(transport);
        let err = port.query_f64(":MEASURE:AMPLITUDE?").unwrap_err();
        match err {
            SweepError::Parse { role, command, reply, .. } => {
                assert_eq!(role, Role::Analyzer);
                assert_eq!(command, ":MEASURE:AMPLITUDE?");
                assert_eq!(reply, "chan off");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
    #[test]
    fn waveform_blocks_parse_into_samples() {
        let transport = ScriptedTransport::constant(Role::Analyzer, "0.1, -0.2,3e-1,\t0");
        let mut port = ScpiPort::new(transport);
        let samples = port.query_f64_list(":WAVEFORM:DATA?").unwrap();
        assert_eq!(samples, vec![0.1, -0.2, 0.3, 0.0]);
    }
    #[test]
    fn corrupt_waveform_block_is_rejected() {
        let transport = ScriptedTransport::constant(Role::Analyzer, "0.1,0.2,oops");
        let mut port = ScpiPort::new(transport);
        assert!(matches!(
            port.query_f64_list(":WAVEFORM:DATA?"),
            Err(SweepError::Parse { .. })
        ));
    }
    #[test]
    fn missing_reply_surfaces_transport_error() {
        let transport = ScriptedTransport::new(Role::Source, |_| None);
        let mut port = ScpiPort::new(transport);
        assert!(matches!(
            port.identify(),
            Err(SweepError::Disconnected { role: Role::Source })
        ));
    }
}
