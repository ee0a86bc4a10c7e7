// src/drivers/mod.rs
pub mod analyzer;
pub mod error;
pub mod fft;
pub mod plot;
pub mod scpi;
pub mod sim;
pub mod source;
pub mod transport;
pub use analyzer::{CapturedWaveform, Oscilloscope};
pub use error::SweepError;
pub use plot::{render_bode_png, PlotStyle};
pub use scpi::ScpiPort;
pub use sim::{SimulatedBench, SimulatedInstrument};
pub use source::{FunctionGenerator, WaveShape};
#[cfg(test)]
pub use transport::ScriptedTransport;
pub use transport::{LinkTimeouts, Role, TcpTransport, Transport};
