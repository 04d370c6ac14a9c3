//!Sink that transmits events to a real MIDI output port.

use midir::{MidiOutput, MidiOutputConnection};
use thiserror::Error;
use tracing::info;

use super::{Capability, Sink, SinkError};

///Error opening a device sink.
#[derive(Error, Debug)]
pub enum DeviceError {
    ///The MIDI backend could not be initialized.
    #[error("midi backend init failed: {0}")]
    Init(#[from] midir::InitError),

    ///No output port is available, or none matched the requested name.
    #[error("no matching midi output port")]
    NoPort,

    ///Connecting to the chosen port failed.
    #[error("midi port connection failed: {0}")]
    Connect(#[from] midir::ConnectError<MidiOutput>),
}

///Sink that writes channel events straight to a MIDI output port.
///
///Events are packed into a small reusable buffer and transmitted
///immediately, with no queuing and no timestamps; the tick timeline of the
///generating track is not mapped to wall-clock time here. Loop markers,
///debug messages, and meta events cannot be represented on a wire
///connection and are rejected with [`SinkError::Unsupported`].
///
///The buffer is reused across calls, so a single `DeviceSink` must not be
///driven from more than one caller without external synchronization.
pub struct DeviceSink {
    conn: MidiOutputConnection,
    buffer: [u8; 3],
}

impl DeviceSink {
    ///Open the first available output port.
    pub fn open(client_name: &str) -> Result<DeviceSink, DeviceError> {
        let out = MidiOutput::new(client_name)?;
        let ports = out.ports();
        let port = ports.first().ok_or(DeviceError::NoPort)?;
        Self::connect(out, port, client_name)
    }

    ///Open the first output port whose name contains `port_name`.
    pub fn open_port(client_name: &str, port_name: &str) -> Result<DeviceSink, DeviceError> {
        let out = MidiOutput::new(client_name)?;
        let ports = out.ports();
        let port = ports
            .iter()
            .find(|p| {
                out.port_name(p)
                    .map(|n| n.contains(port_name))
                    .unwrap_or(false)
            })
            .ok_or(DeviceError::NoPort)?;
        Self::connect(out, port, client_name)
    }

    fn connect(
        out: MidiOutput,
        port: &midir::MidiOutputPort,
        client_name: &str,
    ) -> Result<DeviceSink, DeviceError> {
        let name = out.port_name(port).unwrap_or_default();
        let conn = out.connect(port, client_name)?;
        info!(port = %name, "connected midi output");
        Ok(DeviceSink {
            conn,
            buffer: [0; 3],
        })
    }

    fn send(&mut self, len: usize) -> Result<(), SinkError> {
        self.conn
            .send(&self.buffer[..len])
            .map_err(|e| SinkError::Transport(Box::new(e)))
    }
}

impl Sink for DeviceSink {
    fn channel_event2(&mut self, channel: u8, status: u8, data: u8) -> Result<(), SinkError> {
        self.buffer[0] = status | (channel & 0x0F);
        self.buffer[1] = data;
        self.send(2)
    }

    fn channel_event3(
        &mut self,
        channel: u8,
        status: u8,
        data1: u8,
        data2: u8,
    ) -> Result<(), SinkError> {
        self.buffer[0] = status | (channel & 0x0F);
        self.buffer[1] = data1;
        self.buffer[2] = data2;
        self.send(3)
    }

    fn meta_bytes(&mut self, _meta_type: u8, _bytes: &[u8]) -> Result<(), SinkError> {
        Err(SinkError::Unsupported(Capability::MetaEvent))
    }

    fn meta_text(&mut self, _meta_type: u8, _text: &str) -> Result<(), SinkError> {
        Err(SinkError::Unsupported(Capability::MetaEvent))
    }

    fn sysex(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.conn
            .send(bytes)
            .map_err(|e| SinkError::Transport(Box::new(e)))
    }

    fn begin_loop(&mut self, _channel: u8) -> Result<(), SinkError> {
        Err(SinkError::Unsupported(Capability::LoopMarker))
    }

    fn break_loop(&mut self, _channel: u8, _targets: &[u32]) -> Result<(), SinkError> {
        Err(SinkError::Unsupported(Capability::LoopMarker))
    }

    fn end_loop(&mut self, _channel: u8, _repeats: u32) -> Result<(), SinkError> {
        Err(SinkError::Unsupported(Capability::LoopMarker))
    }

    fn debug(&mut self, _message: &str) -> Result<(), SinkError> {
        Err(SinkError::Unsupported(Capability::Debug))
    }
}
