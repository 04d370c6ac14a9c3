//!The output boundary between event generation and event rendering.
//!
//!A [`Sink`] receives discrete event calls and renders or transmits them.
//!It knows nothing about musical time beyond the bytes it is given. Every
//!capability must either be implemented or explicitly rejected with
//![`SinkError::Unsupported`] so that callers can detect the gap instead of
//!losing events.

mod trace;

#[cfg(feature = "device")]
mod device;

#[cfg(feature = "device")]
pub use device::{DeviceError, DeviceSink};
pub use trace::TraceSink;

use core::fmt;
use thiserror::Error;

///A capability a sink may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ///Channel voice events (2 or 3 bytes).
    ChannelEvent,
    ///Meta events (tempo, text, time signature, ...).
    MetaEvent,
    ///System-exclusive byte sequences.
    Sysex,
    ///Loop begin/break/end notifications.
    LoopMarker,
    ///Debug messages.
    Debug,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ChannelEvent => write!(f, "channel events"),
            Capability::MetaEvent => write!(f, "meta events"),
            Capability::Sysex => write!(f, "sysex"),
            Capability::LoopMarker => write!(f, "loop markers"),
            Capability::Debug => write!(f, "debug messages"),
        }
    }
}

///Error raised by a sink on an event call.
#[derive(Error, Debug)]
pub enum SinkError {
    ///The sink cannot represent this capability at all. This is a
    ///configuration error on the caller's side, not a runtime condition
    ///to retry.
    #[error("sink does not support {0}")]
    Unsupported(Capability),

    ///The underlying transport failed to deliver the event.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

///Polymorphic event output boundary.
///
///Channel numbers arrive zero-based. Status codes arrive without the
///channel nibble; combining them is the sink's job. Data bytes are passed
///through as given, without range validation.
pub trait Sink {
    ///Two-byte channel event (program change, channel pressure).
    fn channel_event2(&mut self, channel: u8, status: u8, data: u8) -> Result<(), SinkError>;

    ///Three-byte channel event (note on/off, polyphonic pressure,
    ///control change, pitch bend).
    fn channel_event3(
        &mut self,
        channel: u8,
        status: u8,
        data1: u8,
        data2: u8,
    ) -> Result<(), SinkError>;

    ///Meta event with a short binary payload.
    fn meta_bytes(&mut self, meta_type: u8, bytes: &[u8]) -> Result<(), SinkError>;

    ///Meta event with a string payload. The protocol layer performs no
    ///escaping; a textual sink may escape for its own representation.
    fn meta_text(&mut self, meta_type: u8, text: &str) -> Result<(), SinkError>;

    ///System-exclusive byte sequence. The caller supplies the full frame,
    ///including any leading 0xF0 and trailing 0xF7.
    fn sysex(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    ///Loop start marker.
    fn begin_loop(&mut self, channel: u8) -> Result<(), SinkError>;

    ///Loop break marker with the iterations it applies to.
    fn break_loop(&mut self, channel: u8, targets: &[u32]) -> Result<(), SinkError>;

    ///Loop end marker with a repeat count.
    fn end_loop(&mut self, channel: u8, repeats: u32) -> Result<(), SinkError>;

    ///Debug message side channel.
    fn debug(&mut self, message: &str) -> Result<(), SinkError>;
}
