#![warn(missing_docs)]
//!Runtime core for MML (Music Macro Language) engines.
//!
//!An external compiler turns MML source into calls on a [`track::Track`];
//!the track translates each call into zero or more MIDI protocol events at
//!well-defined tick positions and hands them to a [`sink::Sink`]. Two sink
//!implementations are provided: a textual trace sink for inspection and
//!testing, and (behind the default `device` feature) a sink that transmits
//!to a real MIDI output port.
//!
//!The core is tick-synchronous, not real-time-synchronous: it never maps
//!ticks to wall-clock time, and the device sink sends every event "now".
//!Pacing is the caller's responsibility.

pub mod envelope;
pub mod length;
pub mod macros;
pub mod pitch;
pub mod sink;
pub mod track;

pub use envelope::{Envelope, EnvelopeTarget};
pub use length::Length;
pub use pitch::{Accidental, PitchClass};
pub use sink::{Sink, SinkError};
pub use track::{NoteOptions, Track, TrackConfig};
