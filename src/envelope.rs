//!Ramp generator for time-varying controller values.
//!
//!An [`Envelope`] is bound to one target parameter of a track and keeps
//!the last value it set. Its ramps produce a side-effecting sequence of
//!intermediate values: each value is applied through the track, which
//!emits the corresponding MIDI event, and the timeline is advanced between
//!applications. On completion every ramp restores the cursor to its entry
//!position, so from the caller's perspective a ramp advances nothing.

use thiserror::Error;

use crate::length::Length;
use crate::sink::SinkError;
use crate::track::Track;

///Error raised by a ramp.
#[derive(Error, Debug)]
pub enum RampError {
    ///The per-step tick count was zero, which would never terminate.
    #[error("ramp step length must be nonzero")]
    ZeroStep,

    ///The sink rejected an intermediate event.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

///The track parameter an envelope drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeTarget {
    ///Tempo meta events through [`Track::set_tempo`].
    Tempo,
    ///Pitch bend in cents through [`Track::set_pitch_bend`].
    PitchBend,
    ///A control change; the value is truncated to a byte at emission.
    Cc(u8),
}

///Ramped parameter state: one target, one current value.
///
///The envelope does not own its track; callers pass the track to each
///call, which keeps one track shareable between several envelopes
///(tempo, bend, expression, ... in a typical MML setup).
#[derive(Debug)]
pub struct Envelope {
    target: EnvelopeTarget,
    current: i32,
}

impl Envelope {
    ///Default tick spacing between one-shot ramp steps.
    pub const DEFAULT_STEP_TICKS: i32 = 4;

    ///Create an envelope over a target, starting at value 0.
    pub fn new(target: EnvelopeTarget) -> Envelope {
        Envelope { target, current: 0 }
    }

    ///Envelope over the tempo.
    pub fn tempo() -> Envelope {
        Envelope::new(EnvelopeTarget::Tempo)
    }

    ///Envelope over the pitch bend.
    pub fn pitch_bend() -> Envelope {
        Envelope::new(EnvelopeTarget::PitchBend)
    }

    ///Envelope over a control change number.
    pub fn cc(controller: u8) -> Envelope {
        Envelope::new(EnvelopeTarget::Cc(controller))
    }

    ///Last value set through this envelope.
    pub fn value(&self) -> i32 {
        self.current
    }

    ///Set the value and emit it through the track.
    pub fn set(&mut self, track: &mut Track, value: i32) -> Result<(), SinkError> {
        self.current = value;
        match self.target {
            EnvelopeTarget::Tempo => track.set_tempo(value),
            EnvelopeTarget::PitchBend => track.set_pitch_bend(value),
            EnvelopeTarget::Cc(controller) => track.control_change(controller, value as u8),
        }
    }

    ///Adjust the value relative to the current one (the `+`/`-` spellings
    ///of the relative macros).
    pub fn adjust(&mut self, track: &mut Track, delta: i32) -> Result<(), SinkError> {
        self.set(track, self.current + delta)
    }

    ///One-shot decay ramp.
    ///
    ///After `start_delay` the value jumps to `start`; then every
    ///`step_ticks` ticks it moves by `(end - start) / (i + 1)` (integer
    ///division), a harmonically decaying increment rather than a constant
    ///slope, for `length / step_ticks` steps. The value is then forced to
    ///exactly `end`, absorbing any rounding drift, and the cursor returns
    ///to where the ramp began.
    pub fn one_shot(
        &mut self,
        track: &mut Track,
        start: i32,
        end: i32,
        start_delay: Length,
        length: Length,
        step_ticks: i32,
    ) -> Result<(), RampError> {
        if step_ticks == 0 {
            return Err(RampError::ZeroStep);
        }
        let entry = track.position();
        let steps = length.ticks() / step_ticks;
        track.advance_ticks(start_delay.ticks());
        self.set(track, start)?;
        for i in 0..steps {
            track.advance_ticks(step_ticks);
            self.set(track, self.current + (end - start) / (i + 1))?;
        }
        self.set(track, end)?;
        track.set_position(entry);
        Ok(())
    }

    ///Triangle ramp.
    ///
    ///After `start_delay` the value jumps to `start`; each of `repeats`
    ///cycles rises by `delta` every `es` ticks for `ts / es` steps, then
    ///falls the same way. `ts / es` uses integer division, so remainder
    ///ticks are dropped. After the cycles the cursor advances by
    ///`end_duration`, the value is set to `end`, and the cursor returns to
    ///where the ramp began.
    #[allow(clippy::too_many_arguments)]
    pub fn triangle(
        &mut self,
        track: &mut Track,
        start: i32,
        end: i32,
        start_delay: Length,
        end_duration: Length,
        ts: i32,
        es: i32,
        delta: i32,
        repeats: i32,
    ) -> Result<(), RampError> {
        if es == 0 {
            return Err(RampError::ZeroStep);
        }
        let entry = track.position();
        track.advance_ticks(start_delay.ticks());
        self.set(track, start)?;
        for _ in 0..repeats {
            for _ in 0..ts / es {
                track.advance_ticks(es);
                self.set(track, self.current + delta)?;
            }
            for _ in 0..ts / es {
                track.advance_ticks(es);
                self.set(track, self.current - delta)?;
            }
        }
        track.advance_ticks(end_duration.ticks());
        self.set(track, end)?;
        track.set_position(entry);
        Ok(())
    }
}
