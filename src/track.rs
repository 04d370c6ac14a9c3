//!The track state machine: one logical channel lane of an MML performance.
//!
//!A [`Track`] is a register machine. Its registers are the timeline cursor
//!plus the musical state an MML compiler manipulates (velocity, gate time,
//!octave, transposes, ...); every operation translates into zero or more
//!sink events and cursor movements. There are no modes and no terminal
//!state; execution stops when the caller stops issuing operations.
//!
//!Tracks never share state. Several tracks may render into one shared
//!sink, in which case event interleaving is exactly the callers'
//!sequential call order.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::length::Length;
use crate::pitch::{resolve_key, Accidental, PitchClass, TransposeTable};
use crate::sink::{Sink, SinkError};

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const POLY_PRESSURE: u8 = 0xA0;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;
const CHANNEL_PRESSURE: u8 = 0xD0;
const PITCH_BEND: u8 = 0xE0;

///Per-note overrides for [`Track::note`].
///
///`None` means "use the track's current register". An explicit `velocity`
///or `key_delay` also updates the register, so it persists for subsequent
///notes. `step` and `gate` are tick counts, not denominators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteOptions {
    ///Nominal duration in ticks; defaults to the track's default length.
    pub step: Option<i32>,

    ///Tick span the gate fraction is computed from; defaults to `step`.
    pub gate: Option<i32>,

    ///Note-on velocity; persists into the velocity register when set.
    pub velocity: Option<i32>,

    ///Key delay in ticks; persists into the key-delay register when set.
    pub key_delay: Option<i32>,

    ///Note-off velocity. Not persistent.
    pub off_velocity: u8,
}

///Initial register values for a track, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    ///Channel as a 1-based natural number.
    pub channel: u8,
    #[allow(missing_docs)]
    pub velocity: i32,
    #[allow(missing_docs)]
    pub velocity_relative_sensitivity: i32,
    ///Default note length as a whole-note denominator.
    pub default_length: u32,
    #[allow(missing_docs)]
    pub key_delay: i32,
    #[allow(missing_docs)]
    pub gate_time_denominator: i32,
    #[allow(missing_docs)]
    pub gate_time_relative: i32,
    #[allow(missing_docs)]
    pub gate_time_absolute: i32,
    #[allow(missing_docs)]
    pub octave: i32,
    #[allow(missing_docs)]
    pub transpose: i32,
}

impl Default for TrackConfig {
    fn default() -> TrackConfig {
        TrackConfig {
            channel: 1,
            velocity: 100,
            velocity_relative_sensitivity: 4,
            default_length: 4,
            key_delay: 0,
            gate_time_denominator: 8,
            gate_time_relative: 8,
            gate_time_absolute: 0,
            octave: 4,
            transpose: 0,
        }
    }
}

impl TrackConfig {
    ///Parse a config from a JSON object; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<TrackConfig, serde_json::Error> {
        serde_json::from_str(json)
    }
}

///Track state machine over one shared sink.
pub struct Track {
    sink: Rc<RefCell<dyn Sink>>,
    channel: u8,
    position: i32,
    velocity: i32,
    velocity_relative_sensitivity: i32,
    ///Ticks, resolved from a denominator at set time.
    default_length: i32,
    key_delay: i32,
    gate_time_denominator: i32,
    gate_time_relative: i32,
    gate_time_absolute: i32,
    octave: i32,
    transpose: i32,
    transpose_table: TransposeTable,
    tempo: i32,
    pitch_bend_cents: i32,
    pitch_bend_ratio_by_keys: i32,
}

impl Track {
    ///Create a track with default registers, rendering into `sink`.
    pub fn new(sink: Rc<RefCell<dyn Sink>>) -> Track {
        Track::from_config(&TrackConfig::default(), sink)
    }

    ///Create a track seeded from a config snapshot.
    pub fn from_config(config: &TrackConfig, sink: Rc<RefCell<dyn Sink>>) -> Track {
        Track {
            sink,
            channel: config.channel.saturating_sub(1) & 0x0F,
            position: 0,
            velocity: config.velocity,
            velocity_relative_sensitivity: config.velocity_relative_sensitivity,
            default_length: Length::new(config.default_length).ticks(),
            key_delay: config.key_delay,
            gate_time_denominator: config.gate_time_denominator,
            gate_time_relative: config.gate_time_relative,
            gate_time_absolute: config.gate_time_absolute,
            octave: config.octave,
            transpose: config.transpose,
            transpose_table: TransposeTable::new(),
            tempo: 120,
            pitch_bend_cents: 0,
            pitch_bend_ratio_by_keys: 0,
        }
    }

    // Cursor operators

    ///Current timeline position in ticks.
    pub fn position(&self) -> i32 {
        self.position
    }

    ///Place the cursor at an absolute tick position.
    pub fn set_position(&mut self, ticks: i32) {
        self.position = ticks;
    }

    ///Advance the cursor by a musical length.
    pub fn step(&mut self, length: Length) {
        self.position += length.ticks();
    }

    ///Place the cursor at the tick position a length resolves to.
    pub fn jump_to(&mut self, length: Length) {
        self.position = length.ticks();
    }

    ///Move the cursor back by a musical length.
    pub fn rewind(&mut self, length: Length) {
        self.position -= length.ticks();
    }

    ///Advance the cursor by raw ticks.
    pub fn advance_ticks(&mut self, ticks: i32) {
        self.position += ticks;
    }

    ///Move the cursor back by raw ticks.
    pub fn rewind_ticks(&mut self, ticks: i32) {
        self.position -= ticks;
    }

    // Channel

    ///Internal zero-based channel.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    ///Set the channel from a 1-based natural number. 0 saturates to
    ///channel 0; values above 16 keep only the low channel nibble.
    pub fn set_channel(&mut self, natural: u8) {
        self.channel = natural.saturating_sub(1) & 0x0F;
    }

    // Primitive MIDI operators. Data arguments are passed to the sink
    // as given; nothing here checks the 7-bit range.

    ///Note-on event.
    pub fn note_on(&mut self, key: u8, velocity: u8) -> Result<(), SinkError> {
        self.sink
            .borrow_mut()
            .channel_event3(self.channel, NOTE_ON, key, velocity)
    }

    ///Note-off event.
    pub fn note_off(&mut self, key: u8, velocity: u8) -> Result<(), SinkError> {
        self.sink
            .borrow_mut()
            .channel_event3(self.channel, NOTE_OFF, key, velocity)
    }

    ///Polyphonic key pressure event.
    pub fn poly_pressure(&mut self, key: u8, velocity: u8) -> Result<(), SinkError> {
        self.sink
            .borrow_mut()
            .channel_event3(self.channel, POLY_PRESSURE, key, velocity)
    }

    ///Control-change event.
    pub fn control_change(&mut self, controller: u8, value: u8) -> Result<(), SinkError> {
        self.sink
            .borrow_mut()
            .channel_event3(self.channel, CONTROL_CHANGE, controller, value)
    }

    ///Program-change event.
    pub fn program_change(&mut self, program: u8) -> Result<(), SinkError> {
        self.sink
            .borrow_mut()
            .channel_event2(self.channel, PROGRAM_CHANGE, program)
    }

    ///Channel pressure event.
    pub fn channel_pressure(&mut self, velocity: u8) -> Result<(), SinkError> {
        self.sink
            .borrow_mut()
            .channel_event2(self.channel, CHANNEL_PRESSURE, velocity)
    }

    ///Pitch-bend event from a raw bend amount: LSB is `value % 128`,
    ///MSB is `value / 128`, each truncated to a byte.
    pub fn pitch_bend_raw(&mut self, value: i32) -> Result<(), SinkError> {
        self.sink.borrow_mut().channel_event3(
            self.channel,
            PITCH_BEND,
            (value % 0x80) as u8,
            (value / 0x80) as u8,
        )
    }

    ///Meta event with a binary payload.
    pub fn meta_bytes(&mut self, meta_type: u8, bytes: &[u8]) -> Result<(), SinkError> {
        self.sink.borrow_mut().meta_bytes(meta_type, bytes)
    }

    ///Meta event with a string payload.
    pub fn meta_text(&mut self, meta_type: u8, text: &str) -> Result<(), SinkError> {
        self.sink.borrow_mut().meta_text(meta_type, text)
    }

    ///System-exclusive frame, passed through unframed.
    pub fn sysex(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.sink.borrow_mut().sysex(bytes)
    }

    ///Debug message through the sink's side channel.
    pub fn debug(&mut self, message: &str) -> Result<(), SinkError> {
        self.sink.borrow_mut().debug(message)
    }

    ///Emit a warning through the debug channel if the cursor is not at
    ///the position `expected` resolves to.
    pub fn assert_step(&mut self, expected: Length, label: &str) -> Result<(), SinkError> {
        let expected = expected.ticks();
        if expected != self.position {
            let message = format!(
                "WARNING: step assertion failed: {} (expected: {}, actual: {})",
                label, expected, self.position
            );
            self.sink.borrow_mut().debug(&message)?;
        }
        Ok(())
    }

    // Program selection

    ///Bank select MSB (CC 0), bank select LSB (CC 0x20), then the program
    ///change, in that fixed order.
    pub fn program_with_bank(
        &mut self,
        program: u8,
        bank_msb: u8,
        bank_lsb: u8,
    ) -> Result<(), SinkError> {
        self.control_change(0, bank_msb)?;
        self.control_change(0x20, bank_lsb)?;
        self.program_change(program)
    }

    // Tempo

    ///Stored tempo in BPM.
    pub fn tempo(&self) -> i32 {
        self.tempo
    }

    ///Store the tempo and emit it as a type 0x51 meta event, three bytes
    ///most-significant first.
    pub fn set_tempo(&mut self, value: i32) -> Result<(), SinkError> {
        self.tempo = value;
        self.meta_bytes(
            0x51,
            &[
                (value / 0x10000) as u8,
                (value % 0x10000 / 0x100) as u8,
                (value % 0x100) as u8,
            ],
        )
    }

    // Pitch bend

    ///Stored pitch bend in cents.
    pub fn pitch_bend(&self) -> i32 {
        self.pitch_bend_cents
    }

    ///Divisor for cent-mode bends; 0 disables cent scaling.
    pub fn set_pitch_bend_ratio_by_keys(&mut self, ratio: i32) {
        self.pitch_bend_ratio_by_keys = ratio;
    }

    ///Store the bend in cents and emit a pitch-bend event. With a nonzero
    ///by-keys ratio the emitted amount is `cents / 100 * 8192 / ratio`
    ///(integer division); otherwise the cents value is used directly.
    pub fn set_pitch_bend(&mut self, cents: i32) -> Result<(), SinkError> {
        self.pitch_bend_cents = cents;
        let value = if self.pitch_bend_ratio_by_keys != 0 {
            cents / 100 * 8192 / self.pitch_bend_ratio_by_keys
        } else {
            cents
        };
        self.pitch_bend_raw(value)
    }

    ///Select pitch-bend sensitivity: data entry with the value, then
    ///RPN 0,0.
    pub fn pitch_bend_sensitivity(&mut self, value: u8) -> Result<(), SinkError> {
        self.data_entry(value, 0)?;
        self.rpn(0, 0)
    }

    // Control-change operators

    #[allow(missing_docs)]
    pub fn modulation(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x01, value)
    }

    #[allow(missing_docs)]
    pub fn volume(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x07, value)
    }

    #[allow(missing_docs)]
    pub fn pan(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x0A, value)
    }

    #[allow(missing_docs)]
    pub fn expression(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x0B, value)
    }

    #[allow(missing_docs)]
    pub fn damper_pedal(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x40, value)
    }

    #[allow(missing_docs)]
    pub fn sostenuto(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x42, value)
    }

    #[allow(missing_docs)]
    pub fn soft_pedal(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x43, value)
    }

    #[allow(missing_docs)]
    pub fn legato(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x54, value)
    }

    #[allow(missing_docs)]
    pub fn reverb_send(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x5B, value)
    }

    #[allow(missing_docs)]
    pub fn chorus_send(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x5D, value)
    }

    #[allow(missing_docs)]
    pub fn delay_send(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x5E, value)
    }

    ///Data entry MSB (CC 0x06).
    pub fn data_entry_msb(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x06, value)
    }

    ///Data entry LSB (CC 0x26).
    pub fn data_entry_lsb(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x26, value)
    }

    ///Data entry MSB then LSB.
    pub fn data_entry(&mut self, msb: u8, lsb: u8) -> Result<(), SinkError> {
        self.data_entry_msb(msb)?;
        self.data_entry_lsb(lsb)
    }

    ///NRPN MSB (CC 0x63).
    pub fn nrpn_msb(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x63, value)
    }

    ///NRPN LSB (CC 0x62).
    pub fn nrpn_lsb(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x62, value)
    }

    ///NRPN MSB then LSB.
    pub fn nrpn(&mut self, msb: u8, lsb: u8) -> Result<(), SinkError> {
        self.nrpn_msb(msb)?;
        self.nrpn_lsb(lsb)
    }

    ///RPN MSB (CC 0x65).
    pub fn rpn_msb(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x65, value)
    }

    ///RPN LSB (CC 0x64).
    pub fn rpn_lsb(&mut self, value: u8) -> Result<(), SinkError> {
        self.control_change(0x64, value)
    }

    ///RPN MSB then LSB.
    pub fn rpn(&mut self, msb: u8, lsb: u8) -> Result<(), SinkError> {
        self.rpn_msb(msb)?;
        self.rpn_lsb(lsb)
    }

    // Meta text operators

    #[allow(missing_docs)]
    pub fn text(&mut self, value: &str) -> Result<(), SinkError> {
        self.meta_text(1, value)
    }

    #[allow(missing_docs)]
    pub fn copyright(&mut self, value: &str) -> Result<(), SinkError> {
        self.meta_text(2, value)
    }

    #[allow(missing_docs)]
    pub fn track_name(&mut self, value: &str) -> Result<(), SinkError> {
        self.meta_text(3, value)
    }

    #[allow(missing_docs)]
    pub fn instrument_name(&mut self, value: &str) -> Result<(), SinkError> {
        self.meta_text(4, value)
    }

    #[allow(missing_docs)]
    pub fn lyric(&mut self, value: &str) -> Result<(), SinkError> {
        self.meta_text(5, value)
    }

    #[allow(missing_docs)]
    pub fn marker(&mut self, value: &str) -> Result<(), SinkError> {
        self.meta_text(6, value)
    }

    #[allow(missing_docs)]
    pub fn cue(&mut self, value: &str) -> Result<(), SinkError> {
        self.meta_text(7, value)
    }

    ///Time-signature meta event (type 0x58). The denominator is mapped
    ///to its binary log for the standard values {2,4,8,16}; any other
    ///denominator passes through unchanged.
    pub fn beat(&mut self, numerator: u8, denominator: i32) -> Result<(), SinkError> {
        let dd = match denominator {
            2 => 1,
            4 => 2,
            8 => 3,
            16 => 4,
            other => other,
        };
        self.meta_bytes(0x58, &[numerator, dd as u8, 0, 0])
    }

    // Note flavor registers

    ///Current note-on velocity register.
    pub fn velocity(&self) -> i32 {
        self.velocity
    }

    #[allow(missing_docs)]
    pub fn set_velocity(&mut self, velocity: i32) {
        self.velocity = velocity;
    }

    ///Step applied by the relative velocity operators.
    pub fn set_velocity_relative_sensitivity(&mut self, sensitivity: i32) {
        self.velocity_relative_sensitivity = sensitivity;
    }

    #[allow(missing_docs)]
    pub fn increase_velocity(&mut self) {
        self.velocity += self.velocity_relative_sensitivity;
    }

    #[allow(missing_docs)]
    pub fn decrease_velocity(&mut self) {
        self.velocity -= self.velocity_relative_sensitivity;
    }

    ///Default note duration in ticks.
    pub fn default_length(&self) -> i32 {
        self.default_length
    }

    ///Set the default note duration. Resolved to ticks now, so a later
    ///zenlen change does not rescale it.
    pub fn set_default_length(&mut self, length: Length) {
        self.default_length = length.ticks();
    }

    ///Current key delay in ticks.
    pub fn key_delay(&self) -> i32 {
        self.key_delay
    }

    #[allow(missing_docs)]
    pub fn set_key_delay(&mut self, ticks: i32) {
        self.key_delay = ticks;
    }

    #[allow(missing_docs)]
    pub fn set_gate_time_denominator(&mut self, value: i32) {
        self.gate_time_denominator = value;
    }

    #[allow(missing_docs)]
    pub fn set_gate_time_relative(&mut self, value: i32) {
        self.gate_time_relative = value;
    }

    #[allow(missing_docs)]
    pub fn set_gate_time_absolute(&mut self, value: i32) {
        self.gate_time_absolute = value;
    }

    #[allow(missing_docs)]
    pub fn octave(&self) -> i32 {
        self.octave
    }

    #[allow(missing_docs)]
    pub fn set_octave(&mut self, octave: i32) {
        self.octave = octave;
    }

    #[allow(missing_docs)]
    pub fn increase_octave(&mut self) {
        self.octave += 1;
    }

    #[allow(missing_docs)]
    pub fn decrease_octave(&mut self) {
        self.octave -= 1;
    }

    ///Global transpose in semitones.
    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    #[allow(missing_docs)]
    pub fn set_transpose(&mut self, semitones: i32) {
        self.transpose = semitones;
    }

    ///Persistent accidental for one pitch class; stays until changed.
    pub fn set_pitch_transpose(&mut self, class: PitchClass, accidental: Accidental) {
        self.transpose_table.set(class, accidental);
    }

    ///Current persistent accidental offset for a pitch class.
    pub fn pitch_transpose(&self, class: PitchClass) -> i32 {
        self.transpose_table.get(class)
    }

    // Note and rest operators

    ///Sounded portion of a note spanning `span` ticks:
    ///`span * relative / denominator`, truncated after the division, minus
    ///the absolute offset. Possibly negative; never clamped.
    fn gate_ticks(&self, span: i32) -> i32 {
        (span as f64 * self.gate_time_relative as f64 / self.gate_time_denominator as f64) as i32
            - self.gate_time_absolute
    }

    ///Play one note.
    ///
    ///Effect order: advance by the key delay, note-on, advance by the gate
    ///time, note-off, advance by the remaining step, rewind the key delay.
    ///The net cursor movement is always exactly the step duration,
    ///whatever the gate, key delay, or velocities are.
    pub fn note(&mut self, key: i32, options: NoteOptions) -> Result<(), SinkError> {
        let actual_step = options.step.unwrap_or(self.default_length);
        if let Some(velocity) = options.velocity {
            self.velocity = velocity;
        }
        if let Some(delay) = options.key_delay {
            self.key_delay = delay;
        }

        let gate_span = options.gate.unwrap_or(actual_step);
        let gate = self.gate_ticks(gate_span);
        let key = key as u8;
        let velocity = self.velocity as u8;

        self.advance_ticks(self.key_delay);
        self.note_on(key, velocity)?;
        self.advance_ticks(gate);
        self.note_off(key, options.off_velocity)?;
        self.advance_ticks(actual_step - gate);
        self.rewind_ticks(self.key_delay);
        Ok(())
    }

    ///Play a note given as a pitch class. An explicit accidental
    ///overrides the persistent transpose table for this note only.
    pub fn play(
        &mut self,
        class: PitchClass,
        accidental: Option<Accidental>,
        options: NoteOptions,
    ) -> Result<(), SinkError> {
        let specific = match accidental {
            Some(a) => a.offset(),
            None => self.transpose_table.get(class),
        };
        let key = resolve_key(class, specific, self.octave, self.transpose);
        self.note(key, options)
    }

    ///Silent advance by a musical length. Emits nothing.
    pub fn rest(&mut self, step: Length) {
        self.step(step);
    }

    // Loop operators. The track holds no loop state; these are pure
    // notifications, and looping semantics belong to the sink.

    #[allow(missing_docs)]
    pub fn begin_loop(&mut self) -> Result<(), SinkError> {
        self.sink.borrow_mut().begin_loop(self.channel)
    }

    #[allow(missing_docs)]
    pub fn break_loop(&mut self, targets: &[u32]) -> Result<(), SinkError> {
        self.sink.borrow_mut().break_loop(self.channel, targets)
    }

    #[allow(missing_docs)]
    pub fn end_loop(&mut self, repeats: u32) -> Result<(), SinkError> {
        self.sink.borrow_mut().end_loop(self.channel, repeats)
    }

    // Sysex presets

    ///GM System On.
    pub fn gm_system_on(&mut self) -> Result<(), SinkError> {
        self.sysex(&[0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7])
    }

    ///Yamaha XG reset.
    pub fn xg_reset(&mut self) -> Result<(), SinkError> {
        self.sysex(&[0xF0, 0x43, 0x10, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::TraceSink;

    fn trace_track() -> (Track, Rc<RefCell<String>>) {
        let buf = Rc::new(RefCell::new(String::new()));
        let writer = buf.clone();
        let sink: Rc<RefCell<dyn Sink>> = Rc::new(RefCell::new(TraceSink::new(Box::new(
            move |s| writer.borrow_mut().push_str(s),
        ))));
        (Track::new(sink), buf)
    }

    #[test]
    fn cursor_ops_move_the_position() {
        let (mut track, _) = trace_track();
        track.step(Length::new(4));
        assert_eq!(track.position(), 48);
        track.rewind(Length::new(8));
        assert_eq!(track.position(), 24);
        track.jump_to(Length::new(2));
        assert_eq!(track.position(), 96);
    }

    #[test]
    fn channel_is_translated_from_natural_number() {
        let (mut track, _) = trace_track();
        assert_eq!(track.channel(), 0);
        track.set_channel(10);
        assert_eq!(track.channel(), 9);
        track.set_channel(16);
        assert_eq!(track.channel(), 15);
        //0 saturates instead of wrapping
        track.set_channel(0);
        assert_eq!(track.channel(), 0);
    }

    #[test]
    fn note_net_movement_is_the_step_only() {
        let (mut track, _) = trace_track();
        track.note(60, NoteOptions::default()).unwrap();
        //Default length is a quarter note
        assert_eq!(track.position(), 48);

        //Gate, key delay and off velocity do not change the net movement
        track
            .note(
                62,
                NoteOptions {
                    step: Some(96),
                    gate: Some(30),
                    key_delay: Some(5),
                    off_velocity: 20,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(track.position(), 48 + 96);
    }

    #[test]
    fn note_emits_on_then_off_with_current_velocity() {
        let (mut track, buf) = trace_track();
        track.note(60, NoteOptions::default()).unwrap();
        assert_eq!(
            buf.borrow().as_str(),
            "__MIDI { 144, 60, 100 } __MIDI { 128, 60, 0 } "
        );
    }

    #[test]
    fn explicit_velocity_and_key_delay_persist() {
        let (mut track, _) = trace_track();
        track
            .note(
                60,
                NoteOptions {
                    velocity: Some(80),
                    key_delay: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(track.velocity(), 80);
        assert_eq!(track.key_delay(), 3);
        //Key delay is rewound at the end of the note
        assert_eq!(track.position(), 48);
    }

    #[test]
    fn gate_is_multiplied_then_divided_then_truncated() {
        let (mut track, _) = trace_track();
        track.set_gate_time_denominator(8);
        track.set_gate_time_relative(8);
        track.set_gate_time_absolute(0);
        assert_eq!(track.gate_ticks(192), 192);
        track.set_gate_time_relative(4);
        assert_eq!(track.gate_ticks(192), 96);
        //Multiply before divide: 5*3/8 = 1, not 5*(3/8) = 0
        track.set_gate_time_relative(3);
        assert_eq!(track.gate_ticks(5), 1);
    }

    #[test]
    fn gate_absolute_offset_may_go_negative() {
        let (mut track, _) = trace_track();
        track.set_gate_time_absolute(10);
        assert_eq!(track.gate_ticks(4), -6);
    }

    #[test]
    fn play_resolves_pitch_through_octave_and_accidental() {
        let (mut track, buf) = trace_track();
        track
            .play(PitchClass::E, Some(Accidental::Sharp), NoteOptions::default())
            .unwrap();
        //4*12 + 4 + 1 = 53
        assert!(buf.borrow().starts_with("__MIDI { 144, 53, 100 } "));
    }

    #[test]
    fn play_uses_persistent_transpose_table() {
        let (mut track, buf) = trace_track();
        track.set_pitch_transpose(PitchClass::F, Accidental::Sharp);
        track.play(PitchClass::F, None, NoteOptions::default()).unwrap();
        track.play(PitchClass::F, None, NoteOptions::default()).unwrap();
        //F#4 = 4*12 + 5 + 1 = 54, on both notes
        let out = buf.borrow();
        assert_eq!(out.matches("__MIDI { 144, 54, 100 } ").count(), 2);
    }

    #[test]
    fn explicit_accidental_overrides_table_for_one_note() {
        let (mut track, buf) = trace_track();
        track.set_pitch_transpose(PitchClass::C, Accidental::Sharp);
        track
            .play(PitchClass::C, Some(Accidental::Natural), NoteOptions::default())
            .unwrap();
        assert!(buf.borrow().starts_with("__MIDI { 144, 48, 100 } "));
        //Table entry is untouched
        assert_eq!(track.pitch_transpose(PitchClass::C), 1);
    }

    #[test]
    fn rest_advances_without_emitting() {
        let (mut track, buf) = trace_track();
        track.rest(Length::new(8));
        assert_eq!(track.position(), 24);
        assert_eq!(buf.borrow().as_str(), "");
    }

    #[test]
    fn program_with_bank_emits_three_events_in_order() {
        let (mut track, buf) = trace_track();
        track.program_with_bank(10, 5, 6).unwrap();
        assert_eq!(
            buf.borrow().as_str(),
            "__MIDI { 176, 0, 5 } __MIDI { 176, 32, 6 } __MIDI { 192, 10 } "
        );
    }

    #[test]
    fn tempo_meta_uses_base_256_digits() {
        let (mut track, buf) = trace_track();
        track.set_tempo(120).unwrap();
        assert_eq!(buf.borrow().as_str(), "__MIDI_META { 81, 0, 0, 120 } ");
        assert_eq!(track.tempo(), 120);

        buf.borrow_mut().clear();
        track.set_tempo(0x123456).unwrap();
        assert_eq!(
            buf.borrow().as_str(),
            "__MIDI_META { 81, 18, 52, 86 } "
        );
    }

    #[test]
    fn pitch_bend_without_ratio_uses_raw_cents() {
        let (mut track, buf) = trace_track();
        track.set_pitch_bend(300).unwrap();
        //300 % 128 = 44, 300 / 128 = 2
        assert_eq!(buf.borrow().as_str(), "__MIDI { 224, 44, 2 } ");
        assert_eq!(track.pitch_bend(), 300);
    }

    #[test]
    fn pitch_bend_with_ratio_scales_cents() {
        let (mut track, buf) = trace_track();
        track.set_pitch_bend_ratio_by_keys(2);
        track.set_pitch_bend(200).unwrap();
        //200/100 * 8192 / 2 = 8192 -> LSB 0, MSB 64
        assert_eq!(buf.borrow().as_str(), "__MIDI { 224, 0, 64 } ");
    }

    #[test]
    fn pitch_bend_sensitivity_sends_data_entry_then_rpn() {
        let (mut track, buf) = trace_track();
        track.pitch_bend_sensitivity(2).unwrap();
        assert_eq!(
            buf.borrow().as_str(),
            "__MIDI { 176, 6, 2 } __MIDI { 176, 38, 0 } \
             __MIDI { 176, 101, 0 } __MIDI { 176, 100, 0 } "
        );
    }

    #[test]
    fn beat_maps_standard_denominators_to_binary_log() {
        let (mut track, buf) = trace_track();
        track.beat(3, 8).unwrap();
        assert_eq!(buf.borrow().as_str(), "__MIDI_META { 88, 3, 3, 0, 0 } ");

        buf.borrow_mut().clear();
        //Nonstandard denominators pass through
        track.beat(5, 5).unwrap();
        assert_eq!(buf.borrow().as_str(), "__MIDI_META { 88, 5, 5, 0, 0 } ");
    }

    #[test]
    fn relative_velocity_operators_use_sensitivity() {
        let (mut track, _) = trace_track();
        track.increase_velocity();
        assert_eq!(track.velocity(), 104);
        track.set_velocity_relative_sensitivity(10);
        track.decrease_velocity();
        track.decrease_velocity();
        assert_eq!(track.velocity(), 84);
    }

    #[test]
    fn octave_operators() {
        let (mut track, _) = trace_track();
        track.increase_octave();
        assert_eq!(track.octave(), 5);
        track.decrease_octave();
        track.decrease_octave();
        assert_eq!(track.octave(), 3);
    }

    #[test]
    fn loop_markers_pass_through_to_the_sink() {
        let (mut track, buf) = trace_track();
        track.begin_loop().unwrap();
        track.break_loop(&[2]).unwrap();
        track.end_loop(4).unwrap();
        assert_eq!(buf.borrow().as_str(), "[:2]4");
        //No cursor movement from loop markers
        assert_eq!(track.position(), 0);
    }

    #[test]
    fn assert_step_warns_only_on_mismatch() {
        let (mut track, buf) = trace_track();
        track.step(Length::new(4));
        track.assert_step(Length::new(4), "bar 1").unwrap();
        assert_eq!(buf.borrow().as_str(), "");
        track.assert_step(Length::new(2), "bar 1").unwrap();
        assert_eq!(
            buf.borrow().as_str(),
            "WARNING: step assertion failed: bar 1 (expected: 96, actual: 48)\n"
        );
    }

    #[test]
    fn sysex_presets_send_full_frames() {
        let (mut track, buf) = trace_track();
        track.gm_system_on().unwrap();
        assert_eq!(
            buf.borrow().as_str(),
            "__MIDI { #f0, #7e, #7f, #09, #01, #f7 } "
        );
    }

    #[test]
    fn config_seeds_registers() {
        let config = TrackConfig {
            channel: 10,
            velocity: 64,
            octave: 6,
            ..Default::default()
        };
        let sink: Rc<RefCell<dyn Sink>> =
            Rc::new(RefCell::new(TraceSink::new(Box::new(|_| ()))));
        let track = Track::from_config(&config, sink);
        assert_eq!(track.channel(), 9);
        assert_eq!(track.velocity(), 64);
        assert_eq!(track.octave(), 6);
        assert_eq!(track.default_length(), 48);
    }

    #[test]
    fn config_parses_from_partial_json() {
        let config = TrackConfig::from_json(r#"{ "channel": 2, "velocity": 90 }"#).unwrap();
        assert_eq!(config.channel, 2);
        assert_eq!(config.velocity, 90);
        //Unlisted fields keep their defaults
        assert_eq!(config.gate_time_relative, 8);
        assert_eq!(config.default_length, 4);
    }

    #[test]
    fn shared_sink_interleaves_in_call_order() {
        let buf = Rc::new(RefCell::new(String::new()));
        let writer = buf.clone();
        let sink: Rc<RefCell<dyn Sink>> = Rc::new(RefCell::new(TraceSink::new(Box::new(
            move |s| writer.borrow_mut().push_str(s),
        ))));
        let mut first = Track::new(sink.clone());
        let mut second = Track::new(sink);
        second.set_channel(2);

        first.program_change(1).unwrap();
        second.program_change(2).unwrap();
        first.program_change(3).unwrap();
        assert_eq!(
            buf.borrow().as_str(),
            "__MIDI { 192, 1 } __MIDI { 193, 2 } __MIDI { 192, 3 } "
        );
    }
}
