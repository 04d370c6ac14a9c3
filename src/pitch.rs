//!Pitch classes, accidentals, and MIDI key resolution.
//!
//!Key numbers are computed as
//!`octave * 12 + semitone + accidental + transpose` and are deliberately
//!not clamped to 0..=127; out-of-range results pass through to the caller
//!unchanged.

use serde::{Deserialize, Serialize};

///One of the seven diatonic pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitchClass {
    #[allow(missing_docs)]
    C,
    #[allow(missing_docs)]
    D,
    #[allow(missing_docs)]
    E,
    #[allow(missing_docs)]
    F,
    #[allow(missing_docs)]
    G,
    #[allow(missing_docs)]
    A,
    #[allow(missing_docs)]
    B,
}

impl PitchClass {
    ///Semitones above C.
    pub fn semitone(&self) -> i32 {
        match self {
            PitchClass::C => 0,
            PitchClass::D => 2,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::G => 7,
            PitchClass::A => 9,
            PitchClass::B => 11,
        }
    }

    fn index(&self) -> usize {
        match self {
            PitchClass::C => 0,
            PitchClass::D => 1,
            PitchClass::E => 2,
            PitchClass::F => 3,
            PitchClass::G => 4,
            PitchClass::A => 5,
            PitchClass::B => 6,
        }
    }
}

///Accidental applied to a pitch class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accidental {
    ///One semitone down.
    Flat,
    ///No offset.
    Natural,
    ///One semitone up.
    Sharp,
}

impl Accidental {
    ///Semitone offset of the accidental.
    pub fn offset(&self) -> i32 {
        match self {
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
        }
    }
}

///Per-pitch-class persistent accidental state.
///
///Each of the seven classes carries its own offset, set independently and
///kept until explicitly changed; notes played through a track consult this
///table unless an explicit accidental overrides it for one note.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransposeTable {
    offsets: [i32; 7],
}

impl TransposeTable {
    ///Table with every class natural.
    pub fn new() -> TransposeTable {
        TransposeTable::default()
    }

    ///Current offset for a pitch class.
    pub fn get(&self, class: PitchClass) -> i32 {
        self.offsets[class.index()]
    }

    ///Set the accidental for a pitch class. Persists until changed.
    pub fn set(&mut self, class: PitchClass, accidental: Accidental) {
        self.offsets[class.index()] = accidental.offset();
    }
}

///Resolve a MIDI key number. `accidental` is a semitone offset, usually
///from [`Accidental::offset`] or a [`TransposeTable`] entry.
pub fn resolve_key(class: PitchClass, accidental: i32, octave: i32, transpose: i32) -> i32 {
    octave * 12 + class.semitone() + accidental + transpose
}
