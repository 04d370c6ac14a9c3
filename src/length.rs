//!Musical note lengths and their resolution to timeline ticks.
//!
//!A [`Length`] is a note-length denominator (4 = quarter note, 8 = eighth,
//!and so on). It resolves to ticks against the process-wide whole-note
//!tick base, *zenlen*, at resolution time: changing the base affects all
//!subsequent resolutions but is not retroactive.

use std::sync::atomic::{AtomicU32, Ordering};

///Ticks per whole note unless reconfigured.
pub const DEFAULT_ZENLEN: u32 = 192;

static ZENLEN: AtomicU32 = AtomicU32::new(DEFAULT_ZENLEN);

///Get the current whole-note length in ticks.
pub fn zenlen() -> u32 {
    ZENLEN.load(Ordering::Relaxed)
}

///Set the whole-note length in ticks.
///
///Takes effect for every [`Length::ticks`] call made afterwards, across
///all tracks in the process.
pub fn set_zenlen(ticks: u32) {
    ZENLEN.store(ticks, Ordering::Relaxed);
}

///Note length expressed as a denominator of a whole note.
///
///A denominator of 0 is a sentinel for "zero duration" and always
///resolves to 0 ticks. Denominators larger than the whole-note base
///resolve to 0 ticks through truncating division; that truncation is
///part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Length(u32);

impl Length {
    ///Create a length from a whole-note denominator.
    pub fn new(denominator: u32) -> Length {
        Length(denominator)
    }

    ///The denominator this length was created from.
    pub fn denominator(&self) -> u32 {
        self.0
    }

    ///Resolve to ticks against the current zenlen.
    pub fn ticks(&self) -> i32 {
        match self.0 {
            0 => 0,
            d => (zenlen() / d) as i32,
        }
    }
}

impl From<u32> for Length {
    fn from(denominator: u32) -> Length {
        Length(denominator)
    }
}
