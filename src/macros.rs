//!Static macro-name registration table.
//!
//!Binds the textual MML macro names to operation descriptors (kind and
//!argument count) for consumption by an external MML compiler. This is
//!pure metadata: nothing here touches a track, and the runtime operations
//!stay ordinary callable methods.

///How a macro name is spelled and combined in MML source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    ///Ordinary operation macro.
    Plain,

    ///Value macro with additional relative spellings that add to or
    ///subtract from the preserved value.
    Relative {
        #[allow(missing_docs)]
        increase: &'static str,
        #[allow(missing_docs)]
        decrease: &'static str,
    },

    ///Note letter. Suffix spellings `-`, `=`, `+` select the accidental;
    ///the bare letter uses the persistent transpose table.
    Note,

    ///Suffix appended to a relative macro name to select a ramp shape.
    RampSuffix,
}

///Arity of a macro's argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    ///Exactly this many arguments (trailing ones may be defaulted).
    UpTo(usize),
    ///Any number of arguments.
    Variadic,
}

///One entry of the registration table.
#[derive(Debug, Clone, Copy)]
pub struct MacroDef {
    ///Primary MML spelling.
    pub name: &'static str,
    #[allow(missing_docs)]
    pub kind: MacroKind,
    #[allow(missing_docs)]
    pub arity: Arity,
}

const fn plain(name: &'static str, args: usize) -> MacroDef {
    MacroDef {
        name,
        kind: MacroKind::Plain,
        arity: Arity::UpTo(args),
    }
}

const fn relative(
    name: &'static str,
    increase: &'static str,
    decrease: &'static str,
) -> MacroDef {
    MacroDef {
        name,
        kind: MacroKind::Relative { increase, decrease },
        arity: Arity::UpTo(1),
    }
}

const fn note(name: &'static str) -> MacroDef {
    MacroDef {
        name,
        kind: MacroKind::Note,
        //step, gate, velocity, key delay, off velocity
        arity: Arity::UpTo(5),
    }
}

///The full registration table.
pub const MACROS: &[MacroDef] = &[
    plain("CH", 1),
    plain("DEBUG", 1),
    plain("ASSERT_STEP", 2),
    //program, bank MSB, bank LSB
    plain("@", 3),
    plain("TEMPO", 1),
    relative("t", "t+", "t-"),
    plain("BEND_CENT_MODE", 1),
    plain("BEND", 1),
    plain("PITCH_BEND_SENSITIVITY", 1),
    relative("B", "B+", "B-"),
    relative("E", "E+", "E-"),
    relative("M", "M+", "M-"),
    relative("V", "V+", "V-"),
    relative("P", "P+", "P-"),
    relative("H", "H+", "H-"),
    plain("DTEM", 1),
    plain("DTEL", 1),
    plain("DTE", 2),
    plain("SOS", 1),
    plain("SOFT", 1),
    plain("LEGATO", 1),
    relative("RSD", "RSD+", "RSD-"),
    relative("CSD", "CSD+", "CSD-"),
    relative("DSD", "DSD+", "DSD-"),
    plain("NRPNM", 1),
    plain("NRPNL", 1),
    plain("NRPN", 2),
    plain("RPNM", 1),
    plain("RPNL", 1),
    plain("RPN", 2),
    plain("v", 1),
    plain(")", 0),
    plain("(", 0),
    plain("l", 1),
    plain("TIMING", 1),
    plain("GATE_DENOM", 1),
    plain("Q", 1),
    plain("q", 1),
    plain("o", 1),
    plain(">", 0),
    plain("<", 0),
    plain("K", 1),
    plain("Kc+", 0),
    plain("Kd+", 0),
    plain("Ke+", 0),
    plain("Kf+", 0),
    plain("Kg+", 0),
    plain("Ka+", 0),
    plain("Kb+", 0),
    plain("Kc-", 0),
    plain("Kd-", 0),
    plain("Ke-", 0),
    plain("Kf-", 0),
    plain("Kg-", 0),
    plain("Ka-", 0),
    plain("Kb-", 0),
    plain("Kc=", 0),
    plain("Kd=", 0),
    plain("Ke=", 0),
    plain("Kf=", 0),
    plain("Kg=", 0),
    plain("Ka=", 0),
    plain("Kb=", 0),
    //key, step, gate, velocity, key delay, off velocity
    plain("n", 6),
    note("c"),
    note("d"),
    note("e"),
    note("f"),
    note("g"),
    note("a"),
    note("b"),
    plain("r", 1),
    plain("[", 0),
    MacroDef {
        name: ":",
        kind: MacroKind::Plain,
        arity: Arity::Variadic,
    },
    plain("]", 1),
    plain("GM_SYSTEM_ON", 0),
    plain("XG_RESET", 0),
    //start, end, start delay, length, step ticks
    MacroDef {
        name: "_",
        kind: MacroKind::RampSuffix,
        arity: Arity::UpTo(5),
    },
    //start, end, start delay, end duration, ts, es, delta, repeats
    MacroDef {
        name: "t",
        kind: MacroKind::RampSuffix,
        arity: Arity::UpTo(8),
    },
];

///Look up a macro by its primary spelling. Ramp suffixes share spellings
///with value macros, so they are excluded here; use [`ramp_suffix`].
pub fn find(name: &str) -> Option<&'static MacroDef> {
    MACROS
        .iter()
        .find(|m| m.name == name && m.kind != MacroKind::RampSuffix)
}

///Look up a ramp suffix spelling.
pub fn ramp_suffix(name: &str) -> Option<&'static MacroDef> {
    MACROS
        .iter()
        .find(|m| m.name == name && m.kind == MacroKind::RampSuffix)
}
