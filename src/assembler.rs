//! Band record reassembly
//!
//! The element stream delivers one scalar per message: integer markers that
//! open a collection cycle, per-band float values, and a three-value reset
//! marker that aborts a cycle. [`BandAssembler`] turns that flat token
//! sequence back into complete [`BandRecord`]s.
//!
//! A cycle runs from an integer marker to either the fifth distinct band
//! value (record emitted) or a reset marker (partial record discarded).
//! A band seen twice within one cycle overwrites its slot; completion is
//! gated on five *distinct* bands, not five tokens.
//!
//! The assembler is not safe for concurrent use; callers serialize access
//! (the pipeline holds it behind a mutex).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::record::{Band, BandRecord};

/// Why a token was dropped without affecting assembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The token did not parse as a number
    NotNumeric,
    /// A band value arrived while no cycle was open
    NotCollecting,
    /// The address did not name one of the five bands
    UnknownBand,
    /// A comma-separated token with other than three elements
    MalformedList,
}

/// Result of feeding one token to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenOutcome {
    /// The token completed a record
    Completed(BandRecord),
    /// An integer marker opened (or re-signalled) a collection cycle
    CycleStarted,
    /// The value was stored; the cycle is still incomplete
    Stored,
    /// A reset marker discarded the partial record
    Reset,
    /// The token was dropped
    Ignored(IgnoreReason),
}

impl TokenOutcome {
    /// The completed record, if this token produced one.
    pub fn into_record(self) -> Option<BandRecord> {
        match self {
            TokenOutcome::Completed(record) => Some(record),
            _ => None,
        }
    }
}

/// Counters describing everything the assembler has seen.
///
/// Dropped and out-of-sync tokens are deliberately silent on the hot path;
/// these counters make them observable without changing that behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblerStats {
    /// Cycles opened by an integer marker while idle
    pub cycles_started: u64,
    /// Complete records emitted
    pub records_completed: u64,
    /// Reset markers observed
    pub resets: u64,
    /// Band values that overwrote an already-filled slot
    pub duplicates_overwritten: u64,
    /// Tokens dropped because they were not numeric
    pub ignored_not_numeric: u64,
    /// Band values dropped because no cycle was open
    pub ignored_not_collecting: u64,
    /// Values dropped because the address named no known band
    pub ignored_unknown_band: u64,
    /// Comma lists dropped because they were not three elements
    pub ignored_malformed: u64,
}

/// State machine converting scalar tokens into complete band records.
#[derive(Debug, Default)]
pub struct BandAssembler {
    slots: [Option<f64>; Band::COUNT],
    collecting: bool,
    stats: AssemblerStats,
}

impl BandAssembler {
    /// Create an idle assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one token.
    ///
    /// `band` is the band named by the message address, when it named one;
    /// marker and reset tokens are recognized regardless of it. A completed
    /// record is stamped with `timestamp`.
    ///
    /// Malformed numeric text never errors; it is dropped and counted.
    pub fn process(
        &mut self,
        token: &str,
        band: Option<Band>,
        timestamp: DateTime<Utc>,
    ) -> TokenOutcome {
        // Multi-value messages arrive comma-joined; exactly three values is
        // the reset marker.
        if token.contains(',') {
            if token.split(',').count() == 3 {
                self.stats.resets += 1;
                self.collecting = false;
                self.slots = [None; Band::COUNT];
                return TokenOutcome::Reset;
            }
            self.stats.ignored_malformed += 1;
            return TokenOutcome::Ignored(IgnoreReason::MalformedList);
        }

        let value: f64 = match token.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                self.stats.ignored_not_numeric += 1;
                return TokenOutcome::Ignored(IgnoreReason::NotNumeric);
            }
        };

        // Integer-valued tokens are cycle markers. A redundant marker while
        // already collecting keeps the partial record intact.
        if value.fract() == 0.0 {
            if !self.collecting {
                self.collecting = true;
                self.slots = [None; Band::COUNT];
                self.stats.cycles_started += 1;
            }
            return TokenOutcome::CycleStarted;
        }

        if !self.collecting {
            self.stats.ignored_not_collecting += 1;
            return TokenOutcome::Ignored(IgnoreReason::NotCollecting);
        }

        let Some(band) = band else {
            self.stats.ignored_unknown_band += 1;
            return TokenOutcome::Ignored(IgnoreReason::UnknownBand);
        };

        if self.slots[band.index()].is_some() {
            self.stats.duplicates_overwritten += 1;
        }
        self.slots[band.index()] = Some(value);

        if let [Some(delta), Some(theta), Some(alpha), Some(beta), Some(gamma)] = self.slots {
            self.collecting = false;
            self.slots = [None; Band::COUNT];
            self.stats.records_completed += 1;
            return TokenOutcome::Completed(BandRecord::from_slots(
                timestamp,
                [delta, theta, alpha, beta, gamma],
            ));
        }

        TokenOutcome::Stored
    }

    /// Whether a cycle is currently open
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Distinct bands stored in the open cycle
    pub fn pending_bands(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Snapshot of the assembler counters
    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }
}
