//! Time-based note sequences, the unit the MusicVAE encoder consumes.
//!
//! A [`NoteSequence`] holds notes in seconds with a single reference tempo.
//! Multi-tempo files are flattened through the tempo map on the way in, so
//! note timing survives even though only the first tempo is kept.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::note::SeqNote;
use crate::timing::parse;
use crate::{Error, Result};

/// Ticks per quarter note for sequences built from scratch.
pub const STANDARD_PPQ: u16 = 220;
/// Largest instrument count the multitrack models accept.
pub const MAX_MULTITRACK_INSTRUMENTS: usize = 8;

/// Upper bound on windows cut from one sequence.
pub const MAX_BAR_WINDOWS: usize = 100_000;

const DEFAULT_QPM: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    /// Length of one bar in quarter notes. A zero numerator or denominator
    /// reads as 4/4.
    pub fn quarters_per_bar(&self) -> f64 {
        if self.numerator == 0 || self.denominator == 0 {
            return 4.0;
        }
        self.numerator as f64 * 4.0 / self.denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSequence {
    pub ticks_per_quarter: u16,
    /// Quarter notes per minute.
    pub qpm: f64,
    pub time_signature: TimeSignature,
    pub notes: Vec<SeqNote>,
    /// End of the last note, in seconds.
    pub total_time: f64,
}

impl NoteSequence {
    /// An empty sequence at 120 qpm and the standard resolution.
    pub fn empty() -> Self {
        Self {
            ticks_per_quarter: STANDARD_PPQ,
            qpm: DEFAULT_QPM,
            time_signature: TimeSignature::default(),
            notes: Vec::new(),
            total_time: 0.0,
        }
    }

    /// An empty sequence with the tempo, resolution and meter of `other`.
    pub fn empty_like(other: &NoteSequence) -> Self {
        Self {
            ticks_per_quarter: other.ticks_per_quarter,
            qpm: other.qpm,
            time_signature: other.time_signature,
            notes: Vec::new(),
            total_time: 0.0,
        }
    }

    /// Build from SMF bytes.
    ///
    /// Each distinct (track, channel, program) becomes one instrument,
    /// numbered in that order.
    pub fn from_midi_bytes(midi_bytes: &[u8]) -> Result<Self> {
        let (smf, timeline) = parse(midi_bytes)?;
        if matches!(smf.header.timing, midly::Timing::Timecode(..)) {
            return Err(Error::TimecodeTiming);
        }

        let mut instrument_keys: BTreeMap<(usize, u8, u8), u32> = BTreeMap::new();
        for note in &timeline.notes {
            instrument_keys.insert((note.track_index, note.channel, note.program), 0);
        }
        for (index, slot) in instrument_keys.values_mut().enumerate() {
            *slot = index as u32;
        }

        let notes: Vec<SeqNote> = timeline
            .notes
            .iter()
            .map(|n| SeqNote {
                pitch: n.pitch,
                velocity: n.velocity,
                start_time: timeline.tick_to_seconds(n.onset_tick),
                end_time: timeline.tick_to_seconds(n.offset_tick),
                instrument: instrument_keys[&(n.track_index, n.channel, n.program)],
                program: n.program,
                is_drum: n.is_drum(),
            })
            .collect();

        let time_signature = timeline
            .time_signatures
            .first()
            .map(|ts| TimeSignature {
                numerator: ts.numerator,
                denominator: ts.denominator,
            })
            .unwrap_or_default();

        let mut seq = Self {
            ticks_per_quarter: timeline.ppq,
            qpm: timeline.initial_qpm(),
            time_signature,
            notes,
            total_time: 0.0,
        };
        seq.recompute_total_time();
        Ok(seq)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_midi_bytes(&bytes)
    }

    /// Distinct instrument indices, ascending.
    pub fn instruments(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.notes.iter().map(|n| n.instrument).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn recompute_total_time(&mut self) {
        self.total_time = self.notes.iter().map(|n| n.end_time).fold(0.0, f64::max);
    }

    /// Copy of the notes of the given instruments, renumbered from 0 in the
    /// order given.
    fn with_instruments(&self, instruments: &[u32]) -> Self {
        let mut seq = Self::empty_like(self);
        seq.notes = self
            .notes
            .iter()
            .filter_map(|n| {
                let new_index = instruments.iter().position(|&i| i == n.instrument)?;
                Some(SeqNote {
                    instrument: new_index as u32,
                    ..n.clone()
                })
            })
            .collect();
        seq.recompute_total_time();
        seq
    }
}

/// Seconds covered by `n_bars` bars at the sequence's tempo and meter.
pub fn bar_duration_secs(seq: &NoteSequence, n_bars: u32) -> f64 {
    let qpm = if seq.qpm > 0.0 { seq.qpm } else { DEFAULT_QPM };
    n_bars as f64 * seq.time_signature.quarters_per_bar() * 60.0 / qpm
}

/// Cut a sequence into consecutive windows of `n_bars` bars.
///
/// A note belongs to the window containing its onset and is clipped at
/// the window's end. Times in each window start from 0. Empty windows are
/// kept so window `i` always starts at `i * bar_duration`.
pub fn split_by_num_bars(seq: &NoteSequence, n_bars: u32) -> Result<Vec<NoteSequence>> {
    if n_bars == 0 {
        return Err(Error::ZeroBars);
    }
    let window = bar_duration_secs(seq, n_bars);
    if !window.is_finite() || window <= 0.0 {
        return Err(Error::InvalidBarDuration(window));
    }
    let count = (seq.total_time / window).ceil();
    if !count.is_finite() || count > MAX_BAR_WINDOWS as f64 {
        return Err(Error::TooManyWindows {
            windows: count,
            max: MAX_BAR_WINDOWS,
        });
    }
    let n_windows = (count as usize).max(1);

    let mut windows: Vec<NoteSequence> = (0..n_windows)
        .map(|_| NoteSequence::empty_like(seq))
        .collect();

    for note in &seq.notes {
        let index = ((note.start_time / window).floor() as usize).min(n_windows - 1);
        let start = index as f64 * window;
        let end = start + window;
        windows[index].notes.push(SeqNote {
            start_time: note.start_time - start,
            end_time: note.end_time.min(end) - start,
            ..note.clone()
        });
    }

    for (index, w) in windows.iter_mut().enumerate() {
        let start = index as f64 * window;
        w.total_time = (seq.total_time.min(start + window) - start).max(0.0);
    }

    Ok(windows)
}

/// One sequence per instrument, each renumbered to instrument 0.
pub fn split_by_instrument(seq: &NoteSequence) -> Vec<NoteSequence> {
    seq.instruments()
        .into_iter()
        .map(|instrument| seq.with_instruments(&[instrument]))
        .collect()
}

/// Group instruments into sequences of at most `max` instruments, keeping order.
pub fn chunk_instruments(seq: &NoteSequence, max: usize) -> Vec<NoteSequence> {
    seq.instruments()
        .chunks(max.max(1))
        .map(|group| seq.with_instruments(group))
        .collect()
}
