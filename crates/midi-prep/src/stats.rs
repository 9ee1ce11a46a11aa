//! Per-file MIDI statistics for dataset exploration.

use serde::{Deserialize, Serialize};

use crate::sequence::NoteSequence;
use crate::timing::{parse, DEFAULT_TEMPO_USEC};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureAt {
    pub numerator: u8,
    pub denominator: u8,
    /// Seconds from the start of the file.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiStatistics {
    pub n_instruments: usize,
    /// Program of each instrument, in instrument order.
    pub program_numbers: Vec<u8>,
    /// Key signatures as 0-11 (major) or 12-23 (minor).
    pub key_numbers: Vec<u8>,
    /// Every tempo in the file, in qpm. Starts at 120 when the file sets none at tick 0.
    pub tempos: Vec<f64>,
    pub time_signature_changes: Vec<TimeSignatureAt>,
    /// Seconds until the last note or meta event.
    pub end_time: f64,
    pub lyrics: Vec<String>,
}

pub fn compute_statistics(midi_bytes: &[u8]) -> Result<MidiStatistics> {
    let (_, timeline) = parse(midi_bytes)?;
    let seq = NoteSequence::from_midi_bytes(midi_bytes)?;

    let program_numbers: Vec<u8> = seq
        .instruments()
        .into_iter()
        .filter_map(|i| seq.notes.iter().find(|n| n.instrument == i).map(|n| n.program))
        .collect();

    let mut tempos: Vec<f64> = timeline.tempo_changes.iter().map(|t| t.bpm).collect();
    if timeline.tempo_changes.first().map(|t| t.tick) != Some(0) {
        tempos.insert(0, 60_000_000.0 / DEFAULT_TEMPO_USEC as f64);
    }

    let time_signature_changes: Vec<TimeSignatureAt> = timeline
        .time_signatures
        .iter()
        .map(|ts| TimeSignatureAt {
            numerator: ts.numerator,
            denominator: ts.denominator,
            time: timeline.tick_to_seconds(ts.tick),
        })
        .collect();

    let meta_ticks = timeline
        .time_signatures
        .iter()
        .map(|t| t.tick)
        .chain(timeline.key_signatures.iter().map(|k| k.tick))
        .chain(timeline.lyrics.iter().map(|l| l.tick));
    let meta_end = meta_ticks
        .map(|tick| timeline.tick_to_seconds(tick))
        .fold(0.0, f64::max);

    Ok(MidiStatistics {
        n_instruments: program_numbers.len(),
        program_numbers,
        key_numbers: timeline.key_signatures.iter().map(|k| k.key_number()).collect(),
        tempos,
        time_signature_changes,
        end_time: seq.total_time.max(meta_end),
        lyrics: timeline.lyrics.iter().map(|l| l.text.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_midi::{make_multi_instrument_midi, make_test_midi_format1, make_two_tempo_midi};
    use pretty_assertions::assert_eq;

    #[test]
    fn multi_instrument_statistics() {
        let stats = compute_statistics(&make_multi_instrument_midi()).unwrap();
        assert_eq!(stats.n_instruments, 3);
        assert_eq!(stats.program_numbers, vec![0, 33, 0]);
        assert_eq!(stats.tempos, vec![120.0]);
        assert_eq!(stats.lyrics, vec!["la"]);
        assert_eq!(stats.time_signature_changes[0].numerator, 3);
        assert!((stats.end_time - 3.0).abs() < 1e-9);
        assert!(stats.key_numbers.is_empty());
    }

    #[test]
    fn key_and_tempo_changes() {
        let stats = compute_statistics(&make_test_midi_format1()).unwrap();
        assert_eq!(stats.key_numbers, vec![0]);

        let stats = compute_statistics(&make_two_tempo_midi()).unwrap();
        assert_eq!(stats.tempos, vec![120.0, 60.0]);
    }

    #[test]
    fn invalid_bytes_error() {
        assert!(compute_statistics(b"MThd").is_err());
    }
}
