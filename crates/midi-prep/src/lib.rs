//! MIDI preparation for latent encoding.
//!
//! Cleans Lakh MIDI files (meta-event stripping, per-track splitting),
//! converts them to time-based [`NoteSequence`]s and cuts those into the
//! windows and instrument groups the MusicVAE models accept.

pub mod clean;
pub mod note;
pub mod sequence;
pub mod stats;
pub mod timing;
pub mod writer;

#[cfg(test)]
mod test_midi;

pub use clean::{split_file_name, split_tracks, strip_changes, SplitTrack};
pub use note::{SeqNote, TimedNote};
pub use sequence::{
    bar_duration_secs, chunk_instruments, split_by_instrument, split_by_num_bars, NoteSequence,
    TimeSignature, MAX_BAR_WINDOWS, MAX_MULTITRACK_INSTRUMENTS, STANDARD_PPQ,
};
pub use stats::{compute_statistics, MidiStatistics, TimeSignatureAt};
pub use timing::{
    extract_timeline, KeySignatureChange, Lyric, MidiTimeline, TempoChange, TimeSignatureChange,
};
pub use writer::{save_sequences, sequence_to_midi, write_vlq};

/// Errors from MIDI preparation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("MIDI write error: {0}")]
    MidiWrite(String),

    #[error("SMPTE timecode timing is not supported for note sequences")]
    TimecodeTiming,

    #[error("bar count must be positive")]
    ZeroBars,

    #[error("bar duration {0}s cannot be used to split a sequence")]
    InvalidBarDuration(f64),

    #[error("splitting would produce {windows} windows, more than {max}")]
    TooManyWindows { windows: f64, max: usize },

    #[error("IO error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
