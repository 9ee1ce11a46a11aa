use serde::{Deserialize, Serialize};

/// A single MIDI note with absolute tick timing and source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    pub onset_tick: u64,
    pub offset_tick: u64,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
    /// Program active on the note's channel at its onset.
    pub program: u8,
    pub track_index: usize,
}

impl TimedNote {
    pub fn duration_ticks(&self) -> u64 {
        self.offset_tick.saturating_sub(self.onset_tick)
    }

    pub fn is_drum(&self) -> bool {
        self.channel == 9
    }
}

/// A note in a [`NoteSequence`](crate::NoteSequence), timed in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start_time: f64,
    pub end_time: f64,
    /// Instrument index within the sequence.
    pub instrument: u32,
    pub program: u8,
    pub is_drum: bool,
}

impl SeqNote {
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}
