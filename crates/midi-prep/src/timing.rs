use crate::note::TimedNote;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Microseconds per quarter note when a file never sets a tempo (120 BPM).
pub const DEFAULT_TEMPO_USEC: u32 = 500_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub microseconds_per_beat: u32,
    pub bpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignatureChange {
    pub tick: u64,
    pub numerator: u8,
    pub denominator: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySignatureChange {
    pub tick: u64,
    /// Positive for sharps, negative for flats.
    pub sharps: i8,
    pub minor: bool,
}

impl KeySignatureChange {
    /// Key as 0-11 for major (C=0) and 12-23 for minor (Cm=12).
    pub fn key_number(&self) -> u8 {
        let fifths = (self.sharps as i32 * 7).rem_euclid(12);
        if self.minor {
            ((fifths + 9) % 12 + 12) as u8
        } else {
            fifths as u8
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lyric {
    pub tick: u64,
    pub text: String,
}

/// Everything time-related in a parsed MIDI file, notes included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiTimeline {
    pub ppq: u16,
    pub format: u8,
    pub track_count: usize,
    pub notes: Vec<TimedNote>,
    pub tempo_changes: Vec<TempoChange>,
    pub time_signatures: Vec<TimeSignatureChange>,
    pub key_signatures: Vec<KeySignatureChange>,
    pub lyrics: Vec<Lyric>,
    pub total_ticks: u64,
}

impl MidiTimeline {
    /// Convert an absolute tick to seconds through the tempo map.
    pub fn tick_to_seconds(&self, tick: u64) -> f64 {
        let ppq = self.ppq.max(1) as f64;
        let mut seconds = 0.0;
        let mut last_tick = 0u64;
        let mut usec = DEFAULT_TEMPO_USEC as f64;

        for change in &self.tempo_changes {
            if change.tick >= tick {
                break;
            }
            seconds += (change.tick - last_tick) as f64 * usec / ppq / 1_000_000.0;
            last_tick = change.tick;
            usec = change.microseconds_per_beat as f64;
        }

        seconds + (tick - last_tick) as f64 * usec / ppq / 1_000_000.0
    }

    /// Tempo in effect at tick 0, as quarter notes per minute.
    pub fn initial_qpm(&self) -> f64 {
        self.tempo_changes
            .first()
            .filter(|t| t.tick == 0)
            .map(|t| t.bpm)
            .unwrap_or(60_000_000.0 / DEFAULT_TEMPO_USEC as f64)
    }
}

/// Parse MIDI bytes and collect the timeline.
pub fn parse(midi_bytes: &[u8]) -> crate::Result<(Smf<'_>, MidiTimeline)> {
    let smf = Smf::parse(midi_bytes).map_err(|e| crate::Error::MidiParse(e.to_string()))?;
    let timeline = extract_timeline(&smf);
    Ok((smf, timeline))
}

/// Walk every track, pairing note-on/note-off events and gathering meta events.
pub fn extract_timeline(smf: &Smf) -> MidiTimeline {
    let ppq = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(_, _) => 480,
    };

    let format = match smf.header.format {
        midly::Format::SingleTrack => 0,
        midly::Format::Parallel => 1,
        midly::Format::Sequential => 2,
    };

    let mut all_notes = Vec::new();
    let mut tempo_changes = Vec::new();
    let mut time_signatures = Vec::new();
    let mut key_signatures = Vec::new();
    let mut lyrics = Vec::new();
    let mut total_ticks: u64 = 0;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        let mut programs = [0u8; 16];
        // (channel, pitch) → stack of (onset_tick, velocity, program)
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8, u8)>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    let usec = tempo.as_int();
                    tempo_changes.push(TempoChange {
                        tick: current_tick,
                        microseconds_per_beat: usec,
                        bpm: 60_000_000.0 / usec.max(1) as f64,
                    });
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    time_signatures.push(TimeSignatureChange {
                        tick: current_tick,
                        numerator: num,
                        denominator: 1u8.checked_shl(denom_pow as u32).unwrap_or(4),
                    });
                }
                TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                    key_signatures.push(KeySignatureChange {
                        tick: current_tick,
                        sharps,
                        minor,
                    });
                }
                TrackEventKind::Meta(MetaMessage::Lyric(bytes)) => {
                    lyrics.push(Lyric {
                        tick: current_tick,
                        text: String::from_utf8_lossy(bytes).into_owned(),
                    });
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs[ch as usize] = program.as_int();
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending.entry((ch, key.as_int())).or_default().push((
                                current_tick,
                                vel.as_int(),
                                programs[ch as usize],
                            ));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            // vel=0 NoteOn is NoteOff
                            let key = (ch, key.as_int());
                            if let Some((onset, velocity, program)) =
                                pending.get_mut(&key).and_then(|stack| stack.pop())
                            {
                                all_notes.push(TimedNote {
                                    onset_tick: onset,
                                    offset_tick: current_tick,
                                    pitch: key.1,
                                    velocity,
                                    channel: ch,
                                    program,
                                    track_index,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }

            total_ticks = total_ticks.max(current_tick);
        }

        // Close any unclosed notes at the track's final tick
        for (&(ch, pitch), stack) in &pending {
            for &(onset, velocity, program) in stack {
                all_notes.push(TimedNote {
                    onset_tick: onset,
                    offset_tick: current_tick,
                    pitch,
                    velocity,
                    channel: ch,
                    program,
                    track_index,
                });
            }
        }
    }

    // Sort by onset, then track and pitch for determinism
    all_notes.sort_by(|a, b| {
        a.onset_tick
            .cmp(&b.onset_tick)
            .then(a.track_index.cmp(&b.track_index))
            .then(a.pitch.cmp(&b.pitch))
    });

    // Format 1 files often repeat the tempo map in several tracks
    tempo_changes.sort_by_key(|t| t.tick);
    tempo_changes
        .dedup_by(|a, b| a.tick == b.tick && a.microseconds_per_beat == b.microseconds_per_beat);

    time_signatures.sort_by_key(|t| t.tick);
    time_signatures.dedup_by(|a, b| a.tick == b.tick);

    key_signatures.sort_by_key(|k| k.tick);
    key_signatures.dedup_by(|a, b| a.tick == b.tick);

    lyrics.sort_by_key(|l| l.tick);

    MidiTimeline {
        ppq,
        format,
        track_count: smf.tracks.len(),
        notes: all_notes,
        tempo_changes,
        time_signatures,
        key_signatures,
        lyrics,
        total_ticks,
    }
}
