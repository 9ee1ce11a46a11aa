use crate::sequence::NoteSequence;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Write a note sequence to Standard MIDI File format 1 bytes.
///
/// Track 0: tempo + time signature.
/// Tracks 1+: one per instrument, with track name, program change, note events.
pub fn sequence_to_midi(seq: &NoteSequence) -> Vec<u8> {
    let ppq = seq.ticks_per_quarter.max(1);
    let mut tracks: Vec<Vec<u8>> = vec![build_tempo_track(seq)];

    // Melodic instruments get channels in order, skipping 9 (drums)
    let mut next_channel = 0u8;

    for instrument in seq.instruments() {
        let notes: Vec<_> = seq.notes.iter().filter(|n| n.instrument == instrument).collect();
        let Some(first) = notes.first() else {
            continue;
        };

        let channel = if first.is_drum {
            9
        } else {
            let ch = next_channel.min(15);
            next_channel += 1;
            if next_channel == 9 {
                next_channel = 10;
            }
            ch
        };

        let mut events: Vec<(u64, Vec<u8>)> = Vec::new();

        let name = format!("Instrument {instrument}");
        let mut name_event = vec![0xFF, 0x03];
        write_vlq(&mut name_event, name.len() as u32);
        name_event.extend_from_slice(name.as_bytes());
        events.push((0, name_event));

        if !first.is_drum {
            events.push((0, vec![0xC0 | (channel & 0x0F), first.program & 0x7F]));
        }

        for note in &notes {
            let on = seconds_to_ticks(note.start_time, seq.qpm, ppq);
            let off = seconds_to_ticks(note.end_time, seq.qpm, ppq).max(on);
            events.push((on, vec![0x90 | (channel & 0x0F), note.pitch & 0x7F, note.velocity.clamp(1, 127)]));
            events.push((off, vec![0x80 | (channel & 0x0F), note.pitch & 0x7F, 0]));
        }

        tracks.push(encode_track(events));
    }

    build_midi_file(ppq, &tracks)
}

fn seconds_to_ticks(seconds: f64, qpm: f64, ppq: u16) -> u64 {
    let qpm = if qpm > 0.0 { qpm } else { 120.0 };
    (seconds.max(0.0) * qpm / 60.0 * ppq as f64).round() as u64
}

/// Build the tempo/time-signature track.
fn build_tempo_track(seq: &NoteSequence) -> Vec<u8> {
    let qpm = if seq.qpm > 0.0 { seq.qpm } else { 120.0 };
    let usec = (60_000_000.0 / qpm).round() as u32;
    let ts = seq.time_signature;
    let denom_pow = (ts.denominator.max(1) as f64).log2() as u8;

    let events = vec![
        (
            0,
            vec![
                0xFF,
                0x51,
                0x03,
                (usec >> 16) as u8,
                (usec >> 8) as u8,
                usec as u8,
            ],
        ),
        (0, vec![0xFF, 0x58, 0x04, ts.numerator, denom_pow, 0x18, 0x08]),
    ];

    encode_track(events)
}

/// Sort absolute-tick events and delta-encode them, adding end of track.
fn encode_track(mut events: Vec<(u64, Vec<u8>)>) -> Vec<u8> {
    // Note-offs before note-ons at the same tick
    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            let b_is_off = b.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            b_is_off.cmp(&a_is_off)
        })
    });

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;

    for (tick, data) in events {
        let delta = tick.saturating_sub(last_tick);
        write_vlq(&mut track_data, delta.min(0x0FFF_FFFF) as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&(ppq & 0x7FFF).to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
pub fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}

/// Write sequences as `<prefix>_<index>_<YYYY-mm-dd_HHMMSS>.mid` under `dir`.
pub fn save_sequences(sequences: &[NoteSequence], dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| Error::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths = Vec::with_capacity(sequences.len());
    for (index, seq) in sequences.iter().enumerate() {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H%M%S");
        let path = dir.join(format!("{prefix}_{index:02}_{stamp}.mid"));
        std::fs::write(&path, sequence_to_midi(seq)).map_err(|e| Error::Io {
            path: path.clone(),
            source: e,
        })?;
        tracing::info!("🎼 Generated midi file: {}", path.display());
        paths.push(path);
    }
    Ok(paths)
}
