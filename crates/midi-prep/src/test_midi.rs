//! Hand-built SMF fixtures shared by the unit tests.

use crate::writer::write_vlq;

pub const END_OF_TRACK: [u8; 4] = [0x00, 0xFF, 0x2F, 0x00];
/// 120 BPM (500000 usec/beat) at delta 0
pub const TEMPO_120: [u8; 7] = [0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20];
/// 4/4 at delta 0
pub const TIME_SIG_4_4: [u8; 8] = [0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08];
/// C major at delta 0
pub const KEY_SIG_C: [u8; 6] = [0x00, 0xFF, 0x59, 0x02, 0x00, 0x00];

pub fn smf(format: u16, ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&format.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
        buf.extend_from_slice(track);
    }
    buf
}

pub fn track_name(track: &mut Vec<u8>, name: &str) {
    track.extend_from_slice(&[0x00, 0xFF, 0x03]);
    write_vlq(track, name.len() as u32);
    track.extend_from_slice(name.as_bytes());
}

/// Note on at `delta`, note off `length` ticks later.
pub fn note(track: &mut Vec<u8>, delta: u32, channel: u8, pitch: u8, length: u32) {
    write_vlq(track, delta);
    track.extend_from_slice(&[0x90 | channel, pitch, 100]);
    write_vlq(track, length);
    track.extend_from_slice(&[0x80 | channel, pitch, 0]);
}

/// Format 1: tempo/meter/key track plus a three-note melody, 480 PPQ.
pub fn make_test_midi_format1() -> Vec<u8> {
    let mut track0 = Vec::new();
    track0.extend_from_slice(&TEMPO_120);
    track0.extend_from_slice(&TIME_SIG_4_4);
    track0.extend_from_slice(&KEY_SIG_C);
    track0.extend_from_slice(&END_OF_TRACK);

    // C4, E4, G4, one beat each
    let mut track1 = Vec::new();
    track_name(&mut track1, "Melody");
    for pitch in [60, 64, 67] {
        note(&mut track1, 0, 0, pitch, 480);
    }
    track1.extend_from_slice(&END_OF_TRACK);

    smf(1, 480, &[track0, track1])
}

/// 120 BPM for one beat, then 60 BPM. One note spanning both.
pub fn make_two_tempo_midi() -> Vec<u8> {
    let mut track0 = Vec::new();
    track0.extend_from_slice(&TEMPO_120);
    // 60 BPM after 480 ticks
    track0.extend_from_slice(&[0x83, 0x60, 0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40]);
    track0.extend_from_slice(&END_OF_TRACK);

    let mut track1 = Vec::new();
    note(&mut track1, 0, 0, 60, 960);
    track1.extend_from_slice(&END_OF_TRACK);

    smf(1, 480, &[track0, track1])
}

/// 3/4 at 120 BPM, two bars (3 seconds): piano, fingered bass, drums.
pub fn make_multi_instrument_midi() -> Vec<u8> {
    let mut track0 = Vec::new();
    track0.extend_from_slice(&TEMPO_120);
    track0.extend_from_slice(&[0x00, 0xFF, 0x58, 0x04, 0x03, 0x02, 0x18, 0x08]);
    track0.extend_from_slice(&[0x00, 0xFF, 0x05, 0x02, b'l', b'a']);
    track0.extend_from_slice(&END_OF_TRACK);

    let mut piano = Vec::new();
    track_name(&mut piano, "Piano");
    piano.extend_from_slice(&[0x00, 0xC0, 0x00]);
    for pitch in [60, 62, 64, 65, 67, 69] {
        note(&mut piano, 0, 0, pitch, 480);
    }
    piano.extend_from_slice(&END_OF_TRACK);

    let mut bass = Vec::new();
    track_name(&mut bass, "Bass/Low");
    bass.extend_from_slice(&[0x00, 0xC1, 33]);
    note(&mut bass, 0, 1, 40, 1440);
    note(&mut bass, 0, 1, 43, 1440);
    bass.extend_from_slice(&END_OF_TRACK);

    let mut drums = Vec::new();
    track_name(&mut drums, "Drums");
    for i in 0..6 {
        note(&mut drums, if i == 0 { 0 } else { 240 }, 9, 36, 240);
    }
    drums.extend_from_slice(&END_OF_TRACK);

    smf(1, 480, &[track0, piano, bass, drums])
}
