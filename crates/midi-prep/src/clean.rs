//! Meta-event stripping and per-track splitting of raw SMF bytes.

use midly::num::u28;
use midly::{Format, Header, MetaMessage, Smf, Track, TrackEvent, TrackEventKind};

use crate::{Error, Result};

/// One track lifted out of a multi-track file.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTrack {
    pub index: usize,
    /// Track name meta event, empty when the track has none.
    pub name: String,
    /// A complete single-track SMF.
    pub bytes: Vec<u8>,
}

impl SplitTrack {
    pub fn file_name(&self) -> String {
        split_file_name(self.index, &self.name)
    }
}

fn is_change_event(kind: &TrackEventKind) -> bool {
    matches!(
        kind,
        TrackEventKind::Meta(
            MetaMessage::KeySignature(..) | MetaMessage::TimeSignature(..) | MetaMessage::Tempo(_)
        )
    )
}

/// Largest delta a track event can hold (u28).
const MAX_DELTA: u32 = 0x0FFF_FFFF;

fn encode(smf: &Smf) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    smf.write_std(&mut buf)
        .map_err(|e| Error::MidiWrite(e.to_string()))?;
    Ok(buf)
}

/// Remove key signature, time signature and tempo events from every track.
///
/// The delta of a removed event is carried into the next kept event, so
/// every remaining event keeps its absolute tick. A carried delta too large
/// for one event is spread over empty marker events placed before it.
pub fn strip_changes(midi_bytes: &[u8]) -> Result<Vec<u8>> {
    let smf = Smf::parse(midi_bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let mut removed = 0usize;
    let tracks: Vec<Track> = smf
        .tracks
        .iter()
        .map(|track| {
            let mut kept = Vec::with_capacity(track.len());
            let mut carry: u64 = 0;
            for event in track {
                let mut delta = carry.saturating_add(u64::from(event.delta.as_int()));
                if is_change_event(&event.kind) {
                    carry = delta;
                    removed += 1;
                    continue;
                }
                while delta > u64::from(MAX_DELTA) {
                    kept.push(TrackEvent {
                        delta: u28::new(MAX_DELTA),
                        kind: TrackEventKind::Meta(MetaMessage::Marker(&[])),
                    });
                    delta -= u64::from(MAX_DELTA);
                }
                kept.push(TrackEvent {
                    delta: u28::new(delta as u32),
                    kind: event.kind,
                });
                carry = 0;
            }
            kept
        })
        .collect();

    tracing::debug!(removed, tracks = tracks.len(), "stripped change events");

    let cleaned = Smf {
        header: smf.header,
        tracks,
    };
    encode(&cleaned)
}

fn track_name(track: &[TrackEvent]) -> String {
    track
        .iter()
        .find_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                Some(String::from_utf8_lossy(bytes).trim().to_string())
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// One single-track SMF per source track, keeping the source timing resolution.
pub fn split_tracks(midi_bytes: &[u8]) -> Result<Vec<SplitTrack>> {
    let smf = Smf::parse(midi_bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    smf.tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let name = track_name(track);
            tracing::info!("Track {}: {}", index, name);

            let single = Smf {
                header: Header::new(Format::SingleTrack, smf.header.timing),
                tracks: vec![track.clone()],
            };
            Ok(SplitTrack {
                index,
                name,
                bytes: encode(&single)?,
            })
        })
        .collect()
}

/// `track{index}_{name}.mid`, with path separators and other unsafe
/// characters in the name replaced by `_`.
pub fn split_file_name(index: usize, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("track{index}_{}.mid", safe.trim())
}
