// MIDI output from the quantized series.
//
// One note event per retained year, laid back to back at one event per
// beat, serialized as a single-track Standard MIDI File (SMF format 0).

use std::path::Path;

use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use thiserror::Error;

use crate::config::AppConfig;
use crate::scale::Keyboard;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

#[derive(Error, Debug)]
pub enum MidiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One note of the rendered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// Offset from the start of the track, in beats.
    pub beat: u32,
    /// MIDI note number.
    pub note: u8,
    /// Velocity, 0-127.
    pub velocity: u8,
    /// Duration in beats.
    pub duration_beats: u32,
}

/// Build the note sequence for a quantized series: beat = position in
/// the series, note = key index mapped through the keyboard's MIDI base,
/// velocity and duration from config.
pub fn sequence(indices: &[usize], keyboard: &Keyboard, config: &AppConfig) -> Vec<NoteEvent> {
    indices
        .iter()
        .enumerate()
        .map(|(i, &idx)| NoteEvent {
            beat: i as u32,
            note: keyboard.midi_note(idx),
            velocity: config.velocity.min(127),
            duration_beats: config.duration_beats.max(1),
        })
        .collect()
}

/// Serialize note events to a single-track SMF at `path`.
///
/// An empty sequence still writes a structurally valid file containing
/// only the tempo and end-of-track events.
pub fn write_midi(events: &[NoteEvent], tempo_bpm: u32, path: &Path) -> Result<(), MidiError> {
    let smf = events_to_smf(events, tempo_bpm);
    smf.save(path)?;
    log::info!("Wrote {} ({} notes)", path.display(), events.len());
    Ok(())
}

/// Convert note events to an in-memory SMF.
fn events_to_smf(events: &[NoteEvent], tempo_bpm: u32) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let mut track: Track<'static> = Vec::new();
    let tempo_microseconds = 60_000_000 / tempo_bpm.max(1);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });

    let channel = u4::new(0);
    let ticks_per_beat = TICKS_PER_QUARTER as u32;
    let mut last_event_tick: u32 = 0;

    for event in events {
        // Events are laid back to back; one starting before the previous
        // note ended is pushed to follow it.
        let on_tick = (event.beat * ticks_per_beat).max(last_event_tick);
        let off_tick = on_tick + event.duration_beats * ticks_per_beat;

        track.push(TrackEvent {
            delta: u28::new(on_tick - last_event_tick),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(event.note),
                    vel: u7::new(event.velocity),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(off_tick - on_tick),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(event.note),
                    vel: u7::new(0),
                },
            },
        });
        last_event_tick = off_tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);
    smf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::KeyboardLayout;

    fn test_config() -> AppConfig {
        AppConfig::default()
    }

    #[test]
    fn test_sequence_beats_and_constants() {
        let kb = Keyboard::new(KeyboardLayout::Grand88, 2.0);
        let events = sequence(&[0, 43, 87], &kb, &test_config());

        assert_eq!(events.len(), 3);
        for (i, e) in events.iter().enumerate() {
            assert_eq!(e.beat, i as u32);
            assert_eq!(e.velocity, 127);
            assert_eq!(e.duration_beats, 1);
        }
        // Key index offset by the layout's lowest MIDI note (A0 = 21).
        assert_eq!(events[0].note, 21);
        assert_eq!(events[1].note, 64);
        assert_eq!(events[2].note, 108);
    }

    #[test]
    fn test_sequence_empty() {
        let kb = Keyboard::new(KeyboardLayout::Grand88, 2.0);
        assert!(sequence(&[], &kb, &test_config()).is_empty());
    }

    #[test]
    fn test_smf_structure() {
        let events = vec![
            NoteEvent {
                beat: 0,
                note: 60,
                velocity: 127,
                duration_beats: 1,
            },
            NoteEvent {
                beat: 1,
                note: 64,
                velocity: 127,
                duration_beats: 1,
            },
        ];
        let smf = events_to_smf(&events, 120);

        assert_eq!(smf.tracks.len(), 1);
        let track = &smf.tracks[0];
        // tempo + 2 on/off pairs + end of track
        assert_eq!(track.len(), 6);

        assert_eq!(
            track[0].kind,
            TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(500_000)))
        );
        assert_eq!(
            track.last().unwrap().kind,
            TrackEventKind::Meta(midly::MetaMessage::EndOfTrack)
        );

        // Back-to-back notes: on at delta 0, off one beat later, next on
        // immediately.
        assert_eq!(track[1].delta, u28::new(0));
        assert_eq!(track[2].delta, u28::new(480));
        assert_eq!(track[3].delta, u28::new(0));
        assert_eq!(track[4].delta, u28::new(480));
    }

    #[test]
    fn test_empty_sequence_writes_valid_track() {
        let smf = events_to_smf(&[], 120);
        assert_eq!(smf.tracks.len(), 1);
        // tempo + end of track only
        assert_eq!(smf.tracks[0].len(), 2);
    }

    #[test]
    fn test_longer_durations_push_following_notes() {
        let events = vec![
            NoteEvent {
                beat: 0,
                note: 60,
                velocity: 100,
                duration_beats: 2,
            },
            NoteEvent {
                beat: 1,
                note: 62,
                velocity: 100,
                duration_beats: 1,
            },
        ];
        let smf = events_to_smf(&events, 120);
        let track = &smf.tracks[0];
        // Second note starts when the first ends, not at its nominal beat.
        assert_eq!(track[2].delta, u28::new(960));
        assert_eq!(track[3].delta, u28::new(0));
    }
}
