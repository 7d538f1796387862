use gridloop_shared::{dest_to_mask, with_channel, CC_ALL_NOTES_OFF, MIDI_CC, MIDI_NOTE_OFF};

use crate::config::MAX_DELAYED_NOTES;
use crate::engine::Engine;
use crate::params::TrackParams;

/// Host MIDI output function. The engine calls this from the audio path, so
/// implementations must not block or allocate.
pub trait MidiSender {
    fn send_midi(&mut self, destination: u32, status: u8, data1: u8, data2: u8);
}

/// Capturing sink for tests and the headless binary.
#[derive(Debug, Default)]
pub struct MidiLog {
    pub messages: Vec<(u32, u8, u8, u8)>,
}

impl MidiLog {
    pub fn new() -> Self {
        Self { messages: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl MidiSender for MidiLog {
    fn send_midi(&mut self, destination: u32, status: u8, data1: u8, data2: u8) {
        self.messages.push((destination, status, data1, data2));
    }
}

impl Engine {
    /// True when another track currently sounds the same note on the same
    /// channel and destination. Used to avoid orphaning a note another track
    /// still owns.
    pub(crate) fn note_shared_by_other_track(
        &self,
        track: usize,
        note: usize,
        out_ch: u8,
        destination: u32,
    ) -> bool {
        self.tracks.iter().enumerate().any(|(t, ts)| {
            t != track
                && ts.playing[note].active
                && ts.playing[note].out_ch == out_ch
                && ts.playing[note].destination == destination
        })
    }

    /// Release every note the track is sounding and cancel its pending
    /// delayed notes. The off goes to the channel/destination captured at
    /// note-on; it is suppressed when another track still claims the note on
    /// the same output.
    pub(crate) fn send_track_notes_off(&mut self, track: usize, out: &mut dyn MidiSender) {
        for n in 0..128 {
            let pn = self.tracks[track].playing[n];
            if pn.active && !self.note_shared_by_other_track(track, n, pn.out_ch, pn.destination) {
                out.send_midi(
                    pn.destination,
                    with_channel(MIDI_NOTE_OFF, pn.out_ch as i32),
                    n as u8,
                    0,
                );
            }
            self.tracks[track].playing[n].active = false;
            self.tracks[track].playing[n].remaining = 0;
            self.tracks[track].active_notes[n] = 0;
        }
        self.tracks[track].active_vel = 0;

        for i in 0..MAX_DELAYED_NOTES {
            if self.delayed[i].active && self.delayed[i].track as usize == track {
                self.delayed[i].active = false;
            }
        }
    }

    /// Broadcast All Notes Off: one CC-123 per unique output channel and
    /// destination actually in use.
    pub(crate) fn send_all_notes_off(&mut self, out: &mut dyn MidiSender) {
        for t in 0..self.num_tracks {
            let tp = TrackParams::new(&self.params, t);
            let ch = tp.channel();
            let dest = dest_to_mask(tp.destination());
            let already_sent = (0..t).any(|u| {
                let up = TrackParams::new(&self.params, u);
                up.channel() == ch && dest_to_mask(up.destination()) == dest
            });
            if !already_sent {
                out.send_midi(dest, with_channel(MIDI_CC, ch), CC_ALL_NOTES_OFF, 0);
            }
        }
    }
}
