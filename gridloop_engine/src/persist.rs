use anyhow::Context;

use gridloop_shared::project::{NoteEvent, ProjectData, TrackSnapshot, PROJECT_VERSION};

use crate::config::{MAX_STEPS, MAX_TRACKS};
use crate::engine::Engine;

impl Engine {
    /// Snapshot the persisted state into the save model.
    pub fn save_project(&self) -> ProjectData {
        let tracks = self
            .tracks
            .iter()
            .map(|ts| {
                let events: Vec<Vec<NoteEvent>> = ts
                    .data
                    .steps
                    .iter()
                    .map(|step| step.iter().copied().collect())
                    .collect();
                TrackSnapshot {
                    events,
                    shuffle_order: ts.shuffle_order.to_vec(),
                    shuffle_pos: ts.shuffle_pos,
                    brownian_pos: ts.brownian_pos,
                }
            })
            .collect();

        ProjectData {
            version: PROJECT_VERSION,
            num_tracks: self.num_tracks as u32,
            tracks,
        }
    }

    /// Apply a parsed save. Out-of-range events are skipped; stateful
    /// direction positions clamp back into legal range. A track-count
    /// mismatch loads `min(saved, allocated)` tracks and skips the rest.
    pub fn load_project(&mut self, proj: &ProjectData) {
        let count = (proj.num_tracks as usize)
            .min(proj.tracks.len())
            .min(self.num_tracks);

        for (t, snap) in proj.tracks.iter().take(count).enumerate() {
            let ts = &mut self.tracks[t];
            ts.data.clear();

            for (s, step_events) in snap.events.iter().take(MAX_STEPS).enumerate() {
                for ev in step_events {
                    if ev.is_valid() {
                        ts.data.steps[s].add(ev.note, ev.velocity, ev.duration);
                    }
                }
            }

            for (s, &val) in snap.shuffle_order.iter().take(MAX_STEPS).enumerate() {
                ts.shuffle_order[s] = val.clamp(1, MAX_STEPS as u8);
            }
            ts.shuffle_pos = snap.shuffle_pos.clamp(1, MAX_STEPS as u8 + 1);
            ts.brownian_pos = snap.brownian_pos.clamp(1, MAX_STEPS as u8);
            ts.cache.invalidate();
        }
    }

    pub fn save_to_string(&self) -> Result<String, anyhow::Error> {
        serde_json::to_string(&self.save_project()).context("serializing project")
    }

    /// Parse first, then apply: a malformed save leaves the engine as it was.
    pub fn load_from_str(&mut self, json: &str) -> Result<(), anyhow::Error> {
        let proj: ProjectData = serde_json::from_str(json).context("parsing project")?;
        if proj.tracks.len() > MAX_TRACKS {
            eprintln!(
                "[Engine] Save contains {} tracks, loading first {}",
                proj.tracks.len(),
                self.num_tracks
            );
        }
        self.load_project(&proj);
        Ok(())
    }
}
