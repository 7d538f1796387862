pub mod conditions;
pub mod config;
pub mod directions;
pub mod engine;
pub mod generate;
pub mod midi;
pub mod modifiers;
pub mod params;
pub mod persist;
pub mod playback;
pub mod quantize;
pub mod record;
pub mod rng;
pub mod track;
pub mod transport;

mod tests_persist;
mod tests_playback;

pub use engine::Engine;
pub use midi::{MidiLog, MidiSender};
