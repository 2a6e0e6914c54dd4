pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod output;
pub mod song;
pub mod timing;

pub use config::PlayerConfig;
pub use engine::{EngineCommand, EngineHandle, EngineUpdate, spawn_engine};
pub use error::{EngineError, OutputError, PlayerError, SongError};
pub use events::{EventKind, MidiEvent};
pub use output::{ActiveNotes, MidiOutput, MidiPort};
pub use song::Song;
pub use timing::{PlaybackState, Player, Runtime, Sequence, SystemRuntime, VirtualRuntime};
