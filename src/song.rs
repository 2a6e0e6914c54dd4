use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::PlayerConfig;
use crate::error::SongError;
use crate::events::MidiEvent;
use crate::timing::Sequence;

/// A flattened event list plus the player settings it should be played
/// with, stored as RON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub name: String,
    #[serde(default)]
    pub player: PlayerConfig,
    pub events: Vec<MidiEvent>,
}

impl Song {
    pub fn save(&self, path: &Path) -> Result<(), SongError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SongError> {
        let ron_string = fs::read_to_string(path)?;
        let song: Song = ron::from_str(&ron_string)?;
        Ok(song)
    }

    /// Events sorted by play time, ready for a player.
    pub fn sequence(&self) -> Sequence {
        Sequence::from_unordered(self.events.clone())
    }
}
