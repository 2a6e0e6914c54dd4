use super::MidiOutput;
use crate::events::release_status;

pub const CHANNELS: usize = 16;

/// Notes that received a note-on and no matching note-off yet, per channel.
///
/// Duplicates are kept: a key struck twice before its release is processed
/// needs two note-offs.
#[derive(Debug, Default, Clone)]
pub struct ActiveNotes {
    channels: [Vec<u8>; CHANNELS],
}

impl ActiveNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_on(&mut self, channel: u8, note: u8) {
        if let Some(notes) = self.channels.get_mut(channel as usize) {
            notes.push(note);
        }
    }

    /// Removes the first matching entry only. Unknown notes are ignored.
    pub fn note_off(&mut self, channel: u8, note: u8) {
        if let Some(notes) = self.channels.get_mut(channel as usize) {
            if let Some(idx) = notes.iter().position(|&n| n == note) {
                notes.remove(idx);
            }
        }
    }

    pub fn notes(&self, channel: u8) -> &[u8] {
        self.channels
            .get(channel as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }

    /// Sends a zero-velocity note-off for every tracked note, most recent
    /// first within each channel, then forgets them all.
    ///
    /// `on_sent` runs after every message the sink accepts. A failing send
    /// does not stop the flush; the tracker is always empty afterwards.
    /// Returns the number of messages the sink accepted.
    pub fn flush(
        &mut self,
        timestamp: f64,
        sink: &mut dyn MidiOutput,
        mut on_sent: impl FnMut(&[u8], f64),
    ) -> usize {
        let mut sent = 0;
        for (channel, notes) in self.channels.iter_mut().enumerate() {
            for &note in notes.iter().rev() {
                let message = [release_status(channel as u8), note, 0];
                match sink.send(&message, timestamp) {
                    Ok(()) => {
                        on_sent(&message, timestamp);
                        sent += 1;
                    }
                    Err(e) => tracing::warn!(channel, note, "note-off during flush failed: {e}"),
                }
            }
            notes.clear();
        }
        sent
    }

    pub fn clear(&mut self) {
        for notes in &mut self.channels {
            notes.clear();
        }
    }
}
