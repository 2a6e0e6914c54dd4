use serde::{Deserialize, Serialize};

use crate::events::MidiEvent;

/// Flattened, time-ordered events for one playback session. Never mutated
/// once handed to a player; the next load replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence {
    events: Vec<MidiEvent>,
}

impl Sequence {
    /// Takes the events in the order given. Producers are expected to have
    /// merged tracks already; out-of-order input is logged but kept as is.
    pub fn new(events: Vec<MidiEvent>) -> Self {
        let sequence = Self { events };
        if !sequence.is_ordered() {
            tracing::warn!(
                len = sequence.len(),
                "sequence is not sorted by play time; events will be sent in given order"
            );
        }
        sequence
    }

    /// Stable-sorts by play time, so simultaneous events keep their
    /// relative order.
    pub fn from_unordered(mut events: Vec<MidiEvent>) -> Self {
        events.sort_by(|a, b| a.play_time.total_cmp(&b.play_time));
        Self { events }
    }

    pub fn get(&self, index: usize) -> Option<&MidiEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Play time of the last event, in ms.
    pub fn duration_ms(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.play_time)
    }

    pub fn is_ordered(&self) -> bool {
        self.events
            .windows(2)
            .all(|pair| pair[0].play_time <= pair[1].play_time)
    }
}

impl FromIterator<MidiEvent> for Sequence {
    fn from_iter<I: IntoIterator<Item = MidiEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_unordered_is_stable() {
        let sequence = Sequence::from_unordered(vec![
            MidiEvent::note_on(200.0, 0, 62, 90),
            MidiEvent::note_on(100.0, 0, 60, 90),
            MidiEvent::note_on(100.0, 0, 64, 90),
            MidiEvent::note_off(0.0, 0, 59),
        ]);

        let notes: Vec<u8> = sequence.events().iter().map(|e| e.param1).collect();
        assert_eq!(notes, vec![59, 60, 64, 62]);
        assert!(sequence.is_ordered());
        assert_eq!(sequence.duration_ms(), 200.0);
    }

    #[test]
    fn new_keeps_given_order() {
        let sequence = Sequence::new(vec![
            MidiEvent::note_on(50.0, 0, 60, 90),
            MidiEvent::note_off(10.0, 0, 60),
        ]);
        assert!(!sequence.is_ordered());
        assert_eq!(sequence.get(0).map(|e| e.play_time), Some(50.0));
    }

    #[test]
    fn empty_sequence() {
        let sequence = Sequence::default();
        assert!(sequence.is_empty());
        assert_eq!(sequence.duration_ms(), 0.0);
        assert!(sequence.get(0).is_none());
    }
}
