use serde::{Deserialize, Serialize};

/// Channel message kinds, as carried in the high nibble of the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    NoteOff,
    NoteOn,
    NoteAftertouch,
    Controller,
    ProgramChange,
    ChannelAftertouch,
    PitchBend,
}

impl EventKind {
    pub fn nibble(self) -> u8 {
        match self {
            EventKind::NoteOff => 0x8,
            EventKind::NoteOn => 0x9,
            EventKind::NoteAftertouch => 0xA,
            EventKind::Controller => 0xB,
            EventKind::ProgramChange => 0xC,
            EventKind::ChannelAftertouch => 0xD,
            EventKind::PitchBend => 0xE,
        }
    }

    /// Program change and channel pressure carry one data byte, everything
    /// else carries two.
    pub fn data_len(self) -> usize {
        match self {
            EventKind::ProgramChange | EventKind::ChannelAftertouch => 1,
            _ => 2,
        }
    }
}

/// A decoded, already-flattened channel event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiEvent {
    /// Milliseconds from the start of the sequence.
    pub play_time: f64,
    pub kind: EventKind,
    pub channel: u8,
    pub param1: u8,
    #[serde(default)]
    pub param2: Option<u8>,
}

impl MidiEvent {
    pub fn note_on(play_time: f64, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            play_time,
            kind: EventKind::NoteOn,
            channel,
            param1: note,
            param2: Some(velocity),
        }
    }

    pub fn note_off(play_time: f64, channel: u8, note: u8) -> Self {
        Self {
            play_time,
            kind: EventKind::NoteOff,
            channel,
            param1: note,
            param2: Some(0),
        }
    }

    pub fn program_change(play_time: f64, channel: u8, program: u8) -> Self {
        Self {
            play_time,
            kind: EventKind::ProgramChange,
            channel,
            param1: program,
            param2: None,
        }
    }

    /// Status byte. The channel is not masked; range checking is the
    /// producer's job.
    pub fn status(&self) -> u8 {
        (self.kind.nibble() << 4) | self.channel
    }
}

/// Status byte of the note-off used to silence a tracked note.
pub fn release_status(channel: u8) -> u8 {
    (EventKind::NoteOff.nibble() << 4) | channel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_combines_kind_and_channel() {
        assert_eq!(MidiEvent::note_on(0.0, 0, 60, 100).status(), 0x90);
        assert_eq!(MidiEvent::note_off(0.0, 3, 60).status(), 0x83);
        assert_eq!(MidiEvent::program_change(0.0, 15, 4).status(), 0xCF);
        assert_eq!(release_status(2), 0x82);
    }

    #[test]
    fn single_parameter_kinds() {
        assert_eq!(EventKind::ProgramChange.data_len(), 1);
        assert_eq!(EventKind::ChannelAftertouch.data_len(), 1);
        assert_eq!(EventKind::Controller.data_len(), 2);
        assert_eq!(EventKind::PitchBend.data_len(), 2);
    }

    #[test]
    fn missing_param2_deserializes_as_none() {
        let event: MidiEvent =
            ron::from_str("(play_time: 10.0, kind: ProgramChange, channel: 1, param1: 7)")
                .unwrap();
        assert_eq!(event.param2, None);
        assert_eq!(event.kind, EventKind::ProgramChange);
    }
}
