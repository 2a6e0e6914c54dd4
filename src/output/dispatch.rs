use super::{ActiveNotes, MidiOutput, Observer};
use crate::error::PlayerError;
use crate::events::{EventKind, MidiEvent};

/// Scales a note-on velocity by a 0..=100 volume. A volume of zero is
/// treated as one so that notes still sound, very quietly.
pub fn shape_velocity(velocity: u8, volume: u8) -> u8 {
    let volume = u32::from(volume.max(1));
    (u32::from(velocity) * volume / 100).min(u8::MAX as u32) as u8
}

/// Turns events into wire messages and keeps the active note bookkeeping
/// in step with what has been sent.
pub struct Dispatcher {
    output: Option<Box<dyn MidiOutput>>,
    observer: Option<Observer>,
    notes: ActiveNotes,
    volume: u8,
}

impl Dispatcher {
    pub fn new(volume: u8) -> Self {
        Self {
            output: None,
            observer: None,
            notes: ActiveNotes::new(),
            volume,
        }
    }

    pub fn set_output(&mut self, output: Box<dyn MidiOutput>) {
        self.output = Some(output);
    }

    pub fn set_observer(&mut self, observer: Option<Observer>) {
        self.observer = observer;
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    pub fn notes(&self) -> &ActiveNotes {
        &self.notes
    }

    pub fn dispatch(&mut self, event: &MidiEvent, timestamp: f64) -> Result<(), PlayerError> {
        let output = self.output.as_mut().ok_or(PlayerError::NoOutput)?;

        let velocity = match event.kind {
            EventKind::NoteOn => {
                self.notes.note_on(event.channel, event.param1);
                shape_velocity(event.param2.unwrap_or(0), self.volume)
            }
            EventKind::NoteOff => {
                self.notes.note_off(event.channel, event.param1);
                event.param2.unwrap_or(0)
            }
            _ => event.param2.unwrap_or(0),
        };

        let status = event.status();
        let message = [status, event.param1, velocity];
        let message = &message[..1 + event.kind.data_len()];

        tracing::debug!(?message, timestamp, "send");
        output.send(message, timestamp)?;
        if let Some(observer) = self.observer.as_mut() {
            observer(message, timestamp);
        }
        Ok(())
    }

    /// Releases every sounding note at `timestamp`, reporting each note-off
    /// to the observer like any other send. Without an output there is
    /// nothing sounding, but the tracker is still cleared.
    pub fn release_all(&mut self, timestamp: f64) -> usize {
        let observer = &mut self.observer;
        let notify = |message: &[u8], timestamp: f64| {
            if let Some(observer) = observer.as_mut() {
                observer(message, timestamp);
            }
        };
        let sent = match self.output.as_mut() {
            Some(output) => self.notes.flush(timestamp, output.as_mut(), notify),
            None => 0,
        };
        self.notes.clear();
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutputError;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(Vec<u8>, f64)>>>;

    fn dispatcher(volume: u8) -> (Dispatcher, Log) {
        let log: Log = Arc::default();
        let sink_log = log.clone();
        let mut dispatcher = Dispatcher::new(volume);
        dispatcher.set_output(Box::new(move |message: &[u8], timestamp: f64| {
            sink_log.lock().unwrap().push((message.to_vec(), timestamp));
            Ok::<(), OutputError>(())
        }));
        (dispatcher, log)
    }

    #[test]
    fn velocity_shaping() {
        assert_eq!(shape_velocity(100, 50), 50);
        assert_eq!(shape_velocity(100, 100), 100);
        assert_eq!(shape_velocity(127, 33), 41);
        assert_eq!(shape_velocity(100, 0), 1);
    }

    #[test]
    fn note_on_is_scaled_and_tracked() {
        let (mut dispatcher, log) = dispatcher(50);
        dispatcher
            .dispatch(&MidiEvent::note_on(0.0, 0, 60, 100), 1000.0)
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec![(vec![0x90, 60, 50], 1000.0)]);
        assert_eq!(dispatcher.notes().notes(0), &[60]);
    }

    #[test]
    fn note_off_velocity_is_not_scaled() {
        let (mut dispatcher, log) = dispatcher(10);
        let mut off = MidiEvent::note_off(0.0, 1, 60);
        off.param2 = Some(90);
        dispatcher.dispatch(&off, 5.0).unwrap();

        assert_eq!(log.lock().unwrap()[0].0, vec![0x81, 60, 90]);
    }

    #[test]
    fn single_parameter_messages_are_two_bytes() {
        let (mut dispatcher, log) = dispatcher(100);
        dispatcher
            .dispatch(&MidiEvent::program_change(0.0, 9, 12), 0.0)
            .unwrap();

        assert_eq!(log.lock().unwrap()[0].0, vec![0xC9, 12]);
    }

    #[test]
    fn observer_sees_every_send() {
        let (mut dispatcher, _log) = dispatcher(100);
        let seen: Log = Arc::default();
        let observer_log = seen.clone();
        dispatcher.set_observer(Some(Box::new(move |message: &[u8], timestamp: f64| {
            observer_log.lock().unwrap().push((message.to_vec(), timestamp));
        })));

        dispatcher
            .dispatch(&MidiEvent::note_on(0.0, 0, 64, 80), 42.0)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(vec![0x90, 64, 80], 42.0)]);
    }

    #[test]
    fn observer_sees_released_notes() {
        let (mut dispatcher, log) = dispatcher(100);
        let seen: Log = Arc::default();
        let observer_log = seen.clone();
        dispatcher.set_observer(Some(Box::new(move |message: &[u8], timestamp: f64| {
            observer_log.lock().unwrap().push((message.to_vec(), timestamp));
        })));

        dispatcher
            .dispatch(&MidiEvent::note_on(0.0, 2, 64, 100), 0.0)
            .unwrap();
        assert_eq!(dispatcher.release_all(300.0), 1);

        assert_eq!(seen.lock().unwrap().last(), Some(&(vec![0x82, 64, 0], 300.0)));
        assert_eq!(*seen.lock().unwrap(), *log.lock().unwrap());
        assert!(dispatcher.notes().is_empty());
    }

    #[test]
    fn missing_output_is_an_error() {
        let mut dispatcher = Dispatcher::new(100);
        let result = dispatcher.dispatch(&MidiEvent::note_on(0.0, 0, 60, 100), 0.0);

        assert!(matches!(result, Err(PlayerError::NoOutput)));
        assert!(dispatcher.notes().is_empty());
    }
}
