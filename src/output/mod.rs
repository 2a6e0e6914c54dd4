mod active_notes;
mod dispatch;
mod midi_port;

pub use active_notes::{ActiveNotes, CHANNELS};
pub use dispatch::{Dispatcher, shape_velocity};
pub use midi_port::MidiPort;

use crate::error::OutputError;

/// Destination for timestamped wire messages.
///
/// Timestamps are absolute milliseconds on the player's clock and may lie
/// slightly in the future; queuing until then is the sink's business.
pub trait MidiOutput: Send {
    fn send(&mut self, message: &[u8], timestamp: f64) -> Result<(), OutputError>;
}

impl<F> MidiOutput for F
where
    F: FnMut(&[u8], f64) -> Result<(), OutputError> + Send,
{
    fn send(&mut self, message: &[u8], timestamp: f64) -> Result<(), OutputError> {
        self(message, timestamp)
    }
}

/// Side channel fired after every successful send.
pub type Observer = Box<dyn FnMut(&[u8], f64) + Send>;
