//! Hardware/virtual output through midir.
//!
//! midir sends immediately, so the port keeps its own delivery thread that
//! holds each message until its timestamp comes due on the shared clock.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use super::MidiOutput;
use crate::error::OutputError;

struct Pending {
    timestamp: f64,
    seq: u64,
    message: Vec<u8>,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // Reversed: BinaryHeap is a max-heap and we want the earliest first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .total_cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct MidiPort {
    name: String,
    tx: Option<Sender<(Vec<u8>, f64)>>,
    thread: Option<JoinHandle<()>>,
}

impl MidiPort {
    /// Connects to the first output port whose name contains `filter`, or
    /// the first port at all when `filter` is `None`. Timestamps are read
    /// as milliseconds since `epoch`.
    pub fn connect(filter: Option<&str>, epoch: Instant) -> Result<Self, OutputError> {
        let midi_out =
            midir::MidiOutput::new("cueline").map_err(|e| OutputError::Connect(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|p| match filter {
                Some(filter) => midi_out
                    .port_name(p)
                    .map(|name| name.contains(filter))
                    .unwrap_or(false),
                None => true,
            })
            .ok_or_else(|| OutputError::PortNotFound(filter.unwrap_or("*").to_string()))?;

        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "unknown".to_string());
        let mut connection = midi_out
            .connect(port, "cueline-out")
            .map_err(|e| OutputError::Connect(e.to_string()))?;

        tracing::info!(port = %name, "connected MIDI output");

        Ok(Self::with_delivery(name, epoch, move |message: &[u8]| {
            if let Err(e) = connection.send(message) {
                tracing::warn!("MIDI send failed: {e}");
            }
        }))
    }

    /// Starts the delivery thread around `deliver`, which is handed each
    /// message once its timestamp is due.
    fn with_delivery(
        name: String,
        epoch: Instant,
        deliver: impl FnMut(&[u8]) + Send + 'static,
    ) -> Self {
        let (tx, rx) = crossbeam::channel::unbounded();
        let thread = thread::spawn(move || delivery_thread(rx, epoch, deliver));
        Self {
            name,
            tx: Some(tx),
            thread: Some(thread),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MidiOutput for MidiPort {
    fn send(&mut self, message: &[u8], timestamp: f64) -> Result<(), OutputError> {
        self.tx
            .as_ref()
            .ok_or_else(|| OutputError::Send("port closed".to_string()))?
            .send((message.to_vec(), timestamp))
            .map_err(|_| OutputError::Send("delivery thread stopped".to_string()))
    }
}

impl Drop for MidiPort {
    /// Waits until every queued message, release note-offs included, has
    /// gone out.
    fn drop(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        tracing::debug!(port = %self.name, "MIDI output closed");
    }
}

fn due_at(epoch: Instant, timestamp: f64) -> Instant {
    epoch + Duration::from_secs_f64(timestamp.max(0.0) / 1000.0)
}

fn delivery_thread(
    rx: Receiver<(Vec<u8>, f64)>,
    epoch: Instant,
    mut deliver: impl FnMut(&[u8]),
) {
    let mut queue: BinaryHeap<Pending> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let received = match queue.peek() {
            Some(next) => rx.recv_deadline(due_at(epoch, next.timestamp)),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok((message, timestamp)) => {
                queue.push(Pending {
                    timestamp,
                    seq,
                    message,
                });
                seq += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = epoch.elapsed().as_secs_f64() * 1000.0;
        while queue.peek().is_some_and(|p| p.timestamp <= now) {
            if let Some(pending) = queue.pop() {
                deliver(&pending.message);
            }
        }
    }

    // Sender dropped: the rest still goes out at its own time.
    while let Some(pending) = queue.pop() {
        let due = due_at(epoch, pending.timestamp);
        if let Some(wait) = due.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
        deliver(&pending.message);
    }
}
