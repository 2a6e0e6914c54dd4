use super::Sequence;
use super::runtime::{Runtime, Task, TaskHandle, VirtualRuntime};
use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::output::{ActiveNotes, Dispatcher, MidiOutput, Observer};

/// Called once when the last event of a sequence has been sent and the
/// lookahead has drained.
pub type OnEnd = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Lookahead scheduler walking a [`Sequence`] against a [`Runtime`] clock.
///
/// Each tick sends every event due within the lookahead window, stamped with
/// its absolute time, then schedules the next tick a little before the
/// window runs out.
pub struct Player<R: Runtime> {
    runtime: R,
    config: PlayerConfig,
    sequence: Sequence,
    dispatcher: Dispatcher,
    position: usize,
    start_time: f64,
    pause_time: Option<f64>,
    pending_wake: Option<TaskHandle>,
    last_dispatch_time: f64,
    on_end: Option<OnEnd>,
    ending: Vec<(TaskHandle, OnEnd)>,
}

impl<R: Runtime> Player<R> {
    pub fn new(mut config: PlayerConfig, runtime: R) -> Self {
        config.volume = config.volume.min(100);
        let dispatcher = Dispatcher::new(config.volume);
        Self {
            runtime,
            config,
            sequence: Sequence::default(),
            dispatcher,
            position: 0,
            start_time: 0.0,
            pause_time: None,
            pending_wake: None,
            last_dispatch_time: 0.0,
            on_end: None,
            ending: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: impl MidiOutput + 'static) -> Self {
        self.set_output(Box::new(output));
        self
    }

    pub fn set_output(&mut self, output: Box<dyn MidiOutput>) {
        self.dispatcher.set_output(output);
    }

    pub fn set_observer(&mut self, observer: Option<Observer>) {
        self.dispatcher.set_observer(observer);
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.dispatcher.set_volume(volume);
        self.config.volume = self.dispatcher.volume();
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn active_notes(&self) -> &ActiveNotes {
        self.dispatcher.notes()
    }

    pub fn state(&self) -> PlaybackState {
        if self.pending_wake.is_some() {
            PlaybackState::Playing
        } else if self.pause_time.is_some() {
            PlaybackState::Paused
        } else {
            PlaybackState::Idle
        }
    }

    /// Replaces the sequence, stopping first if anything is in flight.
    pub fn load(&mut self, sequence: Sequence) {
        self.stop();
        tracing::info!(events = sequence.len(), "loaded sequence");
        self.sequence = sequence;
        self.position = 0;
    }

    /// Starts from the top. Returns `Ok(false)` unless idle with something
    /// to play.
    pub fn play(&mut self, on_end: impl FnOnce() + Send + 'static) -> Result<bool, PlayerError> {
        if self.position != 0 || self.pending_wake.is_some() || self.sequence.is_empty() {
            return Ok(false);
        }
        if !self.dispatcher.has_output() {
            return Err(PlayerError::NoOutput);
        }

        self.start_time = self.runtime.now();
        self.pause_time = None;
        self.on_end = Some(Box::new(on_end));
        self.pending_wake = Some(self.runtime.schedule(0.0, Task::Tick));
        tracing::info!(start = self.start_time, events = self.sequence.len(), "play");
        Ok(true)
    }

    /// Continues after [`pause`](Self::pause). Returns the play time of the
    /// next event to be sent, or `Ok(0.0)` if there is nothing to resume.
    pub fn resume(&mut self, on_end: impl FnOnce() + Send + 'static) -> Result<f64, PlayerError> {
        let Some(pause_time) = self.pause_time else {
            return Ok(0.0);
        };
        if self.pending_wake.is_some() {
            return Ok(0.0);
        }
        let Some(next) = self.sequence.get(self.position) else {
            return Ok(0.0);
        };
        let next_play_time = next.play_time;
        if !self.dispatcher.has_output() {
            return Err(PlayerError::NoOutput);
        }

        let now = self.runtime.now();
        self.start_time += now - pause_time;
        self.pause_time = None;
        self.on_end = Some(Box::new(on_end));
        self.pending_wake = Some(self.runtime.schedule(0.0, Task::Tick));
        tracing::info!(position = self.position, paused_ms = now - pause_time, "resume");
        Ok(next_play_time)
    }

    /// Halts a running sequence where it is and silences sounding notes.
    pub fn pause(&mut self) -> bool {
        let Some(handle) = self.pending_wake.take() else {
            return false;
        };
        self.runtime.cancel(handle);
        self.pause_time = Some(self.runtime.now());

        let released = self.release_notes();
        tracing::info!(position = self.position, released, "pause");
        true
    }

    /// Pauses and rewinds. Reports whether anything was playing, but always
    /// leaves the player idle at position 0 with no sounding notes.
    pub fn stop(&mut self) -> bool {
        let stopped = self.pause();
        if self.pause_time.is_some() || self.position != 0 {
            tracing::info!(position = self.position, "stop");
        }
        self.rewind();
        stopped
    }

    /// Stops playback and drops every outstanding task and callback.
    pub fn dispose(mut self) {
        self.stop();
        for (handle, _) in self.ending.drain(..) {
            self.runtime.cancel(handle);
        }
        self.on_end = None;
        tracing::debug!("player disposed");
    }

    /// Fires every task whose deadline has passed. Returns how many ran.
    pub fn run_due(&mut self) -> Result<usize, PlayerError> {
        let mut fired = 0;
        while let Some((handle, task)) = self.runtime.pop_due() {
            self.fire(handle, task)?;
            fired += 1;
        }
        Ok(fired)
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.runtime.next_deadline()
    }

    fn fire(&mut self, handle: TaskHandle, task: Task) -> Result<(), PlayerError> {
        match task {
            Task::Tick => {
                if self.pending_wake != Some(handle) {
                    return Ok(());
                }
                self.pending_wake = None;
                self.tick()
            }
            Task::End => {
                if let Some(idx) = self.ending.iter().position(|(h, _)| *h == handle) {
                    let (_, on_end) = self.ending.swap_remove(idx);
                    tracing::info!("sequence ended");
                    on_end();
                }
                Ok(())
            }
        }
    }

    fn tick(&mut self) -> Result<(), PlayerError> {
        if let Err(e) = self.send_due() {
            self.release_notes();
            self.rewind();
            return Err(e);
        }

        if self.position < self.sequence.len() {
            let delay = self.config.tick_interval_ms();
            self.pending_wake = Some(self.runtime.schedule(delay, Task::Tick));
        } else {
            // Notes the sequence never released must not outlive it.
            let released = self.release_notes();
            if released > 0 {
                tracing::debug!(released, "released dangling notes at end");
            }
            if let Some(on_end) = self.on_end.take() {
                let delay = self.config.lookahead_ms + self.config.end_margin_ms;
                let handle = self.runtime.schedule(delay, Task::End);
                self.ending.push((handle, on_end));
            }
            self.position = 0;
        }
        Ok(())
    }

    fn send_due(&mut self) -> Result<(), PlayerError> {
        let elapsed = self.runtime.now() - self.start_time;
        let throttled = self.runtime.is_throttled();
        let buffer_delay = self.config.buffer_delay_ms(throttled);

        let first = self.position;
        while let Some(event) = self.sequence.get(self.position) {
            if event.play_time - elapsed >= buffer_delay {
                break;
            }
            let timestamp = (event.play_time + self.start_time).floor();
            self.dispatcher.dispatch(event, timestamp)?;
            self.last_dispatch_time = timestamp;
            self.position += 1;
        }

        tracing::debug!(
            elapsed,
            buffer_delay,
            throttled,
            sent = self.position - first,
            "tick"
        );
        Ok(())
    }

    fn release_notes(&mut self) -> usize {
        let timestamp = self.last_dispatch_time + self.config.release_offset_ms;
        self.dispatcher.release_all(timestamp)
    }

    fn rewind(&mut self) {
        self.position = 0;
        self.pause_time = None;
    }
}

impl Player<VirtualRuntime> {
    /// Steps the virtual clock forward by `ms`, firing each task at its own
    /// deadline along the way.
    pub fn advance(&mut self, ms: f64) -> Result<usize, PlayerError> {
        let target = self.runtime.now() + ms;
        let mut fired = 0;
        while let Some(deadline) = self.runtime.next_deadline().filter(|d| *d <= target) {
            self.runtime.set_now(deadline);
            fired += self.run_due()?;
        }
        self.runtime.set_now(target);
        Ok(fired)
    }
}
