use crate::config::PlayerConfig;
use crate::error::EngineError;
use crate::output::MidiOutput;
use crate::timing::{PlaybackState, Player, Runtime, Sequence, SystemRuntime};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;

#[derive(Debug, Clone)]
pub enum EngineCommand {
    Load(Sequence),
    Play,
    Pause,
    Resume,
    Stop,
    SetVolume(u8),
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum EngineUpdate {
    PlaybackState { state: PlaybackState, position: usize },
    Resumed { next_play_time: f64 },
    Sent { message: Vec<u8>, timestamp: f64 },
    Ended,
    Error { message: String },
}

/// Owner side of a player running on its own thread.
pub struct EngineHandle {
    pub command_tx: Sender<EngineCommand>,
    pub update_rx: Receiver<EngineUpdate>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.command_tx
            .send(command)
            .map_err(|_| EngineError::Disconnected)
    }

    /// Stops playback, disposes the player and joins the thread.
    pub fn shutdown(mut self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn spawn_engine(
    config: PlayerConfig,
    runtime: SystemRuntime,
    output: Box<dyn MidiOutput>,
) -> EngineHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    let thread = std::thread::spawn(move || {
        let mut player = Player::new(config, runtime);
        player.set_output(output);
        let sent_tx = update_tx.clone();
        player.set_observer(Some(Box::new(move |message: &[u8], timestamp: f64| {
            let _ = sent_tx.send(EngineUpdate::Sent {
                message: message.to_vec(),
                timestamp,
            });
        })));
        engine_thread(player, command_rx, update_tx);
    });

    EngineHandle {
        command_tx,
        update_rx,
        thread: Some(thread),
    }
}

enum Flow {
    Continue,
    Exit,
}

fn engine_thread(
    mut player: Player<SystemRuntime>,
    command_rx: Receiver<EngineCommand>,
    update_tx: Sender<EngineUpdate>,
) {
    loop {
        let received = match player.next_deadline() {
            Some(deadline) => command_rx.recv_deadline(player.runtime().instant_at(deadline)),
            None => command_rx
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(command) => {
                if let Flow::Exit = handle_command(&mut player, command, &update_tx) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Err(e) = player.run_due() {
            tracing::error!("playback failed: {e}");
            let _ = update_tx.send(EngineUpdate::Error {
                message: e.to_string(),
            });
            report_state(&player, &update_tx);
        }
    }

    player.dispose();
    tracing::debug!("engine thread exiting");
}

fn handle_command(
    player: &mut Player<SystemRuntime>,
    command: EngineCommand,
    update_tx: &Sender<EngineUpdate>,
) -> Flow {
    let ended_tx = update_tx.clone();
    let on_end = move || {
        let _ = ended_tx.send(EngineUpdate::Ended);
    };

    match command {
        EngineCommand::Load(sequence) => {
            player.load(sequence);
            report_state(player, update_tx);
        }
        EngineCommand::Play => match player.play(on_end) {
            Ok(true) => report_state(player, update_tx),
            Ok(false) => tracing::debug!(position = player.position(), "play ignored"),
            Err(e) => report_error(update_tx, e),
        },
        EngineCommand::Resume => {
            let was_paused = player.state() == PlaybackState::Paused;
            match player.resume(on_end) {
                Ok(next_play_time) if was_paused && player.state() == PlaybackState::Playing => {
                    let _ = update_tx.send(EngineUpdate::Resumed { next_play_time });
                    report_state(player, update_tx);
                }
                Ok(_) => tracing::debug!("resume ignored"),
                Err(e) => report_error(update_tx, e),
            }
        }
        EngineCommand::Pause => {
            if player.pause() {
                report_state(player, update_tx);
            }
        }
        EngineCommand::Stop => {
            player.stop();
            report_state(player, update_tx);
        }
        EngineCommand::SetVolume(volume) => player.set_volume(volume),
        EngineCommand::Shutdown => return Flow::Exit,
    }
    Flow::Continue
}

fn report_state<R: Runtime>(player: &Player<R>, update_tx: &Sender<EngineUpdate>) {
    let _ = update_tx.send(EngineUpdate::PlaybackState {
        state: player.state(),
        position: player.position(),
    });
}

fn report_error(update_tx: &Sender<EngineUpdate>, error: impl std::fmt::Display) {
    tracing::error!("{error}");
    let _ = update_tx.send(EngineUpdate::Error {
        message: error.to_string(),
    });
}
