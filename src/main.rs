use std::path::PathBuf;

use cueline::{EngineCommand, EngineUpdate, MidiPort, Song, SystemRuntime, spawn_engine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(song_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: cueline <song.ron> [output-port-name]");
        std::process::exit(2);
    };
    let port_filter = args.next();

    let song = Song::load(&song_path)?;
    let sequence = song.sequence();
    tracing::info!(
        name = %song.name,
        events = sequence.len(),
        duration_ms = sequence.duration_ms(),
        "song loaded"
    );

    let runtime = SystemRuntime::new();
    let port = MidiPort::connect(port_filter.as_deref(), runtime.epoch())?;
    println!("Playing {:?} on {}", song.name, port.name());

    let engine = spawn_engine(song.player.clone(), runtime, Box::new(port));
    engine.send(EngineCommand::Load(sequence))?;
    engine.send(EngineCommand::Play)?;

    while let Ok(update) = engine.update_rx.recv() {
        match update {
            EngineUpdate::Sent { message, timestamp } => {
                tracing::trace!(?message, timestamp, "sent");
            }
            EngineUpdate::PlaybackState { state, position } => {
                tracing::debug!(?state, position, "state");
            }
            EngineUpdate::Ended => break,
            EngineUpdate::Error { message } => {
                eprintln!("Playback error: {}", message);
                break;
            }
            EngineUpdate::Resumed { .. } => {}
        }
    }

    engine.shutdown();
    Ok(())
}
