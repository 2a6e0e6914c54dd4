use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no MIDI output port matching {0:?}")]
    PortNotFound(String),
    #[error("failed to connect MIDI output: {0}")]
    Connect(String),
    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no MIDI output configured")]
    NoOutput,
    #[error(transparent)]
    Output(#[from] OutputError),
}

#[derive(Debug, Error)]
pub enum SongError {
    #[error("song file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid song file: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize song: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine thread is gone")]
    Disconnected,
}
