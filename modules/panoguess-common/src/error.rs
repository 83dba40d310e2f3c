use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("No panorama found after {attempts} attempts")]
    SearchExhausted { attempts: u32 },

    #[error("Panorama failed to load: {0}")]
    PanoramaLoad(String),

    #[error("No round is accepting this action (phase: {0})")]
    RoundNotActive(String),

    #[error("Round advance is driven by the server in multiplayer")]
    ServerAuthoritative,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
