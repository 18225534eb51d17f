use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("peer not found")]
    PeerNotFound,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("real libp2p transport is not wired up; use LoopbackGossip in tests")]
    TransportNotWired,
}

pub type Result<T> = std::result::Result<T, NetworkError>;
