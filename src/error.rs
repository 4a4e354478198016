use thiserror::Error;

use crate::connection::{ConnectionState, Direction};

/// Everything that can stop a [`Decoder`](crate::Decoder).
///
/// All variants are fatal for the observed connection: once one is returned
/// the decoder disables itself and ignores further input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("buffer underrun: needed {needed} bytes, {available} available")]
    Underrun { needed: usize, available: usize },
    #[error("wrong sequence id from {direction}: expected {expected}, got {actual}")]
    Sequence {
        direction: Direction,
        expected: u8,
        actual: u8,
    },
    #[error("malformed packet: {0}")]
    Decode(String),
    #[error("no handler for {packet} packet while {state:?}")]
    UnsupportedState {
        state: ConnectionState,
        packet: String,
    },
    #[error("cannot follow {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
