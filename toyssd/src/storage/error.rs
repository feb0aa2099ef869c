//! Errors raised by the storage device.

use super::payload::Address;

/// A command the device refuses to evaluate.
///
/// Both variants are fatal: the evaluator loop returns them and the
/// simulation halts rather than continue over a store it can no longer
/// vouch for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The payload's opcode is not a known [`Command`](super::Command).
    UnknownCommand(u8),
    /// A write arrived without data to store.
    MissingWriteData { address: Address },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCommand(opcode) => write!(f, "unknown command opcode {opcode}"),
            Self::MissingWriteData { address } => {
                write!(f, "write to address {address} carries no data")
            }
        }
    }
}

impl std::error::Error for StorageError {}
