//! Units of work that travel between a host and the device.
//!
//! A [`Payload`] goes host → storage and is consumed by evaluation; the
//! device answers with a fresh [`Completion`] going storage → host. Nothing
//! is shared or mutated in place between the two directions.

use std::fmt;

use serde::Serialize;

use super::error::StorageError;

/// A location in the device's store.
pub type Address = u64;

/// The bytes stored at an address.
pub type Data = Vec<u8>;

/// Operations the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Command {
    Read = 1,
    Write = 2,
}

impl Command {
    /// Wire value carried in [`Payload::opcode`].
    #[must_use]
    pub const fn opcode(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = StorageError;

    fn try_from(opcode: u8) -> Result<Self, Self::Error> {
        match opcode {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            other => Err(StorageError::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Correlates a completion with the request that caused it.
///
/// Assigned by the issuing host, unique per host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T#{}", self.0)
    }
}

/// A request on its way to the device.
///
/// The command is kept as a raw opcode so that a malformed request reaches
/// the device and is rejected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub id: TransactionId,
    pub opcode: u8,
    pub address: Address,
    /// Present for writes.
    pub data: Option<Data>,
}

impl Payload {
    #[must_use]
    pub const fn read(id: TransactionId, address: Address) -> Self {
        Self {
            id,
            opcode: Command::Read.opcode(),
            address,
            data: None,
        }
    }

    #[must_use]
    pub const fn write(id: TransactionId, address: Address, data: Data) -> Self {
        Self {
            id,
            opcode: Command::Write.opcode(),
            address,
            data: Some(data),
        }
    }

    /// Decode the opcode.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownCommand`] for an opcode outside
    /// [`Command`].
    pub fn command(&self) -> Result<Command, StorageError> {
        Command::try_from(self.opcode)
    }
}

/// What evaluating a command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A write was applied.
    Written,
    /// A read found data.
    Found(Data),
    /// A read hit an address that was never written. Not an error.
    NotFound,
}

/// The device's answer to one [`Payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: TransactionId,
    pub command: Command,
    pub address: Address,
    pub outcome: Outcome,
}

impl Completion {
    /// The data a read returned, `None` for not-found reads and writes.
    #[must_use]
    pub fn into_data(self) -> Option<Data> {
        match self.outcome {
            Outcome::Found(data) => Some(data),
            Outcome::Written | Outcome::NotFound => None,
        }
    }
}
