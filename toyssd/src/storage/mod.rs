//! Storage device and the command types it evaluates.
//!
//! # Usage
//!
//! ```ignore
//! let storage = Storage::new(&ctx, &StorageConfig::default())?;
//! let link = StorageLink::direct(&ctx, "host0");
//! storage.attach(&link);
//!
//! // From inside a host process:
//! link.start_transaction(Payload::write(id, 7, b"abc".to_vec())).await?;
//! let completion = link.next_for_host().await?;
//! assert_eq!(completion.outcome, Outcome::Written);
//! ```

mod device;
mod error;
mod payload;

pub use device::{Storage, StorageStats};
pub use error::StorageError;
pub use payload::{Address, Command, Completion, Data, Outcome, Payload, TransactionId};
