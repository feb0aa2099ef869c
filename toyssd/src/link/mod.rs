//! Transport between hosts and the storage device.
//!
//! A [`Bus`] is the shared medium; a [`Path`] is one direction over it,
//! ending in a single-slot channel; a [`StorageLink`] pairs two paths into
//! the duplex route one host uses to reach storage.

mod bus;
mod path;
mod storage_link;

pub use bus::Bus;
pub use path::Path;
pub use storage_link::StorageLink;
