//! The shared transfer medium.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::{BusConfig, ConfigError};
use crate::kernel::{Context, Resource, SimError};

/// A wire shared by every path attached to it.
///
/// Each transfer holds one lane for exactly `latency` ticks. With a single
/// lane all transfers are serialized in the order the bus grants them, so
/// the k-th of K back-to-back transfers finishes at `k * latency`.
#[derive(Clone, Debug)]
pub struct Bus {
    ctx: Context,
    lanes: Resource,
    latency: u64,
    transfers: Rc<Cell<u64>>,
}

impl Bus {
    /// # Errors
    ///
    /// - [`ConfigError::ZeroLatency`] if `config.latency` is zero.
    /// - [`ConfigError::ZeroCapacity`] if `config.lanes` is zero.
    pub fn new(ctx: &Context, config: &BusConfig) -> Result<Self, ConfigError> {
        if config.latency == 0 {
            return Err(ConfigError::ZeroLatency {
                resource: "bus".to_string(),
            });
        }
        Ok(Self {
            ctx: ctx.clone(),
            lanes: Resource::new(ctx, "bus", config.lanes)?,
            latency: config.latency,
            transfers: Rc::new(Cell::new(0)),
        })
    }

    /// Move one value across the bus: wait for a lane, then hold it for
    /// `latency` ticks. The lane is released on every exit path.
    ///
    /// # Errors
    ///
    /// [`SimError::Interrupted`] if the calling process is interrupted while
    /// queued or mid-transfer; the transfer does not count.
    pub async fn transfer(&self) -> Result<(), SimError> {
        let _lane = self.lanes.request().await?;
        self.ctx.timeout(self.latency).await?;
        self.transfers.set(self.transfers.get() + 1);
        tracing::debug!(now = %self.ctx.now(), transfers = self.transfers.get(), "bus transfer complete");
        Ok(())
    }

    #[must_use]
    pub const fn latency(&self) -> u64 {
        self.latency
    }

    #[must_use]
    pub fn lanes(&self) -> usize {
        self.lanes.capacity()
    }

    /// Completed transfers so far.
    #[must_use]
    pub fn transfers(&self) -> u64 {
        self.transfers.get()
    }

    /// Most lanes ever in use at once.
    #[must_use]
    pub fn peak_lanes_in_use(&self) -> usize {
        self.lanes.peak_holders()
    }
}
