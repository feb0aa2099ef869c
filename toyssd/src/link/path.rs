//! One-way routes between two endpoints.

use std::fmt;

use crate::kernel::{Channel, Context, ProcessId, SimError};

use super::bus::Bus;

#[derive(Clone)]
enum Route {
    /// Every value pays one bus transfer before it is deposited.
    Bus(Bus),
    /// Values are deposited with no transfer cost.
    Direct,
}

/// A one-way route that ends in a single-slot [`Channel`].
///
/// A bus-backed path moves each value across its [`Bus`] first and only
/// then deposits it, so values put on paths sharing a bus arrive in the
/// order the bus granted their transfers.
pub struct Path<T> {
    ctx: Context,
    channel: Channel<T>,
    route: Route,
}

impl<T> Clone for Path<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            channel: self.channel.clone(),
            route: self.route.clone(),
        }
    }
}

impl<T: 'static> Path<T> {
    #[must_use]
    pub fn over_bus(ctx: &Context, name: impl Into<String>, bus: &Bus) -> Self {
        Self {
            ctx: ctx.clone(),
            channel: Channel::new(ctx, name),
            route: Route::Bus(bus.clone()),
        }
    }

    #[must_use]
    pub fn direct(ctx: &Context, name: impl Into<String>) -> Self {
        Self {
            ctx: ctx.clone(),
            channel: Channel::new(ctx, name),
            route: Route::Direct,
        }
    }

    /// Transfer `value` and deposit it, from within the calling process.
    ///
    /// Returns once the value sits in the channel (or was handed to a
    /// getter). An interrupt before that point abandons the value: it never
    /// reaches the other end.
    ///
    /// # Errors
    ///
    /// [`SimError::Interrupted`] if the caller is interrupted.
    pub async fn send(&self, value: T) -> Result<(), SimError> {
        if let Route::Bus(bus) = &self.route {
            bus.transfer().await?;
        }
        self.channel.put(value).await
    }

    /// Fire-and-forget variant of [`send`](Self::send): the transfer runs in
    /// its own process, which is returned.
    pub fn put(&self, value: T) -> ProcessId {
        let path = self.clone();
        let name = format!("transfer:{}", self.channel.name());
        self.ctx.spawn(name, async move { path.send(value).await })
    }

    /// Take the next delivered value, waiting until one arrives.
    ///
    /// # Errors
    ///
    /// [`SimError::Interrupted`] if the caller is interrupted while waiting.
    pub async fn get(&self) -> Result<T, SimError> {
        self.channel.get().await
    }

    /// Per-transfer latency, zero for a direct path.
    #[must_use]
    pub const fn transfer_latency(&self) -> u64 {
        match &self.route {
            Route::Bus(bus) => bus.latency(),
            Route::Direct => 0,
        }
    }

    #[must_use]
    pub const fn channel(&self) -> &Channel<T> {
        &self.channel
    }
}

impl<T: Clone + 'static> Path<T> {
    /// Values delivered or waiting for the slot, in delivery order. Values
    /// still crossing the bus are not included.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.channel.items()
    }
}

impl<T> fmt::Debug for Path<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let route = match &self.route {
            Route::Bus(_) => "bus",
            Route::Direct => "direct",
        };
        f.debug_struct("Path")
            .field("channel", &self.channel)
            .field("route", &route)
            .finish_non_exhaustive()
    }
}
