use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::{
    events::{Channel, EventEmitter, ListenerId},
    location::{Heading, Location},
    native::NativeInterface,
    prelude::*,
    subscription::{StartError, Subscription},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Independently started/stopped native streams
pub enum StreamKind {
    Location,
    Heading,
    /// Coarse, low power location changes. Delivered on the same channel as [StreamKind::Location]
    SignificantLocation,
}

impl StreamKind {
    pub const ALL: [Self; 3] = [
        StreamKind::Location,
        StreamKind::Heading,
        StreamKind::SignificantLocation,
    ];

    pub const fn channel(self) -> Channel {
        match self {
            StreamKind::Location | StreamKind::SignificantLocation => Channel::LocationUpdated,
            StreamKind::Heading => Channel::HeadingUpdated,
        }
    }

    const fn index(self) -> usize {
        match self {
            StreamKind::Location => 0,
            StreamKind::Heading => 1,
            StreamKind::SignificantLocation => 2,
        }
    }

    async fn start(self, native: &impl NativeInterface) -> Result {
        match self {
            StreamKind::Location => native.start_updating_location().await,
            StreamKind::Heading => native.start_updating_heading().await,
            StreamKind::SignificantLocation => {
                native.start_monitoring_significant_location_changes().await
            }
        }
    }

    async fn stop(self, native: &impl NativeInterface) -> Result {
        match self {
            StreamKind::Location => native.stop_updating_location().await,
            StreamKind::Heading => native.stop_updating_heading().await,
            StreamKind::SignificantLocation => {
                native.stop_monitoring_significant_location_changes().await
            }
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StreamKind::Location => "location",
            StreamKind::Heading => "heading",
            StreamKind::SignificantLocation => "significant location",
        })
    }
}

/// Multiplexes any number of listeners onto the native streams.
///
/// Each [StreamKind] has a listener count, the native stream is started when the count goes
/// from 0 to 1 and stopped when it drops back to 0. The count lock is held while the
/// start/stop command runs so transitions for one kind never overlap, a subscriber arriving
/// during a stop waits for it and then starts the stream again.
pub struct Subscriptions<N> {
    native: Arc<N>,
    events: EventEmitter,
    counts: [Mutex<usize>; 3],
}

impl<N: NativeInterface> Subscriptions<N> {
    pub fn new(native: Arc<N>, events: EventEmitter) -> Self {
        Self {
            native,
            events,
            counts: Default::default(),
        }
    }

    /// Number of active subscriptions for a stream
    pub async fn listener_count(&self, kind: StreamKind) -> usize {
        *self.counts[kind.index()].lock().await
    }

    pub async fn subscribe_to_location_updates(
        self: &Arc<Self>,
        listener: impl Fn(&[Location]) + Send + Sync + 'static,
    ) -> Result<Subscription, StartError> {
        let id = self.events.on_locations(listener);
        self.subscribe(StreamKind::Location, id).await
    }

    pub async fn subscribe_to_heading_updates(
        self: &Arc<Self>,
        listener: impl Fn(&Heading) + Send + Sync + 'static,
    ) -> Result<Subscription, StartError> {
        let id = self.events.on_heading(listener);
        self.subscribe(StreamKind::Heading, id).await
    }

    pub async fn subscribe_to_significant_location_updates(
        self: &Arc<Self>,
        listener: impl Fn(&[Location]) + Send + Sync + 'static,
    ) -> Result<Subscription, StartError> {
        let id = self.events.on_locations(listener);
        self.subscribe(StreamKind::SignificantLocation, id).await
    }

    /// Count an already registered listener against `kind`, starting the stream if needed.
    ///
    /// If the start command fails the count and registration stay, the returned
    /// [StartError] carries the subscription that releases them.
    async fn subscribe(
        self: &Arc<Self>,
        kind: StreamKind,
        id: ListenerId,
    ) -> Result<Subscription, StartError> {
        let this = self.clone();
        let subscription =
            Subscription::new(move || async move { this.unsubscribe(kind, id).await });

        let mut count = self.counts[kind.index()].lock().await;
        *count += 1;

        if *count == 1 {
            debug!("First {kind} listener, starting native stream");
            if let Err(error) = kind.start(&*self.native).await {
                return Err(StartError {
                    subscription,
                    error: error.context(format!("Failed to start the native {kind} stream")),
                });
            }
        }

        Ok(subscription)
    }

    async fn unsubscribe(&self, kind: StreamKind, id: ListenerId) -> Result {
        self.events.remove_listener(kind.channel(), id);

        let mut count = self.counts[kind.index()].lock().await;
        let Some(remaining) = count.checked_sub(1) else {
            warn!("Tried to unsubscribe from {kind} with no active listeners");
            return Ok(());
        };
        *count = remaining;

        if remaining == 0 {
            debug!("Last {kind} listener gone, stopping native stream");
            kind.stop(&*self.native)
                .await
                .with_context(|| format!("Failed to stop the native {kind} stream"))?;
        }

        Ok(())
    }
}
