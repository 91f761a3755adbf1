use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{
    configure::ConfigureOptions,
    events::{Channel, EventEmitter, Warning},
    location::{Heading, Location},
    native::{NativeBridge, NativeInterface, NativeModule},
    permission::{
        AndroidPermissions, AndroidRuntimePermissions, IosPermissions, PermissionStatus,
        Permissions, PlatformPermissions, RequestPermissionOptions, UnsupportedPermissions,
    },
    prelude::*,
    subscription::{StartError, Subscription},
    subscriptions::{StreamKind, Subscriptions},
};

/// How long [Geolocation::get_latest_location] waits by default
pub const DEFAULT_LATEST_TIMEOUT: Duration = Duration::from_millis(10000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLatestLocationOptions {
    /// Give up after this long, `None` waits until a location arrives
    pub timeout: Option<Duration>,
}

impl Default for GetLatestLocationOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_LATEST_TIMEOUT),
        }
    }
}

/// Entry point to the device's location services.
///
/// Wraps a resolved [NativeBridge] with the platform's [PlatformPermissions], all location and
/// heading subscriptions made through one instance share the native streams.
pub struct Geolocation<N: NativeInterface, P: PlatformPermissions> {
    native: Arc<NativeModule<N>>,
    events: EventEmitter,
    permissions: Permissions<P>,
    subscriptions: Arc<Subscriptions<NativeModule<N>>>,
}

impl<N: NativeInterface, P: PlatformPermissions> Geolocation<N, P> {
    pub fn new(bridge: NativeBridge<N>, platform: P) -> Self {
        let (native, events) = bridge.into_parts();
        Self {
            permissions: Permissions::new(platform, events.clone()),
            subscriptions: Arc::new(Subscriptions::new(native.clone(), events.clone())),
            native,
            events,
        }
    }

    /// Handle to the event channel, this is what the native module emits on
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Number of active subscriptions on a native stream
    pub async fn listener_count(&self, kind: StreamKind) -> usize {
        self.subscriptions.listener_count(kind).await
    }

    /// Pass settings to the native location provider.
    ///
    /// Only the fields set in `options` are changed, so it's fine to call this several times
    /// with different subsets. Values are not validated here, the native module reports bad
    /// ones through the warning channel.
    pub async fn configure(&self, options: ConfigureOptions) -> Result {
        self.native
            .configure(options)
            .await
            .context("Failed to configure the native location provider")
    }

    /// Ask for location permission, resolves to `true` if it was granted.
    ///
    /// Only the key for the current platform is used, if it's missing nothing is requested and
    /// this resolves to `false`.
    pub async fn request_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        self.permissions.request_permission(options).await
    }

    pub async fn get_current_permission(&self) -> Result<PermissionStatus> {
        self.permissions.get_current_permission().await
    }

    /// Check whether the permission in `options` is already granted, without prompting
    pub async fn check_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        self.permissions.check_permission(options).await
    }

    pub fn subscribe_to_permission_updates(
        &self,
        listener: impl Fn(PermissionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        self.permissions.subscribe_to_permission_updates(listener)
    }

    /// Listen for native warnings, such as a rejected configure option
    pub fn subscribe_to_warnings(
        &self,
        listener: impl Fn(&Warning) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.events.on_warning(listener);
        let events = self.events.clone();
        Subscription::new(move || async move {
            events.remove_listener(Channel::Warning, id);
            Ok(())
        })
    }

    /// Subscribe to location updates, the listener receives batches of locations oldest first.
    /// Make sure permission has been granted first.
    ///
    /// If the native stream fails to start the listener stays registered, unsubscribe the
    /// subscription in the [StartError] to remove it.
    pub async fn subscribe_to_location_updates(
        &self,
        listener: impl Fn(&[Location]) + Send + Sync + 'static,
    ) -> Result<Subscription, StartError> {
        self.subscriptions
            .subscribe_to_location_updates(listener)
            .await
    }

    pub async fn subscribe_to_heading_updates(
        &self,
        listener: impl Fn(&Heading) + Send + Sync + 'static,
    ) -> Result<Subscription, StartError> {
        self.subscriptions.subscribe_to_heading_updates(listener).await
    }

    /// Subscribe to significant changes in location, this ignores the configured
    /// `distance_filter`.
    pub async fn subscribe_to_significant_location_updates(
        &self,
        listener: impl Fn(&[Location]) + Send + Sync + 'static,
    ) -> Result<Subscription, StartError> {
        self.subscriptions
            .subscribe_to_significant_location_updates(listener)
            .await
    }

    /// Wait for the next location update and return its most recent entry.
    ///
    /// Resolves to `None` if nothing arrives before the timeout. Only fails if the native
    /// stream couldn't be started or stopped.
    pub async fn get_latest_location(
        &self,
        options: GetLatestLocationOptions,
    ) -> Result<Option<Location>> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));

        let subscription = self
            .subscribe_to_location_updates(move |locations| {
                let Some(latest) = Location::latest(locations) else {
                    return;
                };
                let tx = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(tx) = tx {
                    tx.send(latest.clone()).ok();
                }
            })
            .await;

        let subscription = match subscription {
            Ok(subscription) => subscription,
            Err(StartError {
                subscription,
                error,
            }) => {
                if let Err(why) = subscription.unsubscribe().await {
                    warn!("Failed to release listener after a failed start: {why:?}");
                }
                return Err(error);
            }
        };

        let latest = match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, rx)
                .await
                .ok()
                .and_then(|res| res.ok()),
            None => rx.await.ok(),
        };

        subscription.unsubscribe().await?;

        Ok(latest)
    }
}

impl<N: NativeInterface> Geolocation<N, IosPermissions<NativeModule<N>>> {
    /// Location services on iOS, permissions go through the native module
    pub fn ios(bridge: NativeBridge<N>) -> Self {
        let platform = IosPermissions::new(bridge.native());
        Self::new(bridge, platform)
    }
}

impl<N: NativeInterface, A: AndroidRuntimePermissions> Geolocation<N, AndroidPermissions<A>> {
    /// Location services on Android, permissions go through the runtime permission service
    pub fn android(bridge: NativeBridge<N>, runtime: A) -> Self {
        Self::new(bridge, AndroidPermissions::new(runtime))
    }
}

impl<N: NativeInterface> Geolocation<N, UnsupportedPermissions> {
    pub fn unsupported(bridge: NativeBridge<N>) -> Self {
        Self::new(bridge, UnsupportedPermissions)
    }
}
