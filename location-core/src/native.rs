use std::sync::Arc;

use anyhow::anyhow;
use log::warn;

use crate::{
    configure::ConfigureOptions, events::EventEmitter, permission::PermissionStatus, prelude::*,
};

/// Command surface of the platform's native location module.
///
/// Implementations push their results (locations, headings, permission changes, warnings)
/// through an [EventEmitter] they were handed when created.
pub trait NativeInterface: Send + Sync + 'static {
    /// Apply the given settings, only the keys that are set should change
    fn configure(&self, options: ConfigureOptions) -> impl Future<Output = Result> + Send;
    /// (iOS) Prompt for background location access, resolves to whether it was granted
    fn request_always_authorization(&self) -> impl Future<Output = Result<bool>> + Send;
    /// (iOS) Prompt for foreground location access, resolves to whether it was granted
    fn request_when_in_use_authorization(&self) -> impl Future<Output = Result<bool>> + Send;
    /// (iOS) Current authorization status as reported by the OS
    fn get_authorization_status(&self) -> impl Future<Output = Result<PermissionStatus>> + Send;
    fn start_updating_location(&self) -> impl Future<Output = Result> + Send;
    fn stop_updating_location(&self) -> impl Future<Output = Result> + Send;
    fn start_updating_heading(&self) -> impl Future<Output = Result> + Send;
    fn stop_updating_heading(&self) -> impl Future<Output = Result> + Send;
    fn start_monitoring_significant_location_changes(
        &self,
    ) -> impl Future<Output = Result> + Send;
    fn stop_monitoring_significant_location_changes(&self)
    -> impl Future<Output = Result> + Send;
}

/// A native module that may not have been linked into the build.
///
/// When missing every command fails with an error instead of the whole library refusing to
/// load.
pub enum NativeModule<N> {
    Linked(N),
    Missing,
}

impl<N: NativeInterface> NativeModule<N> {
    pub fn is_linked(&self) -> bool {
        matches!(self, NativeModule::Linked(_))
    }

    fn linked(&self, command: &str) -> Result<&N> {
        match self {
            NativeModule::Linked(native) => Ok(native),
            NativeModule::Missing => Err(anyhow!(
                "Cannot call `{command}`, the native location module is not linked"
            )),
        }
    }
}

impl<N: NativeInterface> NativeInterface for NativeModule<N> {
    async fn configure(&self, options: ConfigureOptions) -> Result {
        self.linked("configure")?.configure(options).await
    }

    async fn request_always_authorization(&self) -> Result<bool> {
        self.linked("requestAlwaysAuthorization")?
            .request_always_authorization()
            .await
    }

    async fn request_when_in_use_authorization(&self) -> Result<bool> {
        self.linked("requestWhenInUseAuthorization")?
            .request_when_in_use_authorization()
            .await
    }

    async fn get_authorization_status(&self) -> Result<PermissionStatus> {
        self.linked("getAuthorizationStatus")?
            .get_authorization_status()
            .await
    }

    async fn start_updating_location(&self) -> Result {
        self.linked("startUpdatingLocation")?
            .start_updating_location()
            .await
    }

    async fn stop_updating_location(&self) -> Result {
        self.linked("stopUpdatingLocation")?
            .stop_updating_location()
            .await
    }

    async fn start_updating_heading(&self) -> Result {
        self.linked("startUpdatingHeading")?
            .start_updating_heading()
            .await
    }

    async fn stop_updating_heading(&self) -> Result {
        self.linked("stopUpdatingHeading")?
            .stop_updating_heading()
            .await
    }

    async fn start_monitoring_significant_location_changes(&self) -> Result {
        self.linked("startMonitoringSignificantLocationChanges")?
            .start_monitoring_significant_location_changes()
            .await
    }

    async fn stop_monitoring_significant_location_changes(&self) -> Result {
        self.linked("stopMonitoringSignificantLocationChanges")?
            .stop_monitoring_significant_location_changes()
            .await
    }
}

/// The resolved native module paired with the event channel it emits on
pub struct NativeBridge<N> {
    native: Arc<NativeModule<N>>,
    events: EventEmitter,
}

impl<N: NativeInterface> NativeBridge<N> {
    /// Resolve the native module, pass `None` if the platform didn't provide one.
    ///
    /// Native warnings are logged from here on regardless of whether the app subscribes to them.
    pub fn resolve(native: Option<N>, events: EventEmitter) -> Self {
        let native = match native {
            Some(native) => NativeModule::Linked(native),
            None => {
                warn!(
                    "Could not find the native location module, location features will fail until it is linked and the app rebuilt"
                );
                NativeModule::Missing
            }
        };

        events.on_warning(|warning| {
            warn!("Native location warning ({}): {}", warning.kind, warning.message);
        });

        Self {
            native: Arc::new(native),
            events,
        }
    }

    pub fn native(&self) -> Arc<NativeModule<N>> {
        self.native.clone()
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn into_parts(self) -> (Arc<NativeModule<N>>, EventEmitter) {
        (self.native, self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::Channel, tests::MockNative};
    use tokio::test;

    #[test]
    async fn missing_module_fails_commands() {
        let bridge = NativeBridge::<MockNative>::resolve(None, EventEmitter::new());
        let native = bridge.native();

        assert!(!native.is_linked());
        let err = native
            .start_updating_location()
            .await
            .expect_err("Missing module should fail");
        assert!(err.to_string().contains("startUpdatingLocation"));
        assert!(native.configure(ConfigureOptions::default()).await.is_err());
    }

    #[test]
    async fn linked_module_forwards_commands() {
        let mock = MockNative::default();
        let bridge = NativeBridge::resolve(Some(mock.clone()), EventEmitter::new());

        bridge.native().start_updating_heading().await.unwrap();
        bridge.native().stop_updating_heading().await.unwrap();

        assert_eq!(
            mock.calls(),
            vec!["startUpdatingHeading", "stopUpdatingHeading"]
        );
    }

    #[test]
    async fn resolve_logs_native_warnings() {
        let bridge = NativeBridge::resolve(Some(MockNative::default()), EventEmitter::new());
        assert_eq!(bridge.events().listener_count(Channel::Warning), 1);
    }
}
