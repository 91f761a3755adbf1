use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    events::{Channel, EventEmitter},
    native::NativeInterface,
    prelude::*,
    subscription::Subscription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// Location permission state, unified across platforms
pub enum PermissionStatus {
    /// (iOS) Allowed in the foreground and background
    AuthorizedAlways,
    /// (iOS) Allowed while the app is in use
    AuthorizedWhenInUse,
    /// (Android) Precise location granted
    AuthorizedFine,
    /// (Android) Approximate location granted
    AuthorizedCoarse,
    /// The user refused access
    Denied,
    /// Access isn't possible here, either due to parental controls or an unsupported platform
    Restricted,
    NotDetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
pub enum IosPermission {
    WhenInUse,
    Always,
}

impl IosPermission {
    /// Always access is a superset of when in use access
    pub fn is_satisfied_by(self, status: PermissionStatus) -> bool {
        match self {
            IosPermission::WhenInUse => matches!(
                status,
                PermissionStatus::AuthorizedAlways | PermissionStatus::AuthorizedWhenInUse
            ),
            IosPermission::Always => status == PermissionStatus::AuthorizedAlways,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
pub enum AndroidDetail {
    Fine,
    Coarse,
}

impl AndroidDetail {
    /// Fine access is a superset of coarse access
    pub fn is_satisfied_by(self, status: PermissionStatus) -> bool {
        match self {
            AndroidDetail::Fine => status == PermissionStatus::AuthorizedFine,
            AndroidDetail::Coarse => matches!(
                status,
                PermissionStatus::AuthorizedFine | PermissionStatus::AuthorizedCoarse
            ),
        }
    }

    pub fn permission(self) -> AndroidPermission {
        match self {
            AndroidDetail::Fine => AndroidPermission::AccessFineLocation,
            AndroidDetail::Coarse => AndroidPermission::AccessCoarseLocation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// (Android) Manifest permissions this library asks for
pub enum AndroidPermission {
    AccessFineLocation,
    AccessCoarseLocation,
}

impl AndroidPermission {
    pub const fn manifest_name(self) -> &'static str {
        match self {
            AndroidPermission::AccessFineLocation => "android.permission.ACCESS_FINE_LOCATION",
            AndroidPermission::AccessCoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// (Android) Dialog shown to explain why the permission is needed before the system prompt
pub struct Rationale {
    pub title: String,
    pub message: String,
    pub button_positive: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_negative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_neutral: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub struct AndroidPermissionOptions {
    pub detail: AndroidDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<Rationale>,
}

impl From<AndroidDetail> for AndroidPermissionOptions {
    fn from(detail: AndroidDetail) -> Self {
        Self {
            detail,
            rationale: None,
        }
    }
}

/// The permission being asked for, per platform. Each platform only looks at its own key, a
/// missing key means nothing is requested on that platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub struct RequestPermissionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios: Option<IosPermission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidPermissionOptions>,
}

/// (Android) The runtime permission service of the host app
pub trait AndroidRuntimePermissions: Send + Sync + 'static {
    /// Prompt for the permission, showing the rationale first if given. Resolves to whether
    /// it was granted.
    fn request(
        &self,
        permission: AndroidPermission,
        rationale: Option<&Rationale>,
    ) -> impl Future<Output = Result<bool>> + Send;
    /// Check if the permission is currently granted without prompting
    fn check(&self, permission: AndroidPermission) -> impl Future<Output = Result<bool>> + Send;
}

/// Platform specific permission handling
pub trait PlatformPermissions: Send + Sync + 'static {
    /// Ask the OS for the permission in `options`, resolves to whether it was granted.
    fn request_permission(
        &self,
        options: &RequestPermissionOptions,
    ) -> impl Future<Output = Result<bool>> + Send;
    /// Query the live permission status
    fn get_current_permission(&self) -> impl Future<Output = Result<PermissionStatus>> + Send;
    /// Check whether the current status already satisfies `options`, never prompts
    fn check_permission(
        &self,
        options: &RequestPermissionOptions,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// iOS permissions, backed by CoreLocation through the native module
pub struct IosPermissions<N> {
    native: Arc<N>,
}

impl<N: NativeInterface> IosPermissions<N> {
    pub fn new(native: Arc<N>) -> Self {
        Self { native }
    }
}

impl<N: NativeInterface> PlatformPermissions for IosPermissions<N> {
    async fn request_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        match options.ios {
            Some(IosPermission::Always) => self.native.request_always_authorization().await,
            Some(IosPermission::WhenInUse) => {
                self.native.request_when_in_use_authorization().await
            }
            None => Ok(false),
        }
    }

    async fn get_current_permission(&self) -> Result<PermissionStatus> {
        self.native.get_authorization_status().await
    }

    async fn check_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        let Some(wanted) = options.ios else {
            return Ok(false);
        };
        let status = self.get_current_permission().await?;
        Ok(wanted.is_satisfied_by(status))
    }
}

/// Android permissions, backed by the runtime permission service
pub struct AndroidPermissions<A> {
    runtime: A,
}

impl<A: AndroidRuntimePermissions> AndroidPermissions<A> {
    pub fn new(runtime: A) -> Self {
        Self { runtime }
    }
}

impl<A: AndroidRuntimePermissions> PlatformPermissions for AndroidPermissions<A> {
    async fn request_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        let Some(android) = &options.android else {
            return Ok(false);
        };
        self.runtime
            .request(android.detail.permission(), android.rationale.as_ref())
            .await
    }

    async fn get_current_permission(&self) -> Result<PermissionStatus> {
        if self
            .runtime
            .check(AndroidPermission::AccessFineLocation)
            .await?
        {
            Ok(PermissionStatus::AuthorizedFine)
        } else if self
            .runtime
            .check(AndroidPermission::AccessCoarseLocation)
            .await?
        {
            Ok(PermissionStatus::AuthorizedCoarse)
        } else {
            Ok(PermissionStatus::NotDetermined)
        }
    }

    async fn check_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        let Some(android) = &options.android else {
            return Ok(false);
        };
        let status = self.get_current_permission().await?;
        Ok(android.detail.is_satisfied_by(status))
    }
}

/// Platforms without location support, nothing is ever granted
pub struct UnsupportedPermissions;

impl PlatformPermissions for UnsupportedPermissions {
    async fn request_permission(&self, _options: &RequestPermissionOptions) -> Result<bool> {
        Ok(false)
    }

    async fn get_current_permission(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Restricted)
    }

    async fn check_permission(&self, _options: &RequestPermissionOptions) -> Result<bool> {
        Ok(false)
    }
}

/// Permission requests and monitoring for one platform
pub struct Permissions<P> {
    platform: P,
    events: EventEmitter,
}

impl<P: PlatformPermissions> Permissions<P> {
    pub fn new(platform: P, events: EventEmitter) -> Self {
        Self { platform, events }
    }

    pub async fn request_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        self.platform
            .request_permission(options)
            .await
            .context("Failed to request location permission")
    }

    pub async fn get_current_permission(&self) -> Result<PermissionStatus> {
        self.platform
            .get_current_permission()
            .await
            .context("Failed to get the current location permission")
    }

    pub async fn check_permission(&self, options: &RequestPermissionOptions) -> Result<bool> {
        self.platform
            .check_permission(options)
            .await
            .context("Failed to check location permission")
    }

    /// Listen for permission changes. The OS pushes these whether or not anyone listens, so
    /// there's no native stream to manage.
    pub fn subscribe_to_permission_updates(
        &self,
        listener: impl Fn(PermissionStatus) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.events.on_permission_status(listener);
        let events = self.events.clone();
        Subscription::new(move || async move {
            events.remove_listener(Channel::AuthorizationStatusDidChange, id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        events::NativeEvent,
        tests::{MockAndroid, MockNative},
    };
    use tokio::test;

    const ALL_STATUSES: [PermissionStatus; 7] = [
        PermissionStatus::AuthorizedAlways,
        PermissionStatus::AuthorizedWhenInUse,
        PermissionStatus::AuthorizedFine,
        PermissionStatus::AuthorizedCoarse,
        PermissionStatus::Denied,
        PermissionStatus::Restricted,
        PermissionStatus::NotDetermined,
    ];

    fn ios(native: &MockNative) -> Permissions<IosPermissions<MockNative>> {
        Permissions::new(
            IosPermissions::new(Arc::new(native.clone())),
            EventEmitter::new(),
        )
    }

    fn android(runtime: &MockAndroid) -> Permissions<AndroidPermissions<MockAndroid>> {
        Permissions::new(AndroidPermissions::new(runtime.clone()), EventEmitter::new())
    }

    fn ask_ios(p: IosPermission) -> RequestPermissionOptions {
        RequestPermissionOptions {
            ios: Some(p),
            android: None,
        }
    }

    fn ask_android(detail: AndroidDetail) -> RequestPermissionOptions {
        RequestPermissionOptions {
            ios: None,
            android: Some(detail.into()),
        }
    }

    #[test]
    async fn ios_request_with_no_options_calls_nothing() {
        let native = MockNative::default();
        let granted = ios(&native)
            .request_permission(&RequestPermissionOptions::default())
            .await
            .unwrap();

        assert!(!granted);
        assert!(native.calls().is_empty());
    }

    #[test]
    async fn ios_request_ignores_android_key() {
        let native = MockNative::default();
        let granted = ios(&native)
            .request_permission(&ask_android(AndroidDetail::Fine))
            .await
            .unwrap();

        assert!(!granted);
        assert!(native.calls().is_empty());
    }

    #[test]
    async fn ios_request_calls_matching_command() {
        let native = MockNative::default();
        native.set_grant(true);
        let perms = ios(&native);

        assert!(
            perms
                .request_permission(&ask_ios(IosPermission::Always))
                .await
                .unwrap()
        );
        assert_eq!(native.calls(), vec!["requestAlwaysAuthorization"]);

        native.set_grant(false);
        assert!(
            !perms
                .request_permission(&ask_ios(IosPermission::WhenInUse))
                .await
                .unwrap()
        );
        assert_eq!(
            native.calls(),
            vec![
                "requestAlwaysAuthorization",
                "requestWhenInUseAuthorization"
            ]
        );
    }

    #[test]
    async fn ios_request_failure_propagates() {
        let native = MockNative::default();
        native.fail_command("requestWhenInUseAuthorization");

        let res = ios(&native)
            .request_permission(&ask_ios(IosPermission::WhenInUse))
            .await;
        assert!(res.is_err());
    }

    #[test]
    async fn ios_current_permission_is_live() {
        let native = MockNative::default();
        let perms = ios(&native);

        native.set_status(PermissionStatus::Denied);
        assert_eq!(
            perms.get_current_permission().await.unwrap(),
            PermissionStatus::Denied
        );

        native.set_status(PermissionStatus::AuthorizedWhenInUse);
        assert_eq!(
            perms.get_current_permission().await.unwrap(),
            PermissionStatus::AuthorizedWhenInUse
        );
    }

    #[test]
    async fn ios_check_when_in_use() {
        let native = MockNative::default();
        let perms = ios(&native);

        for status in ALL_STATUSES {
            native.set_status(status);
            let expected = matches!(
                status,
                PermissionStatus::AuthorizedAlways | PermissionStatus::AuthorizedWhenInUse
            );
            assert_eq!(
                perms
                    .check_permission(&ask_ios(IosPermission::WhenInUse))
                    .await
                    .unwrap(),
                expected,
                "whenInUse check with {status:?}"
            );
        }
    }

    #[test]
    async fn ios_check_always() {
        let native = MockNative::default();
        let perms = ios(&native);

        for status in ALL_STATUSES {
            native.set_status(status);
            assert_eq!(
                perms
                    .check_permission(&ask_ios(IosPermission::Always))
                    .await
                    .unwrap(),
                status == PermissionStatus::AuthorizedAlways,
                "always check with {status:?}"
            );
        }
    }

    #[test]
    async fn ios_check_without_key_is_false() {
        let native = MockNative::default();
        native.set_status(PermissionStatus::AuthorizedAlways);
        assert!(
            !ios(&native)
                .check_permission(&RequestPermissionOptions::default())
                .await
                .unwrap()
        );
    }

    #[test]
    async fn android_current_permission_prefers_fine() {
        let runtime = MockAndroid::default();
        let perms = android(&runtime);

        assert_eq!(
            perms.get_current_permission().await.unwrap(),
            PermissionStatus::NotDetermined
        );

        runtime.grant(AndroidPermission::AccessCoarseLocation);
        assert_eq!(
            perms.get_current_permission().await.unwrap(),
            PermissionStatus::AuthorizedCoarse
        );

        runtime.grant(AndroidPermission::AccessFineLocation);
        assert_eq!(
            perms.get_current_permission().await.unwrap(),
            PermissionStatus::AuthorizedFine
        );
    }

    #[test]
    async fn android_check_details() {
        let runtime = MockAndroid::default();
        let perms = android(&runtime);
        let fine = ask_android(AndroidDetail::Fine);
        let coarse = ask_android(AndroidDetail::Coarse);

        assert!(!perms.check_permission(&fine).await.unwrap());
        assert!(!perms.check_permission(&coarse).await.unwrap());

        runtime.grant(AndroidPermission::AccessCoarseLocation);
        assert!(!perms.check_permission(&fine).await.unwrap());
        assert!(perms.check_permission(&coarse).await.unwrap());

        runtime.grant(AndroidPermission::AccessFineLocation);
        assert!(perms.check_permission(&fine).await.unwrap());
        assert!(perms.check_permission(&coarse).await.unwrap());

        assert!(
            !perms
                .check_permission(&ask_ios(IosPermission::WhenInUse))
                .await
                .unwrap()
        );
    }

    #[test]
    async fn android_request_passes_rationale() {
        let runtime = MockAndroid::default();
        runtime.grant_on_request(true);
        let rationale = Rationale {
            title: "Location permission".into(),
            message: "We use your location to demo the library".into(),
            button_positive: "OK".into(),
            button_negative: Some("Cancel".into()),
            button_neutral: None,
        };
        let options = RequestPermissionOptions {
            ios: Some(IosPermission::WhenInUse),
            android: Some(AndroidPermissionOptions {
                detail: AndroidDetail::Coarse,
                rationale: Some(rationale.clone()),
            }),
        };

        assert!(android(&runtime).request_permission(&options).await.unwrap());
        assert_eq!(
            runtime.requests(),
            vec![(AndroidPermission::AccessCoarseLocation, Some(rationale))]
        );
    }

    #[test]
    async fn android_request_without_key_calls_nothing() {
        let runtime = MockAndroid::default();
        let granted = android(&runtime)
            .request_permission(&ask_ios(IosPermission::Always))
            .await
            .unwrap();

        assert!(!granted);
        assert!(runtime.requests().is_empty());
    }

    #[test]
    async fn unsupported_platform_sentinels() {
        let perms = Permissions::new(UnsupportedPermissions, EventEmitter::new());
        let everything = RequestPermissionOptions {
            ios: Some(IosPermission::Always),
            android: Some(AndroidDetail::Fine.into()),
        };

        assert!(!perms.request_permission(&everything).await.unwrap());
        assert!(!perms.check_permission(&everything).await.unwrap());
        assert_eq!(
            perms.get_current_permission().await.unwrap(),
            PermissionStatus::Restricted
        );
    }

    #[test]
    async fn permission_updates_until_unsubscribed() {
        let events = EventEmitter::new();
        let perms = Permissions::new(UnsupportedPermissions, events.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sub = perms.subscribe_to_permission_updates({
            let seen = seen.clone();
            move |status| seen.lock().unwrap().push(status)
        });

        events.emit(NativeEvent::AuthorizationStatusDidChange(
            PermissionStatus::Denied,
        ));
        sub.unsubscribe().await.unwrap();
        sub.unsubscribe().await.unwrap();
        events.emit(NativeEvent::AuthorizationStatusDidChange(
            PermissionStatus::AuthorizedFine,
        ));

        assert_eq!(*seen.lock().unwrap(), vec![PermissionStatus::Denied]);
        assert_eq!(
            events.listener_count(Channel::AuthorizationStatusDidChange),
            0
        );
    }

    #[test]
    async fn status_wire_names() {
        assert_eq!(
            serde_json::to_value(PermissionStatus::AuthorizedWhenInUse).unwrap(),
            "authorizedWhenInUse"
        );
        let status: PermissionStatus = serde_json::from_str("\"notDetermined\"").unwrap();
        assert_eq!(status, PermissionStatus::NotDetermined);
    }
}
