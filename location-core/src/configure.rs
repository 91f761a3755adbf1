use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// (iOS) CoreLocation accuracy levels
pub enum IosAccuracy {
    BestForNavigation,
    Best,
    NearestTenMeters,
    HundredMeters,
    ThreeKilometers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// (Android) Fused provider priorities
pub enum AndroidAccuracy {
    HighAccuracy,
    BalancedPowerAccuracy,
    LowPower,
    NoPower,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// Desired accuracy per platform, each platform only reads its own key
pub struct DesiredAccuracy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios: Option<IosAccuracy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidAccuracy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// (iOS) Hint about what the user is doing, lets the OS pause updates to save power
pub enum ActivityType {
    Other,
    AutomotiveNavigation,
    Fitness,
    OtherNavigation,
    /// iOS 12+
    Airborne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// (iOS) Device orientation used as the reference for heading values
pub enum HeadingOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// (Android) Which location provider backs the stream
pub enum AndroidProvider {
    /// Play Services when available, otherwise the standard `LocationManager`
    Auto,
    PlayServices,
    Standard,
}

/// Settings for the native location provider.
///
/// Every field is optional, only the fields that are set are sent to the native module. Calling
/// configure again with a subset of fields changes only those settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureOptions {
    /// Minimum distance in meters the device must move before a new location is delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_filter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_accuracy: Option<DesiredAccuracy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<ActivityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_background_location_updates: Option<bool>,
    /// Minimum change in degrees before a new heading is delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_filter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_orientation: Option<HeadingOrientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pauses_location_updates_automatically: Option<bool>,
    /// iOS 11+
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shows_background_location_indicator: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_provider: Option<AndroidProvider>,
    /// (Android) Desired interval between updates in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// (Android) Fastest interval the app can handle in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastest_interval: Option<u64>,
    /// (Android) Maximum time in milliseconds updates may be batched for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_time: Option<u64>,
}

impl ConfigureOptions {
    /// Overlay the set fields of `other` on top of this config, leaving the rest alone.
    ///
    /// The core never calls this itself, it exists for native implementations which own the
    /// current configuration.
    pub fn merge(&mut self, other: &ConfigureOptions) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }

        overlay!(
            distance_filter,
            desired_accuracy,
            activity_type,
            allows_background_location_updates,
            heading_filter,
            heading_orientation,
            pauses_location_updates_automatically,
            shows_background_location_indicator,
            android_provider,
            interval,
            fastest_interval,
            max_wait_time
        );
    }
}
