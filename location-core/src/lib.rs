mod configure;
mod events;
mod geolocation;
mod location;
mod native;
mod permission;
mod subscription;
mod subscriptions;

pub use configure::{
    ActivityType, AndroidAccuracy, AndroidProvider, ConfigureOptions, DesiredAccuracy,
    HeadingOrientation, IosAccuracy,
};
pub use events::{Channel, EventEmitter, ListenerId, NativeEvent, Warning};
pub use geolocation::{DEFAULT_LATEST_TIMEOUT, Geolocation, GetLatestLocationOptions};
pub use location::{Heading, Location, UtcDT};
pub use native::{NativeBridge, NativeInterface, NativeModule};
pub use permission::{
    AndroidDetail, AndroidPermission, AndroidPermissionOptions, AndroidPermissions,
    AndroidRuntimePermissions, IosPermission, IosPermissions, PermissionStatus, Permissions,
    PlatformPermissions, Rationale, RequestPermissionOptions, UnsupportedPermissions,
};
pub use subscription::{StartError, Subscription};
pub use subscriptions::{StreamKind, Subscriptions};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
