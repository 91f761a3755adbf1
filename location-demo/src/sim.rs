use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use location_core::{
    AndroidPermission, AndroidRuntimePermissions, ConfigureOptions, EventEmitter, Heading,
    Location, NativeEvent, NativeInterface, PermissionStatus, Rationale, StreamKind, Warning,
};
use log::{debug, info};
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;

/// Minimum movement in meters before a significant location change is reported
const SIGNIFICANT_DISTANCE: f64 = 500.0;
const EARTH_RADIUS: f64 = 6_371_000.0;

#[derive(Debug, Clone)]
pub struct SimSettings {
    /// Where the simulated device starts, (lat, long)
    pub origin: (f64, f64),
    /// Time between sensor readings
    pub interval: Duration,
    /// Seed for the random walk
    pub seed: u64,
    /// Permission status the device starts with
    pub initial_status: PermissionStatus,
    /// Whether the simulated user accepts permission prompts
    pub accept_prompts: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            origin: (43.0845, -77.6749),
            interval: Duration::from_secs(1),
            seed: 0,
            initial_status: PermissionStatus::NotDetermined,
            accept_prompts: true,
        }
    }
}

/// Random walk the simulated device follows
struct Walker {
    rng: ChaCha8Rng,
    lat: f64,
    long: f64,
    course: f64,
    heading: f64,
}

impl Walker {
    fn new(settings: &SimSettings) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            lat: settings.origin.0,
            long: settings.origin.1,
            course: 0.0,
            heading: 0.0,
        }
    }

    fn step(&mut self, interval: Duration) -> Location {
        let speed = self.rng.random_range(0.5..2.5);
        self.course = (self.course + self.rng.random_range(-30.0..30.0)).rem_euclid(360.0);

        let meters = speed * interval.as_secs_f64();
        let bearing = self.course.to_radians();
        self.lat += (meters * bearing.cos() / EARTH_RADIUS).to_degrees();
        self.long +=
            (meters * bearing.sin() / (EARTH_RADIUS * self.lat.to_radians().cos())).to_degrees();

        Location {
            timestamp: Utc::now(),
            latitude: self.lat,
            longitude: self.long,
            altitude: 150.0 + self.rng.random_range(-1.0..1.0),
            accuracy: self.rng.random_range(3.0..12.0),
            altitude_accuracy: 8.0,
            course: self.course,
            speed,
            course_accuracy: None,
            speed_accuracy: None,
            from_mock_provider: Some(true),
            floor: None,
        }
    }

    fn turn(&mut self) -> Heading {
        self.heading = (self.heading + self.rng.random_range(-10.0..10.0)).rem_euclid(360.0);
        Heading {
            heading: self.heading,
        }
    }
}

/// Approximate ground distance in meters, fine for the short hops the walker makes
fn distance(a: &Location, b: &Location) -> f64 {
    let mean_lat = ((a.latitude + b.latitude) / 2.0).to_radians();
    let dx = (b.longitude - a.longitude).to_radians() * mean_lat.cos();
    let dy = (b.latitude - a.latitude).to_radians();
    (dx * dx + dy * dy).sqrt() * EARTH_RADIUS
}

fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

struct SimInner {
    events: EventEmitter,
    settings: SimSettings,
    config: Mutex<ConfigureOptions>,
    status: Mutex<PermissionStatus>,
    streams: Mutex<HashMap<StreamKind, CancellationToken>>,
    walker: Mutex<Walker>,
}

/// A native location module that lives entirely in process.
///
/// Owns the merged configuration like a real native module would, and drives the location,
/// significant location and heading streams from tokio tasks while they are started.
#[derive(Clone)]
pub struct SimulatedNative {
    inner: Arc<SimInner>,
}

impl SimulatedNative {
    pub fn new(settings: SimSettings, events: EventEmitter) -> Self {
        Self {
            inner: Arc::new(SimInner {
                events,
                config: Mutex::new(ConfigureOptions::default()),
                status: Mutex::new(settings.initial_status),
                streams: Mutex::new(HashMap::with_capacity(3)),
                walker: Mutex::new(Walker::new(&settings)),
                settings,
            }),
        }
    }

    pub async fn current_config(&self) -> ConfigureOptions {
        self.inner.config.lock().await.clone()
    }

    /// Streams currently running
    pub async fn running_streams(&self) -> Vec<StreamKind> {
        let streams = self.inner.streams.lock().await;
        StreamKind::ALL
            .into_iter()
            .filter(|kind| streams.contains_key(kind))
            .collect()
    }

    /// Change the permission as if the user did it from system settings
    pub async fn set_status(&self, status: PermissionStatus) {
        let mut current = self.inner.status.lock().await;
        if *current != status {
            *current = status;
            drop(current);
            self.emit(NativeEvent::AuthorizationStatusDidChange(status));
        }
    }

    fn emit(&self, event: NativeEvent) {
        self.inner.events.emit(event);
    }

    fn warn(&self, message: impl Into<String>, kind: &str) {
        self.emit(NativeEvent::Warning(Warning::new(message, kind)));
    }

    async fn authorized(&self) -> bool {
        matches!(
            *self.inner.status.lock().await,
            PermissionStatus::AuthorizedAlways
                | PermissionStatus::AuthorizedWhenInUse
                | PermissionStatus::AuthorizedFine
                | PermissionStatus::AuthorizedCoarse
        )
    }

    /// Simulated permission prompt, only shown while the status is undetermined
    async fn prompt(&self, grants: PermissionStatus) -> bool {
        let mut status = self.inner.status.lock().await;
        if *status == PermissionStatus::NotDetermined {
            *status = if self.inner.settings.accept_prompts {
                grants
            } else {
                PermissionStatus::Denied
            };
            let new_status = *status;
            drop(status);
            info!("Simulated permission prompt answered with {new_status:?}");
            self.emit(NativeEvent::AuthorizationStatusDidChange(new_status));
            new_status == grants
        } else {
            *status == grants
        }
    }

    async fn start(&self, kind: StreamKind) -> Result {
        if !self.authorized().await {
            self.warn(
                format!("Attempted to start {kind} updates without location permissions"),
                "403",
            );
            return Ok(());
        }

        let mut streams = self.inner.streams.lock().await;
        if streams.contains_key(&kind) {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        streams.insert(kind, cancel.clone());
        drop(streams);

        debug!("Simulated {kind} stream started");
        let this = self.clone();
        tokio::spawn(async move {
            match kind {
                StreamKind::Heading => this.heading_loop(cancel).await,
                _ => this.location_loop(kind, cancel).await,
            }
        });

        Ok(())
    }

    async fn stop(&self, kind: StreamKind) -> Result {
        if let Some(cancel) = self.inner.streams.lock().await.remove(&kind) {
            debug!("Simulated {kind} stream stopped");
            cancel.cancel();
        }
        Ok(())
    }

    async fn location_loop(&self, kind: StreamKind, cancel: CancellationToken) {
        let period = self.inner.settings.interval;
        let mut interval = tokio::time::interval(period);
        let mut last_sent: Option<Location> = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = interval.tick() => {
                    let location = self.inner.walker.lock().await.step(period);
                    let min_distance = if kind == StreamKind::SignificantLocation {
                        SIGNIFICANT_DISTANCE
                    } else {
                        self.inner.config.lock().await.distance_filter.unwrap_or(0.0)
                    };

                    let moved_enough = last_sent
                        .as_ref()
                        .is_none_or(|last| distance(last, &location) >= min_distance);

                    if moved_enough {
                        last_sent = Some(location.clone());
                        self.emit(NativeEvent::LocationUpdated(vec![location]));
                    }
                }
            }
        }
    }

    async fn heading_loop(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.inner.settings.interval);
        let mut last_sent: Option<f64> = None;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = interval.tick() => {
                    let heading = self.inner.walker.lock().await.turn();
                    let filter = self.inner.config.lock().await.heading_filter.unwrap_or(0.0);

                    if last_sent.is_none_or(|last| angle_between(last, heading.heading) >= filter) {
                        last_sent = Some(heading.heading);
                        self.emit(NativeEvent::HeadingUpdated(heading));
                    }
                }
            }
        }
    }
}

impl NativeInterface for SimulatedNative {
    async fn configure(&self, options: ConfigureOptions) -> Result {
        if options.distance_filter.is_some_and(|d| d < 0.0) {
            self.warn("distanceFilter must be a positive number", "401");
        }
        if options.heading_filter.is_some_and(|h| h < 0.0) {
            self.warn("headingFilter must be a positive number", "401");
        }
        self.inner.config.lock().await.merge(&options);
        Ok(())
    }

    async fn request_always_authorization(&self) -> Result<bool> {
        Ok(self.prompt(PermissionStatus::AuthorizedAlways).await)
    }

    async fn request_when_in_use_authorization(&self) -> Result<bool> {
        Ok(self.prompt(PermissionStatus::AuthorizedWhenInUse).await)
    }

    async fn get_authorization_status(&self) -> Result<PermissionStatus> {
        Ok(*self.inner.status.lock().await)
    }

    async fn start_updating_location(&self) -> Result {
        self.start(StreamKind::Location).await
    }

    async fn stop_updating_location(&self) -> Result {
        self.stop(StreamKind::Location).await
    }

    async fn start_updating_heading(&self) -> Result {
        self.start(StreamKind::Heading).await
    }

    async fn stop_updating_heading(&self) -> Result {
        self.stop(StreamKind::Heading).await
    }

    async fn start_monitoring_significant_location_changes(&self) -> Result {
        self.start(StreamKind::SignificantLocation).await
    }

    async fn stop_monitoring_significant_location_changes(&self) -> Result {
        self.stop(StreamKind::SignificantLocation).await
    }
}

impl AndroidRuntimePermissions for SimulatedNative {
    async fn request(
        &self,
        permission: AndroidPermission,
        rationale: Option<&Rationale>,
    ) -> Result<bool> {
        if let Some(rationale) = rationale {
            info!("{}: {}", rationale.title, rationale.message);
        }
        let grants = match permission {
            AndroidPermission::AccessFineLocation => PermissionStatus::AuthorizedFine,
            AndroidPermission::AccessCoarseLocation => PermissionStatus::AuthorizedCoarse,
        };
        Ok(self.prompt(grants).await)
    }

    async fn check(&self, permission: AndroidPermission) -> Result<bool> {
        let status = *self.inner.status.lock().await;
        Ok(match permission {
            AndroidPermission::AccessFineLocation => status == PermissionStatus::AuthorizedFine,
            AndroidPermission::AccessCoarseLocation => matches!(
                status,
                PermissionStatus::AuthorizedFine | PermissionStatus::AuthorizedCoarse
            ),
        })
    }
}
