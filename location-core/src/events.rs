use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, PoisonError},
};

use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    location::{Heading, Location},
    permission::PermissionStatus,
};

/// Named channels the native module emits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    LocationUpdated,
    HeadingUpdated,
    AuthorizationStatusDidChange,
    Warning,
}

impl Channel {
    /// The event name the native side uses for this channel
    pub const fn name(self) -> &'static str {
        match self {
            Channel::LocationUpdated => "locationUpdated",
            Channel::HeadingUpdated => "headingUpdated",
            Channel::AuthorizationStatusDidChange => "authorizationStatusDidChange",
            Channel::Warning => "onWarning",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// A non-fatal diagnostic from the native module
pub struct Warning {
    pub message: String,
    /// Native warning code, e.g. "401" for a bad configure option or "403" for missing
    /// permissions
    #[serde(rename = "type")]
    pub kind: String,
}

impl Warning {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
        }
    }
}

/// An event pushed from the native module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeEvent {
    /// One or more new locations, oldest first
    LocationUpdated(Vec<Location>),
    HeadingUpdated(Heading),
    AuthorizationStatusDidChange(PermissionStatus),
    Warning(Warning),
}

impl NativeEvent {
    pub fn channel(&self) -> Channel {
        match self {
            NativeEvent::LocationUpdated(_) => Channel::LocationUpdated,
            NativeEvent::HeadingUpdated(_) => Channel::HeadingUpdated,
            NativeEvent::AuthorizationStatusDidChange(_) => Channel::AuthorizationStatusDidChange,
            NativeEvent::Warning(_) => Channel::Warning,
        }
    }
}

pub type ListenerId = Uuid;

type Listener = Arc<dyn Fn(&NativeEvent) + Send + Sync>;
type ListenerMap = HashMap<Channel, Vec<(ListenerId, Listener)>>;

/// Fan-out point between the native module and listeners. Cloning gives another handle to the
/// same set of listeners, the native module keeps one to emit on.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<Mutex<ListenerMap>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListenerMap> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener on a channel, it will be called for every event emitted there
    pub fn add_listener(
        &self,
        channel: Channel,
        listener: impl Fn(&NativeEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = Uuid::new_v4();
        self.lock()
            .entry(channel)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener, returns whether it was registered
    pub fn remove_listener(&self, channel: Channel, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(list) = listeners.get_mut(&channel) else {
            return false;
        };
        let before = list.len();
        list.retain(|(other, _)| *other != id);
        before != list.len()
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        self.lock().get(&channel).map_or(0, Vec::len)
    }

    /// Deliver an event to everyone listening on its channel.
    ///
    /// Listeners are snapshotted before being called so they can add or remove listeners
    /// themselves. A panicking listener is logged and skipped.
    pub fn emit(&self, event: NativeEvent) {
        let channel = event.channel();
        let targets = self
            .lock()
            .get(&channel)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect::<Vec<_>>())
            .unwrap_or_default();

        for listener in targets {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                error!("Listener on {channel} panicked while handling an event");
            }
        }
    }

    pub fn on_locations(
        &self,
        listener: impl Fn(&[Location]) + Send + Sync + 'static,
    ) -> ListenerId {
        self.add_listener(Channel::LocationUpdated, move |ev| {
            if let NativeEvent::LocationUpdated(locations) = ev {
                listener(locations);
            }
        })
    }

    pub fn on_heading(&self, listener: impl Fn(&Heading) + Send + Sync + 'static) -> ListenerId {
        self.add_listener(Channel::HeadingUpdated, move |ev| {
            if let NativeEvent::HeadingUpdated(heading) = ev {
                listener(heading);
            }
        })
    }

    pub fn on_permission_status(
        &self,
        listener: impl Fn(PermissionStatus) + Send + Sync + 'static,
    ) -> ListenerId {
        self.add_listener(Channel::AuthorizationStatusDidChange, move |ev| {
            if let NativeEvent::AuthorizationStatusDidChange(status) = ev {
                listener(*status);
            }
        })
    }

    pub fn on_warning(&self, listener: impl Fn(&Warning) + Send + Sync + 'static) -> ListenerId {
        self.add_listener(Channel::Warning, move |ev| {
            if let NativeEvent::Warning(warning) = ev {
                listener(warning);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn emits_only_to_matching_channel() {
        let events = EventEmitter::new();
        let headings = Arc::new(AtomicUsize::new(0));
        let warnings = Arc::new(AtomicUsize::new(0));

        events.on_heading({
            let headings = headings.clone();
            move |_| {
                headings.fetch_add(1, Ordering::SeqCst);
            }
        });
        events.on_warning({
            let warnings = warnings.clone();
            move |_| {
                warnings.fetch_add(1, Ordering::SeqCst);
            }
        });

        events.emit(NativeEvent::HeadingUpdated(Heading { heading: 90.0 }));
        events.emit(NativeEvent::HeadingUpdated(Heading { heading: 91.0 }));

        assert_eq!(headings.load(Ordering::SeqCst), 2);
        assert_eq!(warnings.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let events = EventEmitter::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let id = events.on_heading({
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(events.remove_listener(Channel::HeadingUpdated, id));
        assert!(!events.remove_listener(Channel::HeadingUpdated, id));
        assert_eq!(events.listener_count(Channel::HeadingUpdated), 0);

        events.emit(NativeEvent::HeadingUpdated(Heading { heading: 1.0 }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let events = EventEmitter::new();
        let calls = Arc::new(AtomicUsize::new(0));

        events.on_warning(|_| panic!("listener blew up"));
        events.on_warning({
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        events.emit(NativeEvent::Warning(Warning::new("out of service", "500")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_can_remove_itself() {
        let events = EventEmitter::new();
        let slot = Arc::new(Mutex::new(None::<ListenerId>));
        let id = events.on_heading({
            let events = events.clone();
            let slot = slot.clone();
            move |_| {
                if let Some(id) = slot.lock().unwrap().take() {
                    events.remove_listener(Channel::HeadingUpdated, id);
                }
            }
        });
        *slot.lock().unwrap() = Some(id);

        events.emit(NativeEvent::HeadingUpdated(Heading { heading: 1.0 }));
        assert_eq!(events.listener_count(Channel::HeadingUpdated), 0);
    }

    #[test]
    fn warning_uses_native_field_names() {
        let json = serde_json::to_value(Warning::new("distanceFilter must be a number", "401"))
            .unwrap();
        assert_eq!(json["type"], "401");
        assert_eq!(json["message"], "distanceFilter must be a number");
    }
}
