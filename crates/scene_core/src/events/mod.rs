//! Notification bus
//!
//! Producers (nodes, static entities, the AV console) report structural
//! changes to subscribers without knowing their types. Key principles:
//! - Closed set of producer kinds, no runtime type identification
//! - Payload carried by the notification variant itself
//! - Handler returns bool (false = unsubscribe)
//! - Synchronous delivery on the caller's thread, no queueing
//!
//! Handlers run after the bus lock is released, so a handler may subscribe,
//! unsubscribe or notify again. It must not re-enter a lock its producer
//! still holds while notifying.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::scene::components::{Camera, Light, Microphone};
use crate::scene::{EntityId, NodeKey};

/// Kind of object able to emit notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    /// Audio/video device routing manager
    AvConsole,
    /// Node of a scene tree (the root relays its whole tree)
    Node,
    /// Entity of the flat static registry
    StaticEntity,
}

/// Identity of one producer instance on a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Producer {
    kind: ProducerKind,
    id: u64,
}

impl Producer {
    /// Producer kind
    pub const fn kind(&self) -> ProducerKind {
        self.kind
    }

    /// Bus-unique identifier
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.id)
    }
}

/// Structural or content change reported by a producer
#[derive(Debug, Clone)]
pub enum Notification {
    /// A child is about to be linked under `parent`
    SubNodeCreating {
        /// Future parent
        parent: NodeKey,
    },
    /// A child has been linked under `parent`
    SubNodeCreated {
        /// Parent of the new node
        parent: NodeKey,
        /// The new node
        node: NodeKey,
    },
    /// A node is about to be unlinked and destroyed
    SubNodeDeleting {
        /// Parent of the node
        parent: NodeKey,
        /// Node being removed, still valid
        node: NodeKey,
    },
    /// A node has been unlinked and destroyed
    SubNodeDeleted {
        /// Former parent
        parent: NodeKey,
        /// Removed node, no longer valid
        node: NodeKey,
    },
    /// A non-primary camera component was attached
    CameraCreated {
        /// Owning entity
        entity: EntityId,
        /// The camera
        camera: Arc<Camera>,
    },
    /// A primary camera component was attached
    PrimaryCameraCreated {
        /// Owning entity
        entity: EntityId,
        /// The camera
        camera: Arc<Camera>,
    },
    /// A camera component was detached
    CameraDestroyed {
        /// Owning entity
        entity: EntityId,
        /// The camera
        camera: Arc<Camera>,
    },
    /// A non-primary microphone component was attached
    MicrophoneCreated {
        /// Owning entity
        entity: EntityId,
        /// The microphone
        microphone: Arc<Microphone>,
    },
    /// A primary microphone component was attached
    PrimaryMicrophoneCreated {
        /// Owning entity
        entity: EntityId,
        /// The microphone
        microphone: Arc<Microphone>,
    },
    /// A microphone component was detached
    MicrophoneDestroyed {
        /// Owning entity
        entity: EntityId,
        /// The microphone
        microphone: Arc<Microphone>,
    },
    /// A light component was attached
    LightCreated {
        /// Owning entity
        entity: EntityId,
        /// The light
        light: Light,
    },
    /// A light component was detached
    LightDestroyed {
        /// Owning entity
        entity: EntityId,
        /// The light
        light: Light,
    },
    /// A video device was registered on the AV console
    VideoDeviceAdded {
        /// Device name
        name: String,
    },
    /// A video device was removed from the AV console
    VideoDeviceRemoved {
        /// Device name
        name: String,
    },
    /// An audio device was registered on the AV console
    AudioDeviceAdded {
        /// Device name
        name: String,
    },
    /// An audio device was removed from the AV console
    AudioDeviceRemoved {
        /// Device name
        name: String,
    },
}

impl Notification {
    /// Stable integer code, used in traces
    pub const fn code(&self) -> u32 {
        match self {
            Self::SubNodeCreating { .. } => 1,
            Self::SubNodeCreated { .. } => 2,
            Self::SubNodeDeleting { .. } => 3,
            Self::SubNodeDeleted { .. } => 4,
            Self::CameraCreated { .. } => 16,
            Self::PrimaryCameraCreated { .. } => 17,
            Self::CameraDestroyed { .. } => 18,
            Self::MicrophoneCreated { .. } => 19,
            Self::PrimaryMicrophoneCreated { .. } => 20,
            Self::MicrophoneDestroyed { .. } => 21,
            Self::LightCreated { .. } => 22,
            Self::LightDestroyed { .. } => 23,
            Self::VideoDeviceAdded { .. } => 32,
            Self::VideoDeviceRemoved { .. } => 33,
            Self::AudioDeviceAdded { .. } => 34,
            Self::AudioDeviceRemoved { .. } => 35,
        }
    }

    /// Human readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SubNodeCreating { .. } => "SubNodeCreating",
            Self::SubNodeCreated { .. } => "SubNodeCreated",
            Self::SubNodeDeleting { .. } => "SubNodeDeleting",
            Self::SubNodeDeleted { .. } => "SubNodeDeleted",
            Self::CameraCreated { .. } => "CameraCreated",
            Self::PrimaryCameraCreated { .. } => "PrimaryCameraCreated",
            Self::CameraDestroyed { .. } => "CameraDestroyed",
            Self::MicrophoneCreated { .. } => "MicrophoneCreated",
            Self::PrimaryMicrophoneCreated { .. } => "PrimaryMicrophoneCreated",
            Self::MicrophoneDestroyed { .. } => "MicrophoneDestroyed",
            Self::LightCreated { .. } => "LightCreated",
            Self::LightDestroyed { .. } => "LightDestroyed",
            Self::VideoDeviceAdded { .. } => "VideoDeviceAdded",
            Self::VideoDeviceRemoved { .. } => "VideoDeviceRemoved",
            Self::AudioDeviceAdded { .. } => "AudioDeviceAdded",
            Self::AudioDeviceRemoved { .. } => "AudioDeviceRemoved",
        }
    }
}

/// Receiver of notifications
///
/// Returns true to keep listening, false to unsubscribe.
pub trait Observer: Send + Sync {
    /// Handle one notification
    fn on_notification(&self, producer: &Producer, notification: &Notification) -> bool;
}

impl<F> Observer for F
where
    F: Fn(&Producer, &Notification) -> bool + Send + Sync,
{
    fn on_notification(&self, producer: &Producer, notification: &Notification) -> bool {
        self(producer, notification)
    }
}

/// Handle returned by [`NotificationBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscriptions {
    by_producer: HashMap<Producer, Vec<(SubscriptionId, Arc<dyn Observer>)>>,
}

/// Publish/subscribe channel shared by every producer of a scene
pub struct NotificationBus {
    next_producer: AtomicU64,
    next_subscription: AtomicU64,
    subscriptions: Mutex<Subscriptions>,
}

impl NotificationBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            next_producer: AtomicU64::new(1),
            next_subscription: AtomicU64::new(1),
            subscriptions: Mutex::new(Subscriptions::default()),
        }
    }

    /// Allocate the identity of a new producer
    pub fn register_producer(&self, kind: ProducerKind) -> Producer {
        Producer {
            kind,
            id: self.next_producer.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Listen to one producer
    pub fn subscribe<O>(&self, producer: Producer, observer: O) -> SubscriptionId
    where
        O: Observer + 'static,
    {
        self.subscribe_shared(producer, Arc::new(observer))
    }

    /// Listen to one producer with an already shared observer
    pub fn subscribe_shared(&self, producer: Producer, observer: Arc<dyn Observer>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .lock()
            .by_producer
            .entry(producer)
            .or_default()
            .push((id, observer));
        id
    }

    /// Remove one subscription, returns false if it was already gone
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let mut removed = false;
        subscriptions.by_producer.retain(|_, observers| {
            let before = observers.len();
            observers.retain(|(id, _)| *id != subscription);
            removed |= observers.len() != before;
            !observers.is_empty()
        });
        removed
    }

    /// Drop every subscription attached to a producer
    pub fn forget_producer(&self, producer: &Producer) -> usize {
        self.subscriptions
            .lock()
            .by_producer
            .remove(producer)
            .map_or(0, |observers| observers.len())
    }

    /// Number of observers listening to a producer
    pub fn subscriber_count(&self, producer: &Producer) -> usize {
        self.subscriptions
            .lock()
            .by_producer
            .get(producer)
            .map_or(0, Vec::len)
    }

    /// Deliver a notification to every observer of `producer`
    ///
    /// Returns the number of observers reached.
    pub fn notify(&self, producer: &Producer, notification: &Notification) -> usize {
        let observers: Vec<(SubscriptionId, Arc<dyn Observer>)> = {
            let subscriptions = self.subscriptions.lock();
            match subscriptions.by_producer.get(producer) {
                Some(observers) => observers.clone(),
                None => return 0,
            }
        };

        log::trace!(
            "Bus: {producer} emits {} ({}) to {} observer(s)",
            notification.name(),
            notification.code(),
            observers.len()
        );

        let mut finished = Vec::new();
        for (id, observer) in &observers {
            if !observer.on_notification(producer, notification) {
                finished.push(*id);
            }
        }

        for id in finished {
            self.unsubscribe(id);
        }

        observers.len()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions = self.subscriptions.lock();
        f.debug_struct("NotificationBus")
            .field("producers", &subscriptions.by_producer.len())
            .finish()
    }
}
