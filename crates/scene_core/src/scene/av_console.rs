//! Audio/video device routing
//!
//! Cameras become video devices and microphones become audio devices. The
//! manager keeps one primary device of each kind: an explicit primary
//! request wins, otherwise the first registered device is used.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{Notification, NotificationBus, Producer, ProducerKind};
use crate::scene::components::{Camera, Microphone};

/// Registered video device
#[derive(Debug, Clone)]
pub struct VideoDevice {
    /// Unique device name
    pub name: String,
    /// Source camera
    pub camera: Arc<Camera>,
}

/// Registered audio device
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Unique device name
    pub name: String,
    /// Source microphone
    pub microphone: Arc<Microphone>,
}

#[derive(Debug, Default)]
struct Devices {
    video: Vec<VideoDevice>,
    audio: Vec<AudioDevice>,
    primary_video: Option<String>,
    primary_audio: Option<String>,
}

impl Devices {
    fn refresh_primaries(&mut self) {
        if !self
            .primary_video
            .as_ref()
            .is_some_and(|name| self.video.iter().any(|device| &device.name == name))
        {
            self.primary_video = self.video.first().map(|device| device.name.clone());
        }
        if !self
            .primary_audio
            .as_ref()
            .is_some_and(|name| self.audio.iter().any(|device| &device.name == name))
        {
            self.primary_audio = self.audio.first().map(|device| device.name.clone());
        }
    }
}

/// Device registry publishing on the scene bus
///
/// Notifications are emitted once the registry lock is released.
#[derive(Debug)]
pub struct AvConsoleManager {
    emitter_bus: Arc<NotificationBus>,
    producer: Producer,
    devices: Mutex<Devices>,
}

impl AvConsoleManager {
    /// Create an empty console
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        let producer = bus.register_producer(ProducerKind::AvConsole);
        Self {
            emitter_bus: bus,
            producer,
            devices: Mutex::new(Devices::default()),
        }
    }

    /// Producer of the device notifications
    pub const fn producer(&self) -> Producer {
        self.producer
    }

    /// Register a camera as a video device
    pub fn add_video_device(&self, name: &str, camera: Arc<Camera>, primary: bool) -> bool {
        {
            let mut devices = self.devices.lock();
            if devices.video.iter().any(|device| device.name == name) {
                log::warn!("AVConsole: video device '{name}' already registered");
                return false;
            }
            devices.video.push(VideoDevice {
                name: name.to_string(),
                camera,
            });
            if primary {
                devices.primary_video = Some(name.to_string());
            }
            devices.refresh_primaries();
        }

        log::debug!("AVConsole: video device '{name}' added");
        self.emit(Notification::VideoDeviceAdded { name: name.to_string() });
        true
    }

    /// Remove the video device fed by `camera`
    pub fn remove_video_device(&self, camera: &Arc<Camera>) -> bool {
        let removed = {
            let mut devices = self.devices.lock();
            let Some(index) = devices
                .video
                .iter()
                .position(|device| Arc::ptr_eq(&device.camera, camera))
            else {
                return false;
            };
            let device = devices.video.remove(index);
            devices.refresh_primaries();
            device
        };

        log::debug!("AVConsole: video device '{}' removed", removed.name);
        self.emit(Notification::VideoDeviceRemoved { name: removed.name });
        true
    }

    /// Register a microphone as an audio device
    pub fn add_audio_device(&self, name: &str, microphone: Arc<Microphone>, primary: bool) -> bool {
        {
            let mut devices = self.devices.lock();
            if devices.audio.iter().any(|device| device.name == name) {
                log::warn!("AVConsole: audio device '{name}' already registered");
                return false;
            }
            devices.audio.push(AudioDevice {
                name: name.to_string(),
                microphone,
            });
            if primary {
                devices.primary_audio = Some(name.to_string());
            }
            devices.refresh_primaries();
        }

        log::debug!("AVConsole: audio device '{name}' added");
        self.emit(Notification::AudioDeviceAdded { name: name.to_string() });
        true
    }

    /// Remove the audio device fed by `microphone`
    pub fn remove_audio_device(&self, microphone: &Arc<Microphone>) -> bool {
        let removed = {
            let mut devices = self.devices.lock();
            let Some(index) = devices
                .audio
                .iter()
                .position(|device| Arc::ptr_eq(&device.microphone, microphone))
            else {
                return false;
            };
            let device = devices.audio.remove(index);
            devices.refresh_primaries();
            device
        };

        log::debug!("AVConsole: audio device '{}' removed", removed.name);
        self.emit(Notification::AudioDeviceRemoved { name: removed.name });
        true
    }

    /// Camera of the primary video device
    pub fn primary_camera(&self) -> Option<Arc<Camera>> {
        let devices = self.devices.lock();
        let name = devices.primary_video.as_ref()?;
        devices
            .video
            .iter()
            .find(|device| &device.name == name)
            .map(|device| Arc::clone(&device.camera))
    }

    /// Microphone of the primary audio device
    pub fn primary_microphone(&self) -> Option<Arc<Microphone>> {
        let devices = self.devices.lock();
        let name = devices.primary_audio.as_ref()?;
        devices
            .audio
            .iter()
            .find(|device| &device.name == name)
            .map(|device| Arc::clone(&device.microphone))
    }

    /// Registered video device names
    pub fn video_devices(&self) -> Vec<String> {
        self.devices.lock().video.iter().map(|device| device.name.clone()).collect()
    }

    /// Registered audio device names
    pub fn audio_devices(&self) -> Vec<String> {
        self.devices.lock().audio.iter().map(|device| device.name.clone()).collect()
    }

    fn emit(&self, notification: Notification) {
        self.emitter_bus.notify(&self.producer, &notification);
    }
}
