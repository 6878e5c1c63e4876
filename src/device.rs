//! Discovery and exclusive acquisition of the tablet's input sub-devices
//!
//! The tablet shows up as several evdev nodes sharing one VID/PID. Frame
//! buttons arrive on the "Keyboard" node, the inner wheel on the "Mouse" node.

use std::path::PathBuf;

use evdev::{Device, EventStream, InputEvent};
use tracing::{debug, info, warn};

use crate::error::RemapError;
use crate::event::SourceKind;

/// Which evdev nodes belong to the tablet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor: u16,
    pub product: u16,
    /// Name substring of the keyboard node
    pub keyboard_name: String,
    /// Name substring of the mouse node
    pub mouse_name: String,
}

impl DeviceFilter {
    /// Filter matching the kernel's default "Keyboard" / "Mouse" node names
    pub fn new(vendor: u16, product: u16) -> Self {
        Self::with_names(
            vendor,
            product,
            SourceKind::Keyboard.name_hint(),
            SourceKind::Mouse.name_hint(),
        )
    }

    pub fn with_names(vendor: u16, product: u16, keyboard_name: &str, mouse_name: &str) -> Self {
        Self {
            vendor,
            product,
            keyboard_name: keyboard_name.to_string(),
            mouse_name: mouse_name.to_string(),
        }
    }

    /// Name substring that identifies `kind`
    pub fn name_for(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Keyboard => &self.keyboard_name,
            SourceKind::Mouse => &self.mouse_name,
        }
    }

    /// Source kind of a node, or `None` if it is not one we take over
    pub fn classify(&self, vendor: u16, product: u16, name: &str) -> Option<SourceKind> {
        if vendor != self.vendor || product != self.product {
            return None;
        }
        SourceKind::ALL
            .iter()
            .copied()
            .find(|&kind| name.contains(self.name_for(kind)))
    }
}

/// One evdev node as seen during enumeration
#[derive(Debug, Clone)]
pub struct DeviceListing {
    pub path: PathBuf,
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub kind: Option<SourceKind>,
}

/// Enumerate every readable input device
pub fn list_devices(filter: &DeviceFilter) -> Vec<DeviceListing> {
    evdev::enumerate()
        .map(|(path, dev)| {
            let id = dev.input_id();
            let name = dev.name().unwrap_or_default().to_string();
            let kind = filter.classify(id.vendor(), id.product(), &name);
            DeviceListing {
                path,
                name,
                vendor: id.vendor(),
                product: id.product(),
                kind,
            }
        })
        .collect()
}

/// A physical source that has been opened but not yet grabbed
pub struct SourceDevice {
    pub kind: SourceKind,
    pub path: PathBuf,
    device: Device,
}

/// Find one node per [`SourceKind`]. Missing any of them is fatal.
pub fn discover(filter: &DeviceFilter) -> Result<Vec<SourceDevice>, RemapError> {
    let mut found: Vec<SourceDevice> = Vec::new();

    for (path, device) in evdev::enumerate() {
        let id = device.input_id();
        let name = device.name().unwrap_or_default().to_string();
        let Some(kind) = filter.classify(id.vendor(), id.product(), &name) else {
            continue;
        };
        if found.iter().any(|s| s.kind == kind) {
            debug!("Ignoring extra {} node {:?} ({})", kind, path, name);
            continue;
        }
        info!("Found {} source: {} at {:?}", kind, name, path);
        found.push(SourceDevice { kind, path, device });
    }

    for &kind in SourceKind::ALL {
        if !found.iter().any(|s| s.kind == kind) {
            return Err(RemapError::DeviceNotFound {
                kind,
                vendor: filter.vendor,
                product: filter.product,
            });
        }
    }

    Ok(found)
}

impl SourceDevice {
    /// Take the device exclusively; its events stop reaching other readers
    pub fn grab(mut self) -> Result<SourceStream, RemapError> {
        self.device.grab().map_err(|source| RemapError::Grab {
            path: self.path.clone(),
            source,
        })?;
        info!("Grabbed {} device {:?}", self.kind, self.path);
        self.into_stream(true)
    }

    /// Read without grabbing (dry runs)
    pub fn observe(self) -> Result<SourceStream, RemapError> {
        self.into_stream(false)
    }

    fn into_stream(self, grabbed: bool) -> Result<SourceStream, RemapError> {
        let kind = self.kind;
        let stream = self
            .device
            .into_event_stream()
            .map_err(|source| RemapError::Read { kind, source })?;
        Ok(SourceStream {
            kind,
            path: self.path,
            stream,
            grabbed,
        })
    }
}

/// Async event stream over one source. The grab is released on drop.
pub struct SourceStream {
    pub kind: SourceKind,
    pub path: PathBuf,
    stream: EventStream,
    grabbed: bool,
}

impl SourceStream {
    pub async fn next_event(&mut self) -> Result<InputEvent, RemapError> {
        self.stream
            .next_event()
            .await
            .map_err(|source| RemapError::Read {
                kind: self.kind,
                source,
            })
    }
}

impl Drop for SourceStream {
    fn drop(&mut self) {
        if !self.grabbed {
            return;
        }
        match self.stream.device_mut().ungrab() {
            Ok(()) => info!("Released {} device {:?}", self.kind, self.path),
            Err(e) => warn!("Failed to release {:?}: {}", self.path, e),
        }
    }
}
