//! Virtual keyboard device using evdev/uinput
//!
//! Declares every key the remap table can emit, plus the relative axes needed
//! to keep receiving wheel motion.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
};

use crate::error::RemapError;
use crate::injector::KeySink;
use crate::remap::RemapTable;

/// Relative axes declared on the virtual device
pub const RELATIVE_AXES: &[RelativeAxisType] = &[
    RelativeAxisType::REL_X,
    RelativeAxisType::REL_Y,
    RelativeAxisType::REL_WHEEL_HI_RES,
    RelativeAxisType::REL_HWHEEL_HI_RES,
];

/// Virtual keyboard fed by the injector
pub struct VirtualKeyboard {
    device: VirtualDevice,
    /// Writes queued since the last sync
    pending: Vec<InputEvent>,
}

impl VirtualKeyboard {
    /// Create the device with the capability set derived from `table`
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest` and desktop settings)
    /// * `table` - Remap table whose output keys become the key capabilities
    pub fn new(name: &str, table: &RemapTable) -> Result<Self, RemapError> {
        let keys = key_capabilities(table);

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        for &axis in RELATIVE_AXES {
            axes.insert(axis);
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(RemapError::VirtualDevice)?
            .name(name)
            .with_keys(&keys)
            .map_err(RemapError::VirtualDevice)?
            .with_relative_axes(&axes)
            .map_err(RemapError::VirtualDevice)?
            .build()
            .map_err(RemapError::VirtualDevice)?;

        Ok(Self {
            device,
            pending: Vec::with_capacity(4),
        })
    }

    /// Get the device path (e.g., /dev/input/eventX)
    pub fn device_path(&mut self) -> Option<std::path::PathBuf> {
        self.device
            .enumerate_dev_nodes_blocking()
            .ok()?
            .next()?
            .ok()
    }
}

impl KeySink for VirtualKeyboard {
    fn write_key(&mut self, key: Key, value: i32) -> Result<(), RemapError> {
        self.pending
            .push(InputEvent::new_now(EventType::KEY, key.code(), value));
        Ok(())
    }

    /// Emit the queued writes as one batch; `emit` appends the `SYN_REPORT`
    fn sync(&mut self) -> Result<(), RemapError> {
        let result = self.device.emit(&self.pending);
        self.pending.clear();
        result.map_err(RemapError::Emit)
    }
}

/// Key capability set for a remap table
pub fn key_capabilities(table: &RemapTable) -> AttributeSet<Key> {
    let mut keys = AttributeSet::<Key>::new();
    for key in table.output_keys() {
        keys.insert(key);
    }
    keys
}
