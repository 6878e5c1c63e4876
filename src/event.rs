//! Raw and logical event types
//!
//! A [`RawEvent`] is one report read from a physical source. The resolver and
//! wheel translator turn those into [`Decision`]s, which the injector realizes
//! on the virtual device.

use std::fmt;

use evdev::{InputEvent, InputEventKind};

use crate::remap::LogicalButton;

/// Which sub-device of the tablet an event was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Keyboard,
    Mouse,
}

impl SourceKind {
    /// Substring the kernel puts in the sub-device name by default
    pub fn name_hint(&self) -> &'static str {
        match self {
            SourceKind::Keyboard => "Keyboard",
            SourceKind::Mouse => "Mouse",
        }
    }

    pub const ALL: &'static [SourceKind] = &[SourceKind::Keyboard, SourceKind::Mouse];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_hint())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Key,
    RelativeAxis,
}

/// One hardware report, already reduced to the fields the pipeline uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub source: SourceKind,
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn key(source: SourceKind, code: u16, value: i32) -> Self {
        Self {
            source,
            kind: EventKind::Key,
            code,
            value,
        }
    }

    pub fn relative(source: SourceKind, code: u16, value: i32) -> Self {
        Self {
            source,
            kind: EventKind::RelativeAxis,
            code,
            value,
        }
    }

    /// Convert an evdev event. Synchronization and every other event type
    /// yield `None`; the virtual device generates its own barriers.
    pub fn from_input(source: SourceKind, event: &InputEvent) -> Option<Self> {
        match event.kind() {
            InputEventKind::Key(key) => Some(Self::key(source, key.code(), event.value())),
            InputEventKind::RelAxis(axis) => Some(Self::relative(source, axis.0, event.value())),
            _ => None,
        }
    }
}

/// Key transition, as carried in the value field of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Release,
    Press,
    Hold,
}

impl Transition {
    /// Map a raw key value (0, 1, 2). Anything else is not a key transition.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Transition::Release),
            1 => Some(Transition::Press),
            2 => Some(Transition::Hold),
            _ => None,
        }
    }

    /// Raw value written to the virtual device
    pub fn value(self) -> i32 {
        match self {
            Transition::Release => 0,
            Transition::Press => 1,
            Transition::Hold => 2,
        }
    }
}

/// A disambiguated logical button transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub button: LogicalButton,
    pub transition: Transition,
}

impl Decision {
    pub fn new(button: LogicalButton, transition: Transition) -> Self {
        Self { button, transition }
    }

    /// Press immediately followed by release
    pub fn tap(button: &LogicalButton) -> [Decision; 2] {
        [
            Decision::new(button.clone(), Transition::Press),
            Decision::new(button.clone(), Transition::Release),
        ]
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.button, self.transition)
    }
}
