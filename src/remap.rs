//! Remap and code binding tables
//!
//! Both tables are built once from [`RemapConfig`](crate::config::RemapConfig)
//! and only read afterwards.

use std::collections::HashMap;
use std::fmt;

use evdev::Key;
use serde::{Deserialize, Serialize};

use crate::error::RemapError;

/// Identity of one physical control on the tablet frame (e.g. `b1`, `iwt`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalButton(String);

impl LogicalButton {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalButton {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// What a logical button types on the virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// A single key
    Key(Key),
    /// A primary key bracketed by a held modifier
    Chord { key: Key, modifier: Key },
}

impl Output {
    /// Keys referenced by this output, primary first
    pub fn keys(&self) -> impl Iterator<Item = Key> {
        let (first, second) = match *self {
            Output::Key(key) => (key, None),
            Output::Chord { key, modifier } => (key, Some(modifier)),
        };
        std::iter::once(first).chain(second)
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Key(key) => write!(f, "{key:?}"),
            Output::Chord { key, modifier } => write!(f, "{modifier:?}+{key:?}"),
        }
    }
}

/// Ordered logical button → output table
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    entries: Vec<(LogicalButton, Output)>,
    index: HashMap<LogicalButton, usize>,
}

impl RemapTable {
    pub fn new(entries: Vec<(LogicalButton, Output)>) -> Result<Self, RemapError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, (button, _)) in entries.iter().enumerate() {
            if index.insert(button.clone(), i).is_some() {
                return Err(RemapError::Config(format!(
                    "button \"{button}\" is mapped more than once"
                )));
            }
        }
        Ok(Self { entries, index })
    }

    /// Output configured for `button`. `None` means the button is inert.
    pub fn lookup(&self, button: &LogicalButton) -> Option<&Output> {
        self.index.get(button).map(|&i| &self.entries[i].1)
    }

    pub fn entries(&self) -> &[(LogicalButton, Output)] {
        &self.entries
    }

    /// Every key the table can emit, in table order, without duplicates
    pub fn output_keys(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        for key in self.entries.iter().flat_map(|(_, output)| output.keys()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a raw key code maps onto logical buttons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeBinding {
    /// The code belongs to exactly one control
    Single(LogicalButton),
    /// The code is shared; `primary` owns it when it fires on its own,
    /// `fallback` is the control that sends it as part of a combo
    Ambiguous {
        primary: LogicalButton,
        fallback: LogicalButton,
    },
}

/// Raw key code → binding table
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<u16, CodeBinding>,
}

impl BindingTable {
    pub fn new(bindings: impl IntoIterator<Item = (u16, CodeBinding)>) -> Result<Self, RemapError> {
        let mut map = HashMap::new();
        for (code, binding) in bindings {
            if map.insert(code, binding).is_some() {
                return Err(RemapError::Config(format!(
                    "code {:?} is bound more than once",
                    Key::new(code)
                )));
            }
        }
        Ok(Self { bindings: map })
    }

    pub fn binding(&self, code: u16) -> Option<&CodeBinding> {
        self.bindings.get(&code)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
