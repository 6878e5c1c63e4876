//! XP-Pen Innovator 16 frame button remapper
//!
//! Grabs the tablet's keyboard and mouse sub-devices, resolves the codes its
//! frame buttons share into logical buttons, and types the configured keys
//! on a virtual uinput keyboard.

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod hwdb;
pub mod injector;
pub mod remap;
pub mod resolver;
pub mod session;
pub mod virtual_device;
pub mod wheel;

pub use config::RemapConfig;
pub use error::RemapError;
pub use event::{Decision, EventKind, RawEvent, SourceKind, Transition};
pub use injector::{ChordRelease, Injector, KeySink, RecordingSink, SinkWrite};
pub use remap::{BindingTable, CodeBinding, LogicalButton, Output, RemapTable};
pub use resolver::AmbiguityResolver;
pub use session::SourcePipeline;
pub use virtual_device::VirtualKeyboard;
pub use wheel::WheelTranslator;
