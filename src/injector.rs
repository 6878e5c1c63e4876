//! Realization of logical decisions as key writes
//!
//! The [`Injector`] looks a decision's button up in the [`RemapTable`] and
//! writes the resulting key events to a [`KeySink`], closing every group of
//! writes with a barrier so the consumer sees it as one batch.

use std::sync::Arc;

use evdev::Key;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::RemapError;
use crate::event::{Decision, Transition};
use crate::remap::{Output, RemapTable};

/// Destination for synthetic key events
pub trait KeySink {
    /// Queue one key event with raw value 0, 1 or 2
    fn write_key(&mut self, key: Key, value: i32) -> Result<(), RemapError>;

    /// Close the current group of writes
    fn sync(&mut self) -> Result<(), RemapError>;
}

impl<S: KeySink + ?Sized> KeySink for &mut S {
    fn write_key(&mut self, key: Key, value: i32) -> Result<(), RemapError> {
        (**self).write_key(key, value)
    }

    fn sync(&mut self) -> Result<(), RemapError> {
        (**self).sync()
    }
}

/// Order in which a chord's two keys are released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChordRelease {
    /// Modifier then key, the same order as press. A chord interrupted
    /// between the two writes leaves the modifier down.
    #[default]
    AsPressed,
    /// Key then modifier
    Reversed,
}

pub struct Injector {
    table: Arc<RemapTable>,
    chord_release: ChordRelease,
}

impl Injector {
    pub fn new(table: Arc<RemapTable>, chord_release: ChordRelease) -> Self {
        Self {
            table,
            chord_release,
        }
    }

    /// Write `decision` to `sink`. Returns `false` when the button is unmapped,
    /// in which case nothing at all is written.
    pub fn inject<S: KeySink + ?Sized>(
        &self,
        decision: &Decision,
        sink: &mut S,
    ) -> Result<bool, RemapError> {
        let Some(output) = self.table.lookup(&decision.button) else {
            trace!(button = %decision.button, "unmapped button ignored");
            return Ok(false);
        };

        let value = decision.transition.value();
        match *output {
            Output::Key(key) => sink.write_key(key, value)?,
            Output::Chord { key, modifier } => {
                if decision.transition == Transition::Release
                    && self.chord_release == ChordRelease::Reversed
                {
                    sink.write_key(key, value)?;
                    sink.write_key(modifier, value)?;
                } else {
                    sink.write_key(modifier, value)?;
                    sink.write_key(key, value)?;
                }
            }
        }
        sink.sync()?;

        debug!("{} -> {}", decision, output);
        Ok(true)
    }

    pub fn table(&self) -> &RemapTable {
        &self.table
    }
}

/// One write seen by a [`RecordingSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkWrite {
    Key(Key, i32),
    Sync,
}

/// Sink that keeps every write in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub writes: Vec<SinkWrite>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySink for RecordingSink {
    fn write_key(&mut self, key: Key, value: i32) -> Result<(), RemapError> {
        self.writes.push(SinkWrite::Key(key, value));
        Ok(())
    }

    fn sync(&mut self) -> Result<(), RemapError> {
        self.writes.push(SinkWrite::Sync);
        Ok(())
    }
}

/// Sink for dry runs: logs writes instead of performing them
#[derive(Debug, Default)]
pub struct LogSink {
    pending: Vec<(Key, i32)>,
}

impl KeySink for LogSink {
    fn write_key(&mut self, key: Key, value: i32) -> Result<(), RemapError> {
        self.pending.push((key, value));
        Ok(())
    }

    fn sync(&mut self) -> Result<(), RemapError> {
        let batch: Vec<String> = self
            .pending
            .drain(..)
            .map(|(key, value)| format!("{key:?}={value}"))
            .collect();
        info!("[dry-run] {}", batch.join(" "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injector(chord_release: ChordRelease) -> Injector {
        let table = RemapTable::new(vec![
            (
                "b1".into(),
                Output::Chord {
                    key: Key::KEY_S,
                    modifier: Key::KEY_LEFTCTRL,
                },
            ),
            ("b5".into(), Output::Key(Key::KEY_B)),
        ])
        .unwrap();
        Injector::new(Arc::new(table), chord_release)
    }

    fn run(injector: &Injector, button: &str, transition: Transition) -> Vec<SinkWrite> {
        let mut sink = RecordingSink::new();
        injector
            .inject(&Decision::new(button.into(), transition), &mut sink)
            .unwrap();
        sink.writes
    }

    #[test]
    fn test_single_key_carries_transition_value() {
        let inj = injector(ChordRelease::AsPressed);
        for t in [Transition::Press, Transition::Hold, Transition::Release] {
            assert_eq!(
                run(&inj, "b5", t),
                vec![SinkWrite::Key(Key::KEY_B, t.value()), SinkWrite::Sync]
            );
        }
    }

    #[test]
    fn test_chord_modifier_first() {
        let inj = injector(ChordRelease::AsPressed);
        assert_eq!(
            run(&inj, "b1", Transition::Press),
            vec![
                SinkWrite::Key(Key::KEY_LEFTCTRL, 1),
                SinkWrite::Key(Key::KEY_S, 1),
                SinkWrite::Sync
            ]
        );
        assert_eq!(
            run(&inj, "b1", Transition::Release),
            vec![
                SinkWrite::Key(Key::KEY_LEFTCTRL, 0),
                SinkWrite::Key(Key::KEY_S, 0),
                SinkWrite::Sync
            ]
        );
    }

    #[test]
    fn test_chord_reversed_release() {
        let inj = injector(ChordRelease::Reversed);
        assert_eq!(
            run(&inj, "b1", Transition::Press)[0],
            SinkWrite::Key(Key::KEY_LEFTCTRL, 1)
        );
        assert_eq!(
            run(&inj, "b1", Transition::Hold)[0],
            SinkWrite::Key(Key::KEY_LEFTCTRL, 2)
        );
        assert_eq!(
            run(&inj, "b1", Transition::Release),
            vec![
                SinkWrite::Key(Key::KEY_S, 0),
                SinkWrite::Key(Key::KEY_LEFTCTRL, 0),
                SinkWrite::Sync
            ]
        );
    }

    #[test]
    fn test_unmapped_writes_nothing() {
        let inj = injector(ChordRelease::AsPressed);
        let mut sink = RecordingSink::new();
        for t in [Transition::Press, Transition::Hold, Transition::Release] {
            let written = inj
                .inject(&Decision::new("b7".into(), t), &mut sink)
                .unwrap();
            assert!(!written);
        }
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn test_chord_release_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            order: ChordRelease,
        }
        let w: Wrapper = toml::from_str("order = \"reversed\"").unwrap();
        assert_eq!(w.order, ChordRelease::Reversed);
        let w: Wrapper = toml::from_str("order = \"as-pressed\"").unwrap();
        assert_eq!(w.order, ChordRelease::AsPressed);
    }
}
