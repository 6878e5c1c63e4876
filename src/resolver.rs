//! Disambiguation of shared key codes
//!
//! Some frame buttons report a code that another button also sends as part of
//! a multi-code combo. The only context kept is the previous raw key event
//! seen on the same source, so only (modifier code, target code) pairs are
//! told apart; deeper combos resolve to whatever the last event implies.
//!
//! Rules for a shared code bound to `[primary, fallback]`:
//!
//! | value | previous event          | emitted                          |
//! |-------|-------------------------|----------------------------------|
//! | 1     | any                     | nothing (wait for hold/release)  |
//! | 2     | any                     | `primary` Hold                   |
//! | 0     | same code, value 2      | `primary` Release                |
//! | 0     | same code, value != 2   | `primary` Press + Release (tap)  |
//! | 0     | other code / none       | nothing (acted as a modifier)    |

use std::sync::Arc;

use tracing::trace;

use crate::event::{Decision, Transition};
use crate::remap::{BindingTable, CodeBinding, LogicalButton};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observed {
    code: u16,
    value: i32,
}

/// Per-source resolver. Each physical source gets its own instance.
#[derive(Debug)]
pub struct AmbiguityResolver {
    bindings: Arc<BindingTable>,
    last: Option<Observed>,
}

impl AmbiguityResolver {
    pub fn new(bindings: Arc<BindingTable>) -> Self {
        Self {
            bindings,
            last: None,
        }
    }

    /// Consume one raw key event and return the decisions it completes.
    ///
    /// Codes without a binding are dropped and leave the context untouched.
    pub fn feed(&mut self, code: u16, value: i32) -> Vec<Decision> {
        let Some(binding) = self.bindings.binding(code) else {
            trace!(code, value, "unbound key code dropped");
            return Vec::new();
        };

        let decisions = match binding {
            CodeBinding::Single(button) => Transition::from_value(value)
                .map(|t| vec![Decision::new(button.clone(), t)])
                .unwrap_or_default(),
            CodeBinding::Ambiguous { primary, .. } => self.resolve_shared(primary, code, value),
        };

        self.last = Some(Observed { code, value });
        decisions
    }

    fn resolve_shared(&self, primary: &LogicalButton, code: u16, value: i32) -> Vec<Decision> {
        match Transition::from_value(value) {
            Some(Transition::Hold) => vec![Decision::new(primary.clone(), Transition::Hold)],
            Some(Transition::Release) => match self.last {
                Some(last) if last.code == code && last.value == Transition::Hold.value() => {
                    vec![Decision::new(primary.clone(), Transition::Release)]
                }
                Some(last) if last.code == code => Decision::tap(primary).to_vec(),
                _ => {
                    trace!(code, "shared code released after another code, suppressed");
                    Vec::new()
                }
            },
            Some(Transition::Press) | None => Vec::new(),
        }
    }
}
