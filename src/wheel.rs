//! Rotary wheel to button tap translation

use evdev::RelativeAxisType;

use crate::event::Decision;
use crate::remap::LogicalButton;

/// Turns high-resolution wheel motion into one tap per report
#[derive(Debug, Clone)]
pub struct WheelTranslator {
    top: LogicalButton,
    bottom: LogicalButton,
}

impl WheelTranslator {
    pub fn new(top: LogicalButton, bottom: LogicalButton) -> Self {
        Self { top, bottom }
    }

    /// Positive motion taps `top`, zero or negative taps `bottom`.
    /// Magnitude is ignored and nothing accumulates between reports.
    /// Axes other than `REL_WHEEL_HI_RES` yield `None`.
    pub fn feed(&self, axis: u16, value: i32) -> Option<[Decision; 2]> {
        if axis != RelativeAxisType::REL_WHEEL_HI_RES.0 {
            return None;
        }
        let button = if value > 0 { &self.top } else { &self.bottom };
        Some(Decision::tap(button))
    }
}
