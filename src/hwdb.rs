//! udev hwdb rule for the tablet's frame scancodes
//!
//! The tablet reports raw HID scancodes that the kernel turns into arbitrary
//! keys. The remapper expects them translated first into the letter keys its
//! code bindings use. That translation lives in a hwdb file installed by the
//! user; this module only renders its text.

/// Install location suggested in the rendered header
pub const HWDB_PATH: &str = "/etc/udev/hwdb.d/90-xppen-innovator16.hwdb";

/// Input device version in the match expression
const DEVICE_VERSION: u16 = 0x0100;

/// One `KEYBOARD_KEY_<scancode>=<key>` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScancodeEntry {
    pub scancode: u32,
    pub key: &'static str,
    pub note: Option<&'static str>,
}

const fn entry(scancode: u32, key: &'static str, note: Option<&'static str>) -> ScancodeEntry {
    ScancodeEntry {
        scancode,
        key,
        note,
    }
}

/// Scancode table of the Innovator 16
pub const SCANCODES: &[ScancodeEntry] = &[
    entry(0x70005, "a", Some("frame: top button")),
    entry(0x70008, "b", None),
    entry(0x700e2, "c", None),
    entry(0x7002c, "d", None),
    entry(0x70019, "e", Some("below the wheels")),
    entry(0x70016, "f", None),
    entry(0x700e0, "unknown", Some("sent together with 7001d")),
    entry(0x7001d, "h", None),
    entry(0x70011, "i", Some("last button sends 700e0 + 700e2 + 70011")),
    entry(0x70057, "j", Some("outer wheel clockwise")),
    entry(0x70056, "k", Some("outer wheel anti-clockwise")),
    entry(0xd0044, "btn_middle", Some("pen: button towards tip")),
    entry(0xd0045, "btn_right", Some("pen: button towards rear")),
];

/// hwdb match expression for a USB device
pub fn match_expression(vendor: u16, product: u16) -> String {
    format!("evdev:input:b0003v{vendor:04X}p{product:04X}e{DEVICE_VERSION:04X}*")
}

/// Full hwdb file text, with install instructions as comments
pub fn render(vendor: u16, product: u16) -> String {
    let mut out = format!(
        "# Scancode remapping for xppen-remap\n\
         # Install as {HWDB_PATH}, then run:\n\
         #   sudo systemd-hwdb update\n\
         #   sudo udevadm control --reload\n\
         #   sudo udevadm trigger\n\
         {}\n",
        match_expression(vendor, product)
    );
    for e in SCANCODES {
        let line = format!(" KEYBOARD_KEY_{:x}={}", e.scancode, e.key);
        let line = match e.note {
            Some(note) => format!("{line:<32}# {note}\n"),
            None => format!("{line}\n"),
        };
        out.push_str(&line);
    }
    out
}
