//! Configuration for the remapper
//!
//! The config is read from TOML once at startup and turned into the immutable
//! [`RemapTable`] and [`BindingTable`]. Key names are evdev names such as
//! `"KEY_S"` or `"BTN_MIDDLE"`; the `KEY_` prefix may be omitted.
//! A chord is written `[key, modifier]`, a plain key as a bare string.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use evdev::Key;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::device::DeviceFilter;
use crate::error::RemapError;
use crate::event::SourceKind;
use crate::injector::ChordRelease;
use crate::remap::{BindingTable, CodeBinding, LogicalButton, Output, RemapTable};

/// Vendor ID of the XP-Pen Innovator 16
pub const DEFAULT_VENDOR_ID: u16 = 0x28bd;
/// Product ID of the XP-Pen Innovator 16
pub const DEFAULT_PRODUCT_ID: u16 = 0x092c;

/// Resolve an evdev key name, with or without the `KEY_` prefix
pub fn key_from_name(name: &str) -> Option<Key> {
    let upper = name.trim().to_ascii_uppercase();
    Key::from_str(&upper)
        .or_else(|_| Key::from_str(&format!("KEY_{upper}")))
        .ok()
}

fn key_name(key: Key) -> String {
    format!("{key:?}")
}

// ---------------------------------------------------------------------------
// Custom serde: keys as names, outputs as a name or a [key, modifier] list
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

fn parse_key<E: serde::de::Error>(name: &str) -> Result<Key, E> {
    key_from_name(name).ok_or_else(|| E::custom(format!("unknown key name: \"{name}\"")))
}

fn serialize_key<S: Serializer>(key: &Key, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&key_name(*key))
}

fn deserialize_key<'de, D: Deserializer<'de>>(d: D) -> Result<Key, D::Error> {
    let name = String::deserialize(d)?;
    parse_key(&name)
}

fn serialize_output<S: Serializer>(output: &Output, s: S) -> Result<S::Ok, S::Error> {
    match output {
        Output::Key(key) => serialize_key(key, s),
        Output::Chord { key, modifier } => s.collect_seq([key_name(*key), key_name(*modifier)]),
    }
}

fn deserialize_output<'de, D: Deserializer<'de>>(d: D) -> Result<Output, D::Error> {
    let names = OneOrMany::<String>::deserialize(d)?.into_vec();
    match names.as_slice() {
        [key] => Ok(Output::Key(parse_key::<D::Error>(key)?)),
        [key, modifier] => Ok(Output::Chord {
            key: parse_key::<D::Error>(key)?,
            modifier: parse_key::<D::Error>(modifier)?,
        }),
        _ => Err(serde::de::Error::custom(format!(
            "expected one key or [key, modifier], got {} keys",
            names.len()
        ))),
    }
}

fn serialize_candidates<S: Serializer>(buttons: &[LogicalButton], s: S) -> Result<S::Ok, S::Error> {
    match buttons {
        [single] => single.serialize(s),
        _ => s.collect_seq(buttons),
    }
}

fn deserialize_candidates<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<LogicalButton>, D::Error> {
    Ok(OneOrMany::<LogicalButton>::deserialize(d)?.into_vec())
}

/// Output for one logical button
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub name: LogicalButton,
    #[serde(
        serialize_with = "serialize_output",
        deserialize_with = "deserialize_output"
    )]
    pub keys: Output,
}

impl ButtonConfig {
    fn new(name: &str, keys: Output) -> Self {
        Self {
            name: LogicalButton::new(name),
            keys,
        }
    }
}

/// Logical button(s) behind one raw key code.
/// Two entries mark a shared code: `[primary, fallback]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeConfig {
    #[serde(serialize_with = "serialize_key", deserialize_with = "deserialize_key")]
    pub code: Key,
    #[serde(
        serialize_with = "serialize_candidates",
        deserialize_with = "deserialize_candidates"
    )]
    pub buttons: Vec<LogicalButton>,
}

impl CodeConfig {
    fn new(code: Key, buttons: &[&str]) -> Self {
        Self {
            code,
            buttons: buttons.iter().map(|&b| LogicalButton::new(b)).collect(),
        }
    }

    fn binding(&self) -> Result<CodeBinding, RemapError> {
        match self.buttons.as_slice() {
            [button] => Ok(CodeBinding::Single(button.clone())),
            [primary, fallback] => Ok(CodeBinding::Ambiguous {
                primary: primary.clone(),
                fallback: fallback.clone(),
            }),
            _ => Err(RemapError::Config(format!(
                "code {} must name one button or [primary, fallback], got {}",
                key_name(self.code),
                self.buttons.len()
            ))),
        }
    }
}

/// Complete remapper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    /// Name for the virtual output device
    pub device_name: String,
    /// Vendor ID of the physical tablet
    pub vendor_id: u16,
    /// Product ID of the physical tablet
    pub product_id: u16,
    /// Name substrings of the source nodes: `[keyboard, mouse]`
    pub source_names: Vec<String>,
    /// Button tapped on positive wheel motion
    pub wheel_top: LogicalButton,
    /// Button tapped on zero or negative wheel motion
    pub wheel_bottom: LogicalButton,
    /// Release order for chords
    pub chord_release: ChordRelease,
    /// Logical button outputs, in order
    pub buttons: Vec<ButtonConfig>,
    /// Raw code bindings
    pub codes: Vec<CodeConfig>,
}

impl Default for RemapConfig {
    fn default() -> Self {
        let chord = |key, modifier| Output::Chord { key, modifier };
        Self {
            device_name: "XP-Pen Innovator 16 Buttons".to_string(),
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            source_names: SourceKind::ALL
                .iter()
                .map(|kind| kind.name_hint().to_string())
                .collect(),
            wheel_top: LogicalButton::new("iwt"),
            wheel_bottom: LogicalButton::new("iwb"),
            chord_release: ChordRelease::default(),
            buttons: vec![
                ButtonConfig::new("b1", chord(Key::KEY_S, Key::KEY_LEFTCTRL)),
                ButtonConfig::new("b2", chord(Key::KEY_W, Key::KEY_LEFTCTRL)),
                ButtonConfig::new("b3", Output::Key(Key::KEY_SEMICOLON)),
                ButtonConfig::new("b4", Output::Key(Key::KEY_BACKSLASH)),
                ButtonConfig::new("b5", Output::Key(Key::KEY_B)),
                ButtonConfig::new("b6", Output::Key(Key::KEY_E)),
                ButtonConfig::new("b7", Output::Key(Key::KEY_LEFTSHIFT)),
                ButtonConfig::new("b8", Output::Key(Key::KEY_LEFTCTRL)),
                // Outer wheel clockwise / anti-clockwise
                ButtonConfig::new("owr", Output::Key(Key::KEY_O)),
                ButtonConfig::new("owl", Output::Key(Key::KEY_I)),
                // Inner wheel top / bottom
                ButtonConfig::new("iwt", Output::Key(Key::KEY_L)),
                ButtonConfig::new("iwb", Output::Key(Key::KEY_K)),
            ],
            codes: vec![
                CodeConfig::new(Key::KEY_A, &["b1"]),
                CodeConfig::new(Key::KEY_B, &["b2"]),
                // b8 sends C together with I
                CodeConfig::new(Key::KEY_C, &["b3", "b8"]),
                CodeConfig::new(Key::KEY_D, &["b4"]),
                CodeConfig::new(Key::KEY_E, &["b5"]),
                CodeConfig::new(Key::KEY_F, &["b6"]),
                CodeConfig::new(Key::KEY_H, &["b7"]),
                CodeConfig::new(Key::KEY_I, &["b8"]),
                CodeConfig::new(Key::KEY_J, &["owr"]),
                CodeConfig::new(Key::KEY_K, &["owl"]),
            ],
        }
    }
}

impl RemapConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xppen-remap")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: RemapConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Which evdev nodes to take over
    pub fn device_filter(&self) -> Result<DeviceFilter, RemapError> {
        match self.source_names.as_slice() {
            [keyboard, mouse] if !keyboard.is_empty() && !mouse.is_empty() => Ok(
                DeviceFilter::with_names(self.vendor_id, self.product_id, keyboard, mouse),
            ),
            names => Err(RemapError::Config(format!(
                "source_names must be two non-empty names [keyboard, mouse], got {names:?}"
            ))),
        }
    }

    pub fn remap_table(&self) -> Result<RemapTable, RemapError> {
        RemapTable::new(
            self.buttons
                .iter()
                .map(|b| (b.name.clone(), b.keys))
                .collect(),
        )
    }

    pub fn binding_table(&self) -> Result<BindingTable, RemapError> {
        let bindings = self
            .codes
            .iter()
            .map(|c| Ok((c.code.code(), c.binding()?)))
            .collect::<Result<Vec<_>, RemapError>>()?;
        BindingTable::new(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_name() {
        assert_eq!(key_from_name("KEY_S"), Some(Key::KEY_S));
        assert_eq!(key_from_name("leftctrl"), Some(Key::KEY_LEFTCTRL));
        assert_eq!(key_from_name("BTN_MIDDLE"), Some(Key::BTN_MIDDLE));
        assert_eq!(key_from_name("KEY_NOPE"), None);
    }

    #[test]
    fn test_default_config_serializes() {
        let toml_str = RemapConfig::default().to_toml().unwrap();
        assert!(toml_str.contains("XP-Pen Innovator 16 Buttons"));
        assert!(toml_str.contains("\"KEY_LEFTCTRL\""));
        assert!(toml_str.contains("keys = \"KEY_SEMICOLON\""));
        assert!(toml_str.contains("buttons = \"b1\""));
        assert!(toml_str.contains("chord_release = \"as-pressed\""));
        assert!(toml_str.contains("source_names"));
    }

    #[test]
    fn test_roundtrip() {
        let config = RemapConfig::default();
        let parsed: RemapConfig = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.buttons.len(), config.buttons.len());
        assert_eq!(parsed.codes.len(), config.codes.len());
        assert_eq!(parsed.vendor_id, DEFAULT_VENDOR_ID);
        assert_eq!(
            parsed.buttons[0].keys,
            Output::Chord {
                key: Key::KEY_S,
                modifier: Key::KEY_LEFTCTRL
            }
        );
    }

    #[test]
    fn test_default_tables() {
        let config = RemapConfig::default();
        let table = config.remap_table().unwrap();
        let bindings = config.binding_table().unwrap();
        assert_eq!(table.len(), 12);
        assert_eq!(bindings.len(), 10);
        assert_eq!(
            bindings.binding(Key::KEY_C.code()),
            Some(&CodeBinding::Ambiguous {
                primary: "b3".into(),
                fallback: "b8".into()
            })
        );
        assert!(bindings.binding(Key::KEY_G.code()).is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: RemapConfig = toml::from_str(
            r#"
device_name = "My Tablet"
vendor_id = 0x28bd
chord_release = "reversed"
"#,
        )
        .unwrap();
        assert_eq!(config.device_name, "My Tablet");
        assert_eq!(config.chord_release, ChordRelease::Reversed);
        assert_eq!(config.buttons.len(), 12);
    }

    #[test]
    fn test_custom_tables_parse() {
        let config: RemapConfig = toml::from_str(
            r#"
[[buttons]]
name = "b1"
keys = ["Z", "LEFTCTRL"]

[[buttons]]
name = "b2"
keys = ["KEY_Y"]

[[codes]]
code = "KEY_A"
buttons = "b1"

[[codes]]
code = "KEY_C"
buttons = ["b2", "b1"]
"#,
        )
        .unwrap();
        let table = config.remap_table().unwrap();
        assert_eq!(
            table.lookup(&"b1".into()),
            Some(&Output::Chord {
                key: Key::KEY_Z,
                modifier: Key::KEY_LEFTCTRL
            })
        );
        assert_eq!(table.lookup(&"b2".into()), Some(&Output::Key(Key::KEY_Y)));
        let bindings = config.binding_table().unwrap();
        assert_eq!(
            bindings.binding(Key::KEY_A.code()),
            Some(&CodeBinding::Single("b1".into()))
        );
    }

    #[test]
    fn test_three_key_chord_rejected() {
        let result: Result<RemapConfig, _> = toml::from_str(
            r#"
[[buttons]]
name = "b1"
keys = ["KEY_A", "KEY_LEFTCTRL", "KEY_LEFTSHIFT"]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<RemapConfig, _> = toml::from_str(
            r#"
[[codes]]
code = "KEY_NOT_A_KEY"
buttons = "b1"
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("KEY_NOT_A_KEY"));
    }

    #[test]
    fn test_three_candidates_rejected() {
        let config: RemapConfig = toml::from_str(
            r#"
[[codes]]
code = "KEY_C"
buttons = ["b3", "b8", "b7"]
"#,
        )
        .unwrap();
        assert!(matches!(
            config.binding_table(),
            Err(RemapError::Config(_))
        ));
    }

    #[test]
    fn test_source_names() {
        let filter = RemapConfig::default().device_filter().unwrap();
        assert_eq!(filter, DeviceFilter::new(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID));

        let config: RemapConfig = toml::from_str("source_names = [\"Pad\", \"Wheel\"]").unwrap();
        let filter = config.device_filter().unwrap();
        assert_eq!(filter.name_for(SourceKind::Keyboard), "Pad");
        assert_eq!(
            filter.classify(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID, "Tablet Wheel"),
            Some(SourceKind::Mouse)
        );
        assert!(config.to_toml().unwrap().contains("\"Wheel\""));
    }

    #[test]
    fn test_bad_source_names_rejected() {
        for names in [r#"["Keyboard"]"#, r#"["Keyboard", ""]"#, r#"["a", "b", "c"]"#] {
            let config: RemapConfig = toml::from_str(&format!("source_names = {names}")).unwrap();
            assert!(
                matches!(config.device_filter(), Err(RemapError::Config(_))),
                "{names}"
            );
        }
    }

    #[test]
    fn test_missing_file_gives_default() {
        let config = RemapConfig::load(Path::new("/nonexistent/xppen-remap.toml")).unwrap();
        assert_eq!(config.vendor_id, DEFAULT_VENDOR_ID);
    }
}
