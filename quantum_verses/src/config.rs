//! Application and per-verse configuration
//!
//! Verse options arrive as a flat `name -> value` map (from the TOML config
//! file or `--set key=value` flags). Each animation reads them exactly once
//! through an [`OptionReader`] into its own typed config struct, so defaults
//! and validation live in one place per animation.

use crate::error::{Result, VerseError};
use crate::route::VerseId;
use crate::scheduler::TickMode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::Path;

/// A single option value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl OptionValue {
    /// Parse a command-line value: booleans, then numbers, then free text
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => raw
                .parse::<f64>()
                .map(Self::Number)
                .unwrap_or_else(|_| Self::Text(raw.to_string())),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
        }
    }
}

/// Flat option map handed to an animation factory
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: OptionValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: OptionValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Apply a `key=value` override
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| VerseError::invalid_option(assignment, "expected key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(VerseError::invalid_option(assignment, "empty key"));
        }
        self.set(key, OptionValue::parse(raw.trim()));
        Ok(())
    }

    /// Overlay `other` on top of these options
    pub fn merged(&self, other: &Options) -> Options {
        let mut merged = self.clone();
        for (k, v) in &other.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Typed, validating access to an [`Options`] map
pub struct OptionReader<'a> {
    scene: &'static str,
    options: &'a Options,
    consumed: Vec<&'static str>,
}

impl<'a> OptionReader<'a> {
    pub fn new(scene: &'static str, options: &'a Options) -> Self {
        Self {
            scene,
            options,
            consumed: Vec::new(),
        }
    }

    fn lookup(&mut self, key: &'static str) -> Option<&'a OptionValue> {
        self.consumed.push(key);
        self.options.get(key)
    }

    fn mismatch(key: &str, expected: &str, found: &OptionValue) -> VerseError {
        VerseError::invalid_option(key, format!("expected {expected}, found {}", found.kind()))
    }

    pub fn number(&mut self, key: &'static str, default: f32) -> Result<f32> {
        match self.lookup(key) {
            None => Ok(default),
            Some(OptionValue::Number(n)) if n.is_finite() => Ok(*n as f32),
            Some(OptionValue::Number(_)) => {
                Err(VerseError::invalid_option(key, "must be finite"))
            }
            Some(other) => Err(Self::mismatch(key, "number", other)),
        }
    }

    pub fn number_in(
        &mut self,
        key: &'static str,
        default: f32,
        range: RangeInclusive<f32>,
    ) -> Result<f32> {
        let value = self.number(key, default)?;
        if range.contains(&value) {
            Ok(value)
        } else {
            Err(VerseError::invalid_option(
                key,
                format!("{value} outside {}..={}", range.start(), range.end()),
            ))
        }
    }

    /// Non-negative whole number no larger than `max`
    pub fn count(&mut self, key: &'static str, default: usize, max: usize) -> Result<usize> {
        let value = self.number(key, default as f32)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(VerseError::invalid_option(key, "must be a whole number"));
        }
        let value = value as usize;
        if value > max {
            return Err(VerseError::invalid_option(key, format!("{value} exceeds {max}")));
        }
        Ok(value)
    }

    pub fn flag(&mut self, key: &'static str, default: bool) -> Result<bool> {
        match self.lookup(key) {
            None => Ok(default),
            Some(OptionValue::Bool(b)) => Ok(*b),
            Some(other) => Err(Self::mismatch(key, "boolean", other)),
        }
    }

    /// Color given as `#rrggbb` or `#rrggbbaa`
    pub fn color(&mut self, key: &'static str, default: [f32; 4]) -> Result<[f32; 4]> {
        match self.lookup(key) {
            None => Ok(default),
            Some(OptionValue::Text(text)) => parse_hex_color(text)
                .ok_or_else(|| VerseError::invalid_option(key, format!("bad color `{text}`"))),
            Some(other) => Err(Self::mismatch(key, "color string", other)),
        }
    }

    /// Optional RNG seed for reproducible runs
    pub fn seed(&mut self) -> Result<Option<u64>> {
        match self.lookup("seed") {
            None => Ok(None),
            Some(OptionValue::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Ok(Some(*n as u64)),
            Some(_) => Err(VerseError::invalid_option(
                "seed",
                "must be a non-negative whole number",
            )),
        }
    }

    /// Warn about options no getter asked for
    pub fn finish(self) {
        for key in self.options.keys() {
            if !self.consumed.iter().any(|c| *c == key) {
                log::warn!("{}: ignoring unknown option `{}`", self.scene, key);
            }
        }
    }
}

pub fn parse_hex_color(text: &str) -> Option<[f32; 4]> {
    let hex = text.strip_prefix('#')?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(|v| v as f32 / 255.0);
    let alpha = if hex.len() == 8 { channel(6)? } else { 1.0 };
    Some([channel(0)?, channel(2)?, channel(4)?, alpha])
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Quantum Verses".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Fixed simulation step in seconds; variable stepping when absent
    pub fixed_step: Option<f32>,
    /// Upper bound on a variable frame delta
    pub max_delta: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fixed_step: None,
            max_delta: 0.1,
        }
    }
}

impl FrameConfig {
    pub fn tick_mode(&self) -> TickMode {
        match self.fixed_step {
            Some(step) if step > 0.0 => TickMode::Fixed { step },
            _ => TickMode::Variable {
                max_delta: self.max_delta.max(f32::EPSILON),
            },
        }
    }
}

/// Top-level configuration file
///
/// ```toml
/// start_verse = 1
///
/// [window]
/// width = 1600
///
/// [verses.1]
/// electronCount = 250
/// measurementEnabled = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub frame: FrameConfig,
    pub start_verse: u32,
    pub verses: BTreeMap<String, Options>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            frame: FrameConfig::default(),
            start_verse: 1,
            verses: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Option tables keyed by verse id
    pub fn verse_options(&self) -> Result<BTreeMap<VerseId, Options>> {
        self.verses
            .iter()
            .map(|(key, options)| {
                let id = key
                    .parse::<u32>()
                    .map_err(|_| VerseError::invalid_option(key, "verse tables must be numbered"))?;
                Ok((VerseId(id), options.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_falls_back_to_defaults() {
        let options = Options::new();
        let mut reader = OptionReader::new("test", &options);
        assert_eq!(reader.number("speed", 2.5).unwrap(), 2.5);
        assert!(!reader.flag("enabled", false).unwrap());
        assert_eq!(reader.seed().unwrap(), None);
    }

    #[test]
    fn reader_rejects_wrong_types_and_ranges() {
        let options = Options::new()
            .with("speed", OptionValue::Text("fast".into()))
            .with("p", OptionValue::Number(1.5))
            .with("count", OptionValue::Number(2.5));
        let mut reader = OptionReader::new("test", &options);
        assert!(reader.number("speed", 1.0).is_err());
        assert!(reader.number_in("p", 0.5, 0.0..=1.0).is_err());
        assert!(reader.count("count", 1, 10).is_err());
    }

    #[test]
    fn overrides_are_typed() {
        let mut options = Options::new();
        options.apply_override("measurementEnabled=true").unwrap();
        options.apply_override("electronCount = 42").unwrap();
        options.apply_override("particleColor=#ff8800").unwrap();
        assert_eq!(options.get("measurementEnabled"), Some(&OptionValue::Bool(true)));
        assert_eq!(options.get("electronCount"), Some(&OptionValue::Number(42.0)));
        assert!(options.apply_override("novalue").is_err());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ff0000"), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(parse_hex_color("#00000000"), Some([0.0, 0.0, 0.0, 0.0]));
        assert_eq!(parse_hex_color("ff0000"), None);
        assert_eq!(parse_hex_color("#ff00"), None);
    }

    #[test]
    fn config_file_parses_verse_tables() {
        let config = AppConfig::from_toml(
            r##"
start_verse = 4

[frame]
fixed_step = 0.02

[verses.1]
electronCount = 250
measurementEnabled = true
particleColor = "#33ccff"
"##,
        )
        .unwrap();

        assert_eq!(config.start_verse, 4);
        assert_eq!(config.window.width, 1280);
        assert!(matches!(config.frame.tick_mode(), TickMode::Fixed { .. }));

        let verses = config.verse_options().unwrap();
        let first = &verses[&VerseId(1)];
        assert_eq!(first.get("electronCount"), Some(&OptionValue::Number(250.0)));
        assert_eq!(first.get("measurementEnabled"), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn non_numeric_verse_table_is_rejected() {
        let config = AppConfig::from_toml("[verses.intro]\nx = 1\n").unwrap();
        assert!(config.verse_options().is_err());
    }
}
