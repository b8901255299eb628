// crates/strict-config/src/file.rs
// ============================================================================
// Module: File Source
// Description: Config source reading flat YAML documents from disk.
// Purpose: Load top-level scalar key/value pairs with YAML 1.1 scalar rules.
// Dependencies: yaml-rust2
// ============================================================================

//! ## Overview
//! The file source reads one flat YAML mapping. Only top-level pairs are
//! consumed; nested sequences and mappings are not traversed and surface as
//! composite markers that the registry rejects for declared keys.
//!
//! Plain (unquoted) scalars resolve with YAML 1.1 rules: `yes`, `on`, `true`
//! and `no`, `off`, `false` in any case become booleans. An unquoted `yes`
//! therefore reads back as `"true"`; quote it to keep the literal word.
//! Quoted, block, and explicitly tagged scalars always stay strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use yaml_rust2::Event;
use yaml_rust2::parser::Parser;
use yaml_rust2::parser::Tag;
use yaml_rust2::scanner::Marker;
use yaml_rust2::scanner::TScalarStyle;

use crate::coerce::RawValue;
use crate::error::RegistryError;
use crate::source::ConfigSource;
use crate::source::SourceValues;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum configuration file size in bytes.
pub const DEFAULT_MAX_CONFIG_FILE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`FileSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSourceConfig {
    /// Path of the YAML document.
    pub path: PathBuf,
    /// Maximum accepted file size in bytes.
    pub max_file_bytes: usize,
}

impl FileSourceConfig {
    /// Returns a configuration for `path` with default limits.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_file_bytes: DEFAULT_MAX_CONFIG_FILE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Source Implementation
// ============================================================================

/// Config source backed by a flat YAML file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    /// Path and limit settings.
    config: FileSourceConfig,
}

impl FileSource {
    /// Creates a source for `path` with default limits.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(FileSourceConfig::new(path))
    }

    /// Creates a source from explicit configuration.
    #[must_use]
    pub const fn with_config(config: FileSourceConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the configured path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl ConfigSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Result<SourceValues, RegistryError> {
        let content = read_limited(&self.config.path, self.config.max_file_bytes)?;
        parse_flat_yaml(&content)
    }
}

/// Reads a UTF-8 file, enforcing the size limit.
fn read_limited(path: &Path, max_bytes: usize) -> Result<String, RegistryError> {
    let bytes = fs::read(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            RegistryError::FileNotFound(path.display().to_string())
        } else {
            RegistryError::Io(format!("{}: {err}", path.display()))
        }
    })?;
    if bytes.len() > max_bytes {
        return Err(RegistryError::InvalidSource("config file exceeds size limit".to_string()));
    }
    String::from_utf8(bytes)
        .map_err(|_| RegistryError::InvalidSource("config file must be utf-8".to_string()))
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a flat YAML document into raw top-level values.
///
/// An empty stream or a document holding only null yields no values.
///
/// # Errors
///
/// Returns [`RegistryError::Parse`] for syntax errors, a non-mapping top
/// level, more than one document, non-scalar or duplicate keys, and aliases to
/// unknown anchors.
pub fn parse_flat_yaml(content: &str) -> Result<SourceValues, RegistryError> {
    let mut reader = FlatReader {
        parser: Parser::new_from_str(content),
        anchors: BTreeMap::new(),
    };
    let mut values = SourceValues::new();
    let mut documents = 0_usize;
    loop {
        let (event, _) = reader.next_event()?;
        match event {
            Event::StreamEnd => break,
            Event::DocumentStart => {
                documents += 1;
                if documents > 1 {
                    return Err(parse_error("multiple documents are not supported"));
                }
                reader.read_root(&mut values)?;
            }
            _ => {}
        }
    }
    Ok(values)
}

/// Event reader tracking anchors for alias resolution.
struct FlatReader<'a> {
    /// Underlying YAML event parser.
    parser: Parser<std::str::Chars<'a>>,
    /// Resolved values keyed by anchor id.
    anchors: BTreeMap<usize, RawValue>,
}

impl FlatReader<'_> {
    /// Pulls the next parser event.
    fn next_event(&mut self) -> Result<(Event, Marker), RegistryError> {
        self.parser.next_token().map_err(|err| RegistryError::Parse(err.to_string()))
    }

    /// Reads the document root, which must be a mapping or null.
    fn read_root(&mut self, values: &mut SourceValues) -> Result<(), RegistryError> {
        let (event, marker) = self.next_event()?;
        match event {
            Event::MappingStart(..) => self.read_mapping(values),
            Event::Scalar(text, TScalarStyle::Plain, _, None) if is_null(&text) => Ok(()),
            Event::DocumentEnd => Ok(()),
            _ => Err(parse_error_at("top-level value must be a mapping", marker)),
        }
    }

    /// Reads top-level pairs until the closing mapping event.
    fn read_mapping(&mut self, values: &mut SourceValues) -> Result<(), RegistryError> {
        loop {
            let (event, marker) = self.next_event()?;
            let key = match event {
                Event::MappingEnd => return Ok(()),
                Event::Scalar(text, ..) => text,
                _ => return Err(parse_error_at("mapping keys must be scalars", marker)),
            };
            let value = self.read_value()?;
            if values.contains_key(&key) {
                return Err(parse_error_at(&format!("duplicate key {key}"), marker));
            }
            values.insert(key, value);
        }
    }

    /// Reads one value, collapsing collections into composite markers.
    fn read_value(&mut self) -> Result<RawValue, RegistryError> {
        let (event, marker) = self.next_event()?;
        match event {
            Event::Scalar(text, style, anchor, tag) => {
                let value = resolve_scalar(&text, style, tag.as_ref());
                self.remember(anchor, &value);
                Ok(value)
            }
            Event::SequenceStart(anchor, _) => {
                self.remember(anchor, &RawValue::Sequence);
                self.skip_collection()?;
                Ok(RawValue::Sequence)
            }
            Event::MappingStart(anchor, _) => {
                self.remember(anchor, &RawValue::Mapping);
                self.skip_collection()?;
                Ok(RawValue::Mapping)
            }
            Event::Alias(anchor) => self
                .anchors
                .get(&anchor)
                .cloned()
                .ok_or_else(|| parse_error_at("alias refers to an unknown anchor", marker)),
            _ => Err(parse_error_at("unexpected value", marker)),
        }
    }

    /// Consumes a nested collection, recording any anchors inside it.
    fn skip_collection(&mut self) -> Result<(), RegistryError> {
        let mut depth = 1_usize;
        while depth > 0 {
            let (event, marker) = self.next_event()?;
            match event {
                Event::SequenceStart(anchor, _) => {
                    self.remember(anchor, &RawValue::Sequence);
                    depth += 1;
                }
                Event::MappingStart(anchor, _) => {
                    self.remember(anchor, &RawValue::Mapping);
                    depth += 1;
                }
                Event::SequenceEnd | Event::MappingEnd => depth -= 1,
                Event::Scalar(text, style, anchor, tag) => {
                    let value = resolve_scalar(&text, style, tag.as_ref());
                    self.remember(anchor, &value);
                }
                Event::StreamEnd => return Err(parse_error_at("unterminated collection", marker)),
                _ => {}
            }
        }
        Ok(())
    }

    /// Records an anchored value; id 0 means no anchor.
    fn remember(&mut self, anchor: usize, value: &RawValue) {
        if anchor > 0 {
            self.anchors.insert(anchor, value.clone());
        }
    }
}

// ============================================================================
// SECTION: Scalar Resolution
// ============================================================================

/// Resolves a scalar to a raw value using YAML 1.1 rules for plain style.
fn resolve_scalar(text: &str, style: TScalarStyle, tag: Option<&Tag>) -> RawValue {
    if style != TScalarStyle::Plain || tag.is_some() {
        return RawValue::String(text.to_string());
    }
    if is_null(text) {
        return RawValue::Null;
    }
    if let Some(flag) = parse_bool(text) {
        return RawValue::Bool(flag);
    }
    if let Some(value) = parse_integer(text) {
        return value;
    }
    if let Some(value) = parse_float(text) {
        return RawValue::Float(value);
    }
    RawValue::String(text.to_string())
}

/// Returns true for YAML null spellings.
fn is_null(text: &str) -> bool {
    matches!(text, "" | "~" | "null" | "Null" | "NULL")
}

/// Parses YAML 1.1 boolean words.
fn parse_bool(text: &str) -> Option<bool> {
    let matches_any = |words: &[&str]| words.iter().any(|word| text.eq_ignore_ascii_case(word));
    if matches_any(&["yes", "true", "on"]) {
        Some(true)
    } else if matches_any(&["no", "false", "off"]) {
        Some(false)
    } else {
        None
    }
}

/// Parses decimal, hex (`0x`), binary (`0b`), and octal (`0o` or leading `0`)
/// integers with optional sign and `_` separators. Decimal digits must start
/// with a digit, so `_1` stays a string.
///
/// Integers that overflow `i64` are kept as their literal text.
fn parse_integer(text: &str) -> Option<RawValue> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(rest) = unsigned.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = unsigned.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = unsigned.strip_prefix("0o") {
        (8, rest)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else if unsigned.starts_with(|ch: char| ch.is_ascii_digit()) {
        (10, unsigned)
    } else {
        return None;
    };
    let digits: String = digits.chars().filter(|ch| *ch != '_').collect();
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    Some(i64::try_from(signed).map_or_else(|_| RawValue::String(text.to_string()), RawValue::Integer))
}

/// Parses YAML floats, including `.inf` and `.nan` spellings.
fn parse_float(text: &str) -> Option<f64> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if matches!(unsigned, ".inf" | ".Inf" | ".INF") {
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }
    if matches!(text, ".nan" | ".NaN" | ".NAN") {
        return Some(f64::NAN);
    }
    if unsigned.starts_with('_') {
        return None;
    }
    let cleaned: String = text.chars().filter(|ch| *ch != '_').collect();
    let has_digit = cleaned.chars().any(|ch| ch.is_ascii_digit());
    let well_formed =
        cleaned.chars().all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '-' | '+'));
    if !has_digit || !well_formed || !cleaned.contains(['.', 'e', 'E']) {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Builds a parse error without position information.
fn parse_error(message: &str) -> RegistryError {
    RegistryError::Parse(message.to_string())
}

/// Builds a parse error annotated with the event position.
fn parse_error_at(message: &str, marker: Marker) -> RegistryError {
    RegistryError::Parse(format!("{message} at line {} column {}", marker.line(), marker.col()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
