//! Label map reading, building, and writing.
//!
//! A label map assigns each class name a positive integer id. The on-disk
//! form is the protobuf text format detection trainers consume:
//!
//! ```text
//! item {
//!   name: "cat"
//!   id: 1
//! }
//! ```
//!
//! An existing non-empty file is loaded as-is so that ids already handed to a
//! training run never shift. Otherwise the map is derived from the class
//! names observed across the annotation set, sorted lexicographically, ids
//! assigned from 1, and written back.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ConvertError;
use crate::voc::VocAnnotation;

/// One `item { ... }` entry of a label map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMapEntry {
    pub name: String,
    pub id: i64,
}

/// Bidirectional class-name/id mapping.
#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    entries: Vec<LabelMapEntry>,
    id_by_name: BTreeMap<String, i64>,
    name_by_id: BTreeMap<i64, String>,
}

/// How [`build_or_load`] obtained the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMapSource {
    /// An existing non-empty file was loaded as-is.
    Loaded,
    /// The map was derived from the annotation set and written out.
    Built,
}

impl LabelMap {
    /// Builds a map from class names in the given order, assigning ids from 1.
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let entries = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| LabelMapEntry {
                name,
                id: (idx + 1) as i64,
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Builds a map from explicit entries.
    ///
    /// Later entries win lookups on duplicate names or ids; [`validate`]
    /// rejects such maps.
    ///
    /// [`validate`]: LabelMap::validate
    pub fn from_entries(entries: Vec<LabelMapEntry>) -> Self {
        let id_by_name = entries
            .iter()
            .map(|entry| (entry.name.clone(), entry.id))
            .collect();
        let name_by_id = entries
            .iter()
            .map(|entry| (entry.id, entry.name.clone()))
            .collect();
        Self {
            entries,
            id_by_name,
            name_by_id,
        }
    }

    /// Returns the id for a class name.
    pub fn id_for(&self, name: &str) -> Option<i64> {
        self.id_by_name.get(name).copied()
    }

    /// Returns the class name for an id.
    pub fn name_for(&self, id: i64) -> Option<&str> {
        self.name_by_id.get(&id).map(String::as_str)
    }

    /// Entries in file/build order.
    pub fn entries(&self) -> &[LabelMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks structural well-formedness: at least one entry, non-empty
    /// names, ids starting at 1 or above, no duplicate names or ids.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.entries.is_empty() {
            return Err(ConvertError::LabelMapInvalid {
                message: "label map has no entries".to_string(),
            });
        }

        let mut seen_names = BTreeSet::new();
        let mut seen_ids = BTreeSet::new();
        for entry in &self.entries {
            if entry.name.is_empty() {
                return Err(ConvertError::LabelMapInvalid {
                    message: format!("entry with id {} has an empty name", entry.id),
                });
            }
            if entry.id < 1 {
                return Err(ConvertError::LabelMapInvalid {
                    message: format!(
                        "class '{}' has id {}; ids must be positive",
                        entry.name, entry.id
                    ),
                });
            }
            if !seen_names.insert(entry.name.as_str()) {
                return Err(ConvertError::LabelMapInvalid {
                    message: format!("duplicate class name '{}'", entry.name),
                });
            }
            if !seen_ids.insert(entry.id) {
                return Err(ConvertError::LabelMapInvalid {
                    message: format!("duplicate id {}", entry.id),
                });
            }
        }

        Ok(())
    }

    /// Returns observed class names that have no id in this map, sorted.
    pub fn missing_classes(&self, annotations: &BTreeMap<String, VocAnnotation>) -> Vec<String> {
        let mut missing = BTreeSet::new();
        for annotation in annotations.values() {
            for object in &annotation.objects {
                if self.id_for(&object.name).is_none() {
                    missing.insert(object.name.clone());
                }
            }
        }
        missing.into_iter().collect()
    }
}

/// Load `path` if it already holds a map, otherwise derive one from the
/// observed class names, validate it, and save it.
pub fn build_or_load(
    path: &Path,
    annotations: &BTreeMap<String, VocAnnotation>,
) -> Result<(LabelMap, LabelMapSource), ConvertError> {
    if label_map_file_present(path)? {
        return Ok((read_label_map(path)?, LabelMapSource::Loaded));
    }

    let names: BTreeSet<String> = annotations
        .values()
        .flat_map(|annotation| annotation.objects.iter().map(|object| object.name.clone()))
        .collect();

    let map = LabelMap::from_names(names);
    map.validate()?;
    write_label_map(path, &map)?;
    Ok((map, LabelMapSource::Built))
}

/// Read a label map file.
pub fn read_label_map(path: &Path) -> Result<LabelMap, ConvertError> {
    let text = fs::read_to_string(path).map_err(ConvertError::Io)?;
    parse_pbtxt(&text, path).map(LabelMap::from_entries)
}

/// Write a label map file.
pub fn write_label_map(path: &Path, map: &LabelMap) -> Result<(), ConvertError> {
    fs::write(path, to_pbtxt_string(map)).map_err(ConvertError::Io)
}

/// Render a label map in the protobuf text format.
pub fn to_pbtxt_string(map: &LabelMap) -> String {
    let mut out = String::new();
    for entry in map.entries() {
        writeln!(out, "item {{").expect("write to string");
        writeln!(out, "  name: \"{}\"", entry.name).expect("write to string");
        writeln!(out, "  id: {}", entry.id).expect("write to string");
        writeln!(out, "}}").expect("write to string");
    }
    out
}

/// Parse a label map from pbtxt text.
///
/// This helper is primarily useful for testing/fuzzing parse behavior in-memory.
pub fn from_pbtxt_str(text: &str) -> Result<LabelMap, ConvertError> {
    parse_pbtxt(text, Path::new("<memory>")).map(LabelMap::from_entries)
}

/// Parse a label map from pbtxt bytes.
///
/// The input must be valid UTF-8.
pub fn from_pbtxt_slice(bytes: &[u8]) -> Result<LabelMap, ConvertError> {
    let text = std::str::from_utf8(bytes).map_err(|source| ConvertError::LabelMapParse {
        path: PathBuf::from("<memory>"),
        line: 1,
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_pbtxt_str(text)
}

fn label_map_file_present(path: &Path) -> Result<bool, ConvertError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ConvertError::Io(source)),
    }
}

/// Line-based pbtxt parser for the label-map subset: `item { ... }` blocks
/// holding `name`, `id`, and an ignored optional `display_name`.
fn parse_pbtxt(text: &str, path: &Path) -> Result<Vec<LabelMapEntry>, ConvertError> {
    let mut entries = Vec::new();

    let mut in_item = false;
    let mut opened_at = 0usize;
    let mut pending_name: Option<String> = None;
    let mut pending_id: Option<i64> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !in_item {
            if line == "item {" || line == "item{" {
                in_item = true;
                opened_at = line_number;
                pending_name = None;
                pending_id = None;
                continue;
            }
            return Err(parse_error(
                path,
                line_number,
                format!("expected 'item {{', found '{line}'"),
            ));
        }

        if line == "}" {
            let name = pending_name.take().ok_or_else(|| {
                parse_error(path, line_number, "item block is missing a name".to_string())
            })?;
            let id = pending_id.take().ok_or_else(|| {
                parse_error(path, line_number, "item block is missing an id".to_string())
            })?;
            entries.push(LabelMapEntry { name, id });
            in_item = false;
            continue;
        }

        if let Some(rest) = line.strip_prefix("name:") {
            pending_name = Some(parse_quoted(rest, path, line_number)?);
            continue;
        }

        if let Some(rest) = line.strip_prefix("id:") {
            let raw = rest.trim();
            let id = raw.parse::<i64>().map_err(|_| {
                parse_error(
                    path,
                    line_number,
                    format!("invalid id value '{raw}'; expected integer"),
                )
            })?;
            pending_id = Some(id);
            continue;
        }

        if line.starts_with("display_name:") {
            continue;
        }

        return Err(parse_error(
            path,
            line_number,
            format!("unrecognized line '{line}'"),
        ));
    }

    if in_item {
        return Err(parse_error(
            path,
            opened_at,
            "unterminated item block".to_string(),
        ));
    }

    Ok(entries)
}

fn parse_quoted(raw: &str, path: &Path, line: usize) -> Result<String, ConvertError> {
    let raw = raw.trim();
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            raw.strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        });

    match unquoted {
        Some(name) => Ok(name.to_string()),
        None => Err(parse_error(
            path,
            line,
            format!("expected quoted string, found '{raw}'"),
        )),
    }
}

fn parse_error(path: &Path, line: usize, message: String) -> ConvertError {
    ConvertError::LabelMapParse {
        path: path.to_path_buf(),
        line,
        message,
    }
}
