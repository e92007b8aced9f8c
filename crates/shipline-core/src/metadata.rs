//! Project metadata file editing.
//!
//! The released version is persisted into a TOML metadata file (by default
//! `package.version` in `Cargo.toml`) so a fresh checkout reflects it.
//! Edits are lossless: comments and formatting around the value survive.

use std::path::Path;
use toml_edit::{DocumentMut, Item, Value};

use crate::error::{Result, ShiplineError};
use crate::version::VersionString;

fn load(path: &Path) -> Result<DocumentMut> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ShiplineError::Metadata(format!("cannot read {}: {e}", path.display()))
    })?;
    raw.parse::<DocumentMut>()
        .map_err(|e| ShiplineError::Metadata(format!("cannot parse {}: {e}", path.display())))
}

fn split_key(key: &str) -> Result<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = key.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ShiplineError::Config(format!("invalid metadata key '{key}'")));
    }
    let last = segments.pop().unwrap_or_default();
    Ok((segments, last))
}

/// Read the version stored at the dotted `key`.
///
/// Returns `Ok(None)` when the key is absent. A value that is present but
/// not a semver string is a resolution failure.
pub fn read_version(path: &Path, key: &str) -> Result<Option<semver::Version>> {
    let doc = load(path)?;
    let (parents, last) = split_key(key)?;

    let mut item: &Item = doc.as_item();
    for segment in parents {
        match item.get(segment) {
            Some(next) => item = next,
            None => return Ok(None),
        }
    }
    let Some(value) = item.get(last) else {
        return Ok(None);
    };

    let raw = value.as_str().ok_or_else(|| {
        ShiplineError::VersionResolution(format!(
            "'{key}' in {} is not a version string",
            path.display()
        ))
    })?;
    semver::Version::parse(raw).map(Some).map_err(|e| {
        ShiplineError::VersionResolution(format!(
            "'{key}' in {} holds '{raw}', which is not valid semver: {e}",
            path.display()
        ))
    })
}

/// Write `version` at the dotted `key`, preserving the rest of the file.
///
/// The parent table must exist; the key itself is created if missing.
pub fn write_version(path: &Path, key: &str, version: &VersionString) -> Result<()> {
    let mut doc = load(path)?;
    let (parents, last) = split_key(key)?;

    let mut table = doc.as_table_mut() as &mut dyn toml_edit::TableLike;
    for segment in &parents {
        table = table
            .get_mut(segment)
            .and_then(Item::as_table_like_mut)
            .ok_or_else(|| {
                ShiplineError::Metadata(format!(
                    "table '{segment}' not found in {} while writing '{key}'",
                    path.display()
                ))
            })?;
    }

    match table.get_mut(last).and_then(Item::as_value_mut) {
        Some(existing) => {
            let decor = existing.decor().clone();
            *existing = Value::from(version.to_string());
            *existing.decor_mut() = decor;
        }
        None => {
            table.insert(last, toml_edit::value(version.to_string()));
        }
    }

    std::fs::write(path, doc.to_string())?;
    Ok(())
}
