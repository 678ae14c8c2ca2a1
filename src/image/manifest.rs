//! Dependency manifest parsing
//!
//! A manifest maps package names to version specifiers. Three on-disk
//! formats are accepted, chosen by extension:
//!
//! - `requirements.txt` style (`fastapi==0.95`, one per line)
//! - JSON object (`{"fastapi": "0.95"}`)
//! - TOML table (`fastapi = "0.95"`)
//!
//! Whatever the input order, the manifest renders canonically (sorted by
//! normalized name) so its digest only changes when its content does.

use crate::error::{BerthError, BerthResult};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// On-disk manifest format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Requirements,
    Json,
    Toml,
}

impl ManifestFormat {
    /// Pick a format from the file extension (anything unknown is requirements)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            Some("toml") => Self::Toml,
            _ => Self::Requirements,
        }
    }
}

/// A single pinned (or unpinned) dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name as written, including any extras (`uvicorn[standard]`)
    pub name: String,

    /// Version specifier including its operator (`==0.95`), empty if unpinned
    pub specifier: String,
}

impl Dependency {
    /// Whether the dependency carries a version constraint
    pub fn is_pinned(&self) -> bool {
        !self.specifier.is_empty()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.specifier)
    }
}

/// Parsed dependency manifest
#[derive(Debug, Clone, Default)]
pub struct DependencyManifest {
    path: PathBuf,
    /// Keyed by normalized name
    deps: BTreeMap<String, Dependency>,
}

impl DependencyManifest {
    /// Read and parse a manifest from disk
    pub fn from_file(path: &Path) -> BerthResult<Self> {
        if !path.exists() {
            return Err(BerthError::PathNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| BerthError::io(format!("reading manifest {}", path.display()), e))?;

        match ManifestFormat::from_path(path) {
            ManifestFormat::Requirements => Self::parse_requirements(path, &content),
            ManifestFormat::Json => Self::parse_json(path, &content),
            ManifestFormat::Toml => Self::parse_toml(path, &content),
        }
    }

    /// Parse `requirements.txt` style content
    pub fn parse_requirements(path: &Path, content: &str) -> BerthResult<Self> {
        let mut manifest = Self::empty(path);

        for (idx, raw) in content.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('-') {
                return Err(manifest.invalid(format!(
                    "line {}: pip options are not supported: {}",
                    idx + 1,
                    line
                )));
            }

            let split = line
                .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | ';' | ' '))
                .unwrap_or(line.len());
            let name = line[..split].trim();
            let specifier: String = line[split..].split_whitespace().collect::<Vec<_>>().join(" ");

            manifest.insert(name, specifier)?;
        }

        Ok(manifest)
    }

    /// Parse a JSON object of name → version
    pub fn parse_json(path: &Path, content: &str) -> BerthResult<Self> {
        let entries: JsonEntries =
            serde_json::from_str(content).map_err(|e| BerthError::ManifestInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut manifest = Self::empty(path);
        for (name, version) in &entries.0 {
            let version = version.as_str().ok_or_else(|| {
                manifest.invalid(format!("version for {} must be a string", name))
            })?;
            manifest.insert(name, version_to_specifier(version))?;
        }

        Ok(manifest)
    }

    /// Parse a TOML table of name → version
    pub fn parse_toml(path: &Path, content: &str) -> BerthResult<Self> {
        let table: toml::Table = toml::from_str(content).map_err(|e| BerthError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // Either a flat table or one nested under [dependencies]
        let table = match table.get("dependencies") {
            Some(toml::Value::Table(deps)) => deps.clone(),
            _ => table,
        };

        let mut manifest = Self::empty(path);
        for (name, version) in &table {
            let version = version.as_str().ok_or_else(|| {
                manifest.invalid(format!("version for {} must be a string", name))
            })?;
            manifest.insert(name, version_to_specifier(version))?;
        }

        Ok(manifest)
    }

    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            deps: BTreeMap::new(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> BerthError {
        BerthError::ManifestInvalid {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn insert(&mut self, name: &str, specifier: String) -> BerthResult<()> {
        let key = normalize_name(name).map_err(|reason| self.invalid(reason))?;

        if self.deps.contains_key(&key) {
            return Err(BerthError::ManifestDuplicate {
                path: self.path.clone(),
                name: name.to_string(),
            });
        }

        self.deps.insert(
            key,
            Dependency {
                name: name.to_string(),
                specifier,
            },
        );
        Ok(())
    }

    /// Path the manifest was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of dependencies
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// Whether the manifest lists no dependencies
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Dependencies in canonical order
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.deps.values()
    }

    /// Look up a dependency by (any spelling of) its name
    pub fn get(&self, name: &str) -> Option<&Dependency> {
        normalize_name(name).ok().and_then(|key| self.deps.get(&key))
    }

    /// Canonical `requirements.txt` rendering, one dependency per line
    pub fn render_requirements(&self) -> String {
        let mut out = String::new();
        for dep in self.deps.values() {
            out.push_str(&dep.to_string());
            out.push('\n');
        }
        out
    }

    /// SHA256 of the canonical rendering
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.render_requirements().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// JSON object entries in document order, repeated keys included.
/// `serde_json::Value` keeps only the last of a repeated key.
struct JsonEntries(Vec<(String, serde_json::Value)>);

impl<'de> Deserialize<'de> for JsonEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = JsonEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object of name to version")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JsonEntries, A::Error> {
                let mut entries: Vec<(String, serde_json::Value)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(JsonEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Normalize a package name for comparison: lowercase, with runs of
/// `-`, `_` and `.` collapsed to a single `-`. Extras are ignored.
fn normalize_name(name: &str) -> Result<String, String> {
    let base = name.split('[').next().unwrap_or("").trim();

    if base.is_empty() {
        return Err("missing package name".to_string());
    }
    if !base.starts_with(|c: char| c.is_ascii_alphanumeric())
        || !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(format!("invalid package name: {}", name));
    }
    if name.contains('[') && !name.ends_with(']') {
        return Err(format!("unterminated extras in: {}", name));
    }

    let mut out = String::with_capacity(base.len());
    let mut in_sep = false;
    for c in base.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_sep {
                out.push('-');
            }
            in_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_sep = false;
        }
    }
    Ok(out)
}

/// Turn a bare version (`0.95`) into a pinned specifier (`==0.95`).
/// Values that already start with an operator are kept; `*` and empty
/// strings mean unpinned.
fn version_to_specifier(version: &str) -> String {
    let version = version.trim();
    if version.is_empty() || version == "*" {
        String::new()
    } else if version.starts_with(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~')) {
        version.to_string()
    } else {
        format!("=={}", version)
    }
}

fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(pos) => &line[..pos],
        None => line,
    }
}
