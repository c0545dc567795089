//! Core value types of the package index.
//!
//! These are the types handed to protocol front ends: versions, content ids,
//! and the immutable per-package entries a snapshot is made of.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IndexError;

/// A four component package version, ordered lexicographically by component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl Version {
    pub const ZERO: Version = Version::new(0, 0, 0, 0);

    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Builds a version from signed components, clamping negatives to zero.
    ///
    /// Components above `u32::MAX` saturate.
    pub fn normalized(major: i64, minor: i64, build: i64, revision: i64) -> Self {
        fn clamp(component: i64) -> u32 {
            component.clamp(0, i64::from(u32::MAX)) as u32
        }
        Self::new(clamp(major), clamp(minor), clamp(build), clamp(revision))
    }

    /// Builds a version from up to four leading components, padding the rest with zero.
    pub fn from_components(components: &[u32]) -> Self {
        let component = |index: usize| components.get(index).copied().unwrap_or(0);
        Self::new(component(0), component(1), component(2), component(3))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for Version {
    type Err = IndexError;

    /// Parses `major.minor[.build[.revision]]`; missing components are zero.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(IndexError::InvalidInput(format!(
                "invalid version {value:?}: expected 2 to 4 components"
            )));
        }

        let mut components = Vec::with_capacity(4);
        for part in parts {
            let component = parse_component(part).ok_or_else(|| {
                IndexError::InvalidInput(format!(
                    "invalid version {value:?}: component {part:?} is not a non-negative integer"
                ))
            })?;
            components.push(component);
        }
        Ok(Self::from_components(&components))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses a version component made only of ASCII digits.
pub(crate) fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Opaque key identifying one archive's bytes within one index generation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(Arc<str>);

impl ContentId {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContentId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// One version of a package and the content id of its archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub version: Version,
    pub content_id: ContentId,
}

/// All known versions of one package id.
///
/// Versions are unique and sorted ascending; the latest version is always the
/// last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    id: String,
    versions: Vec<VersionEntry>,
}

impl PackageEntry {
    /// Builds an entry, sorting the versions and keeping the first entry of
    /// any duplicated version. Returns `None` when `versions` is empty.
    pub fn new(id: impl Into<String>, mut versions: Vec<VersionEntry>) -> Option<Self> {
        if versions.is_empty() {
            return None;
        }
        versions.sort_by_key(|entry| entry.version);
        versions.dedup_by_key(|entry| entry.version);
        Some(Self {
            id: id.into(),
            versions,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn versions(&self) -> &[VersionEntry] {
        &self.versions
    }

    pub fn latest(&self) -> &VersionEntry {
        // Construction rejects empty version lists.
        &self.versions[self.versions.len() - 1]
    }

    pub fn latest_version(&self) -> Version {
        self.latest().version
    }

    pub fn latest_content_id(&self) -> &ContentId {
        &self.latest().content_id
    }

    pub fn content_id_for(&self, version: Version) -> Option<&ContentId> {
        self.versions
            .binary_search_by_key(&version, |entry| entry.version)
            .ok()
            .map(|position| &self.versions[position].content_id)
    }
}

/// Index status information.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    /// Debounce state: "idle", "pending", or "rebuilding".
    pub state: String,
    /// Root directory being indexed.
    pub root: String,
    /// Active content strategy name.
    pub cache: String,
    /// Generation number of the published snapshot (0 is the initial scan).
    pub generation: u64,
    /// Number of packages in the published snapshot.
    pub packages: usize,
    /// Number of versions across all packages.
    pub versions: usize,
    /// Successful rebuilds since startup, the initial scan excluded.
    pub rebuild_count: u64,
    /// Unix timestamp of the last successful scan.
    pub last_rebuild_at: Option<u64>,
    /// Message of the last failed rebuild, cleared by the next success.
    pub last_error: Option<String>,
    /// Whether the filesystem watcher is running.
    pub watcher_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: Version, id: &str) -> VersionEntry {
        VersionEntry {
            version,
            content_id: ContentId::from(id),
        }
    }

    #[test]
    fn version_ordering_is_lexicographic() {
        assert!(Version::new(1, 2, 3, 4) < Version::new(1, 2, 4, 0));
        assert!(Version::new(1, 10, 0, 0) > Version::new(1, 9, 9, 9));
        assert!(Version::new(2, 0, 0, 0) > Version::new(1, 99, 0, 0));
    }

    #[test]
    fn normalized_clamps_negative_components() {
        assert_eq!(Version::normalized(1, 2, -1, -1), Version::new(1, 2, 0, 0));
        assert_eq!(Version::normalized(-5, 0, 0, 3), Version::new(0, 0, 0, 3));
    }

    #[test]
    fn parses_and_displays_versions() {
        let version: Version = "1.2".parse().unwrap();
        assert_eq!(version, Version::new(1, 2, 0, 0));
        assert_eq!(version.to_string(), "1.2.0.0");

        let version: Version = "4.3.2.1".parse().unwrap();
        assert_eq!(version, Version::new(4, 3, 2, 1));
    }

    #[test]
    fn rejects_malformed_versions() {
        assert!("1".parse::<Version>().is_err());
        assert!("1.2.3.4.5".parse::<Version>().is_err());
        assert!("1.-2".parse::<Version>().is_err());
        assert!("1.beta".parse::<Version>().is_err());
    }

    #[test]
    fn package_entry_sorts_and_tracks_latest() {
        let package = PackageEntry::new(
            "Foo",
            vec![
                entry(Version::new(2, 0, 0, 0), "b"),
                entry(Version::new(1, 0, 0, 0), "a"),
                entry(Version::new(1, 5, 0, 0), "c"),
            ],
        )
        .unwrap();

        let versions: Vec<_> = package.versions().iter().map(|v| v.version).collect();
        assert_eq!(
            versions,
            vec![
                Version::new(1, 0, 0, 0),
                Version::new(1, 5, 0, 0),
                Version::new(2, 0, 0, 0)
            ]
        );
        assert_eq!(package.latest_version(), Version::new(2, 0, 0, 0));
        assert_eq!(package.latest_content_id().as_str(), "b");
    }

    #[test]
    fn package_entry_keeps_first_duplicate_version() {
        let package = PackageEntry::new(
            "Foo",
            vec![
                entry(Version::new(1, 0, 0, 0), "first"),
                entry(Version::new(1, 0, 0, 0), "second"),
            ],
        )
        .unwrap();

        assert_eq!(package.versions().len(), 1);
        assert_eq!(package.latest_content_id().as_str(), "first");
    }

    #[test]
    fn package_entry_requires_versions() {
        assert!(PackageEntry::new("Foo", Vec::new()).is_none());
    }

    #[test]
    fn content_id_for_exact_version() {
        let package = PackageEntry::new("Foo", vec![entry(Version::new(1, 0, 0, 0), "a")]).unwrap();
        assert_eq!(
            package.content_id_for(Version::new(1, 0, 0, 0)).map(ContentId::as_str),
            Some("a")
        );
        assert!(package.content_id_for(Version::new(1, 0, 0, 1)).is_none());
    }

    #[test]
    fn version_entries_serialize_as_strings() {
        let value = serde_json::to_value(entry(Version::new(1, 2, 0, 0), "00ff")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "version": "1.2.0.0", "content_id": "00ff" })
        );

        let id: ContentId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }
}
