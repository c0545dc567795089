//! Immutable point-in-time view of every indexed package.

use std::cmp::Ordering;

use fnv::FnvHashMap;

use super::scan::ArchiveFile;
use crate::types::{ContentId, PackageEntry, Version, VersionEntry};

/// Packages sorted ascending by id (ordinal, case-insensitive).
///
/// Ids are unique under case-insensitive comparison; each package's
/// versions are unique and ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndexSnapshot {
    packages: Vec<PackageEntry>,
}

/// One page of search results.
#[derive(Debug)]
pub struct SearchPage<'a> {
    /// Number of packages matching the term, before paging.
    pub total: usize,
    pub packages: Vec<&'a PackageEntry>,
}

impl PackageIndexSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups archives by package id and builds the sorted snapshot.
    ///
    /// Ids differing only by case are one package, spelled as the first
    /// archive (in input order) spells it. When two archives resolve to the
    /// same id and version, the first one wins and the other is not indexed.
    pub fn from_archives(archives: &[ArchiveFile]) -> Self {
        let mut groups: FnvHashMap<String, (String, Vec<VersionEntry>)> = FnvHashMap::default();

        for archive in archives {
            let (_, versions) = groups
                .entry(fold_id(&archive.id))
                .or_insert_with(|| (archive.id.clone(), Vec::new()));

            if let Some(existing) = versions.iter().find(|entry| entry.version == archive.version) {
                log::warn!(
                    "duplicate package version id={} version={} kept={} skipped={}",
                    archive.id,
                    archive.version,
                    existing.content_id,
                    archive.path.display()
                );
                continue;
            }
            versions.push(VersionEntry {
                version: archive.version,
                content_id: archive.content_id.clone(),
            });
        }

        let mut packages: Vec<PackageEntry> = groups
            .into_values()
            .filter_map(|(id, versions)| PackageEntry::new(id, versions))
            .collect();
        packages.sort_by(|a, b| compare_ids(a.id(), b.id()));

        Self { packages }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn packages(&self) -> &[PackageEntry] {
        &self.packages
    }

    pub fn get(&self, index: usize) -> Option<&PackageEntry> {
        self.packages.get(index)
    }

    /// Total number of versions across all packages.
    pub fn version_count(&self) -> usize {
        self.packages.iter().map(|package| package.versions().len()).sum()
    }

    /// Position of the package with this id, ignoring case. Blank ids never match.
    pub fn find_package_index(&self, id: &str) -> Option<usize> {
        if id.trim().is_empty() {
            return None;
        }
        self.packages
            .binary_search_by(|package| compare_ids(package.id(), id))
            .ok()
    }

    pub fn find_package(&self, id: &str) -> Option<&PackageEntry> {
        self.find_package_index(id).map(|index| &self.packages[index])
    }

    /// Content id of the exact `(id, version)` pair.
    pub fn find_content_id(&self, id: &str, version: Version) -> Option<&ContentId> {
        self.find_package(id)?.content_id_for(version)
    }

    /// All versions of a package; empty when the id is unknown.
    pub fn versions_of(&self, id: &str) -> &[VersionEntry] {
        self.find_package(id)
            .map(PackageEntry::versions)
            .unwrap_or(&[])
    }

    /// Packages whose id contains `term` (case-insensitive), skipping `skip`
    /// matches and returning at most `top`.
    pub fn search(&self, term: &str, skip: usize, top: usize) -> SearchPage<'_> {
        let needle = fold_id(term);
        let matches: Vec<&PackageEntry> = self
            .packages
            .iter()
            .filter(|package| fold_id(package.id()).contains(&needle))
            .collect();

        SearchPage {
            total: matches.len(),
            packages: matches.into_iter().skip(skip).take(top).collect(),
        }
    }
}

/// Ordinal comparison of uppercased ids.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.chars().map(fold_char).cmp(b.chars().map(fold_char))
}

/// Uppercases every character of an id; two ids are the same package when
/// their folded forms are equal.
pub fn fold_id(id: &str) -> String {
    id.chars().map(fold_char).collect()
}

/// Simple one-to-one uppercase mapping. Characters whose uppercase form
/// expands to several characters (`ß`) are left as they are.
fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(folded), None) => folded,
        _ => c,
    }
}
