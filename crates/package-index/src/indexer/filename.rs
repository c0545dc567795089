//! Archive filename parsing.
//!
//! A package archive is named `<id>.<version>.nupkg`. The id may itself
//! contain dots, so the version is recognised as the run of purely numeric
//! dot-separated components at the end of the name.

use crate::types::{parse_component, Version};

/// Splits a filename (extension already removed) into a package id and version.
///
/// Trailing numeric components form the version, padded with zeros up to four
/// components. A name without numeric suffix is all id with version `0.0.0.0`.
/// When more than four numeric components trail the name, the leftmost four
/// make up the version and the rest are dropped.
///
/// Ids that legitimately end in numeric components (`Lib.2.1.0.0`) cannot be
/// told apart from versions; such names are accepted as parsed.
pub fn split_id_and_version(filename: &str) -> (String, Version) {
    let parts: Vec<&str> = filename.split('.').collect();

    let mut first_numeric = parts.len();
    while first_numeric > 0 && parse_component(parts[first_numeric - 1]).is_some() {
        first_numeric -= 1;
    }

    let components: Vec<u32> = parts[first_numeric..]
        .iter()
        .filter_map(|part| parse_component(part))
        .collect();

    (
        parts[..first_numeric].join("."),
        Version::from_components(&components),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_three_component_version() {
        let (id, version) = split_id_and_version("Foo.Bar.1.2.3");
        assert_eq!(id, "Foo.Bar");
        assert_eq!(version, Version::new(1, 2, 3, 0));
    }

    #[test]
    fn splits_single_component_version() {
        let (id, version) = split_id_and_version("Foo.7");
        assert_eq!(id, "Foo");
        assert_eq!(version, Version::new(7, 0, 0, 0));
    }

    #[test]
    fn name_without_version_is_all_id() {
        let (id, version) = split_id_and_version("NoVersionHere");
        assert_eq!(id, "NoVersionHere");
        assert_eq!(version, Version::ZERO);
    }

    #[test]
    fn four_component_version() {
        let (id, version) = split_id_and_version("Newtonsoft.Json.12.0.3.1");
        assert_eq!(id, "Newtonsoft.Json");
        assert_eq!(version, Version::new(12, 0, 3, 1));
    }

    #[test]
    fn extra_numeric_components_are_dropped() {
        let (id, version) = split_id_and_version("Foo.1.2.3.4.5");
        assert_eq!(id, "Foo");
        assert_eq!(version, Version::new(1, 2, 3, 4));
    }

    #[test]
    fn prerelease_suffix_stops_the_scan() {
        let (id, version) = split_id_and_version("Foo.1.0.0-beta");
        assert_eq!(id, "Foo.1.0.0-beta");
        assert_eq!(version, Version::ZERO);
    }

    #[test]
    fn degenerate_names_do_not_fail() {
        assert_eq!(split_id_and_version(""), (String::new(), Version::ZERO));
        assert_eq!(split_id_and_version("1.2"), (String::new(), Version::new(1, 2, 0, 0)));
        assert_eq!(split_id_and_version("Foo..1"), ("Foo.".to_string(), Version::new(1, 0, 0, 0)));
    }
}
