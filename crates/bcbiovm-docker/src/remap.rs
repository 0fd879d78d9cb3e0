//! Remapping of file paths between host and container namespaces.
//!
//! Sample configurations reference input files by host path. Before they are
//! handed to the pipeline inside the container, every path under a bind
//! mount is rewritten to its container location; results coming back out
//! are rewritten the other way.
//!
//! Documents are `serde_json::Value` trees, so anything parsed from JSON or
//! YAML can be remapped. Only strings are inspected. Keys, ordering, and
//! non-string scalars are left alone.

use std::collections::BTreeMap;

use bcbiovm_common::error::{BcbioError, Result};
use bcbiovm_common::types::{Direction, MountSpec};
use serde_json::Value;

/// Prefix lookup table built from a mount list in one direction.
///
/// Keys are literal string prefixes, not path components: a key `/data`
/// also matches `/database`. A source prefix declared twice keeps the
/// later target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountIndex {
    prefixes: BTreeMap<String, String>,
}

impl MountIndex {
    /// Builds an index from `host:container` strings.
    ///
    /// # Errors
    ///
    /// Returns [`BcbioError::MalformedMount`] for the first entry that is
    /// not a valid mount. No index is produced in that case.
    pub fn build<S: AsRef<str>>(mounts: &[S], direction: Direction) -> Result<Self> {
        let specs = mounts
            .iter()
            .map(|m| MountSpec::parse(m.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_specs(&specs, direction))
    }

    /// Builds an index from already parsed mounts.
    #[must_use]
    pub fn from_specs(specs: &[MountSpec], direction: Direction) -> Self {
        let mut prefixes = BTreeMap::new();
        for spec in specs {
            let (from, to) = spec.oriented(direction);
            let _ = prefixes.insert(from.to_owned(), to.to_owned());
        }
        Self { prefixes }
    }

    /// Number of distinct source prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Returns `true` if the index has no prefixes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Returns the longest source prefix of `path` and its target.
    ///
    /// Two distinct keys of equal length cannot both prefix the same
    /// string, so the longest match is unique.
    #[must_use]
    pub fn longest_match(&self, path: &str) -> Option<(&str, &str)> {
        self.prefixes
            .iter()
            .filter(|(from, _)| path.starts_with(from.as_str()))
            .max_by_key(|(from, _)| from.len())
            .map(|(from, to)| (from.as_str(), to.as_str()))
    }

    /// Rewrites `path` if some prefix matches, otherwise `None`.
    #[must_use]
    pub fn rewrite(&self, path: &str) -> Option<String> {
        self.longest_match(path)
            .map(|(from, to)| format!("{to}{}", &path[from.len()..]))
    }

    /// Rewrites a path the caller already knows lies under a mount.
    ///
    /// # Errors
    ///
    /// Returns [`BcbioError::NoMountMatch`] if no prefix matches. That is a
    /// caller bug, not bad input.
    pub fn remap_path(&self, path: &str) -> Result<String> {
        self.rewrite(path)
            .ok_or_else(|| BcbioError::NoMountMatch { path: path.into() })
    }
}

/// Rewrites every matching string inside `document`.
///
/// Traversal uses an explicit stack, so nesting depth is bounded only by
/// memory.
#[must_use]
pub fn walk(mut document: Value, index: &MountIndex) -> Value {
    if index.is_empty() {
        return document;
    }

    {
        let mut pending: Vec<&mut Value> = vec![&mut document];
        while let Some(node) = pending.pop() {
            match node {
                Value::Array(items) => pending.extend(items.iter_mut()),
                Value::Object(map) => pending.extend(map.values_mut()),
                Value::String(s) => {
                    if let Some(rewritten) = index.rewrite(s) {
                        *s = rewritten;
                    }
                }
                Value::Null | Value::Bool(_) | Value::Number(_) => {}
            }
        }
    }

    document
}

/// Remaps `document` in the given direction.
///
/// # Errors
///
/// Returns [`BcbioError::MalformedMount`] before touching the document if
/// any mount string is invalid.
pub fn remap<S: AsRef<str>>(document: Value, mounts: &[S], direction: Direction) -> Result<Value> {
    let index = MountIndex::build(mounts, direction)?;
    tracing::debug!(%direction, mounts = index.len(), "remapping document paths");
    Ok(walk(document, &index))
}

/// Rewrites host paths in `document` to their container locations.
///
/// # Errors
///
/// Returns [`BcbioError::MalformedMount`] if a mount string is invalid.
pub fn remap_to_internal<S: AsRef<str>>(document: Value, mounts: &[S]) -> Result<Value> {
    remap(document, mounts, Direction::ToInternal)
}

/// Rewrites container paths in `document` back to host locations.
///
/// # Errors
///
/// Returns [`BcbioError::MalformedMount`] if a mount string is invalid.
pub fn remap_to_external<S: AsRef<str>>(document: Value, mounts: &[S]) -> Result<Value> {
    remap(document, mounts, Direction::ToExternal)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn build_projects_host_to_container() {
        let index = MountIndex::build(&["/data:/c_data"], Direction::ToInternal).expect("build");
        assert_eq!(index.longest_match("/data/x"), Some(("/data", "/c_data")));
    }

    #[test]
    fn build_projects_container_to_host() {
        let index = MountIndex::build(&["/data:/c_data"], Direction::ToExternal).expect("build");
        assert_eq!(index.longest_match("/c_data/x"), Some(("/c_data", "/data")));
        assert_eq!(index.longest_match("/data/x"), None);
    }

    #[test]
    fn duplicate_source_keeps_later_entry() {
        let index = MountIndex::build(&["/data:/first", "/data:/second"], Direction::ToInternal)
            .expect("build");
        assert_eq!(index.len(), 1);
        assert_eq!(index.remap_path("/data/f").expect("remap"), "/second/f");
    }

    #[test]
    fn build_rejects_entry_without_separator() {
        let err = MountIndex::build(&["/ok:/fine", "broken"], Direction::ToInternal).unwrap_err();
        assert!(matches!(err, BcbioError::MalformedMount { ref spec } if spec == "broken"));
    }

    #[test]
    fn longest_prefix_wins() {
        let index = MountIndex::build(&["/data:/c_data", "/data/ref:/c_ref"], Direction::ToInternal)
            .expect("build");
        assert_eq!(index.remap_path("/data/ref/genome.fa").expect("remap"), "/c_ref/genome.fa");
        assert_eq!(index.remap_path("/data/reads.fq").expect("remap"), "/c_data/reads.fq");
    }

    #[test]
    fn prefixes_are_not_path_aware() {
        let index = MountIndex::build(&["/data:/mnt"], Direction::ToInternal).expect("build");
        assert_eq!(index.remap_path("/database/x").expect("remap"), "/mntbase/x");
    }

    #[test]
    fn only_leading_occurrence_is_replaced() {
        let index = MountIndex::build(&["/data:/mnt"], Direction::ToInternal).expect("build");
        assert_eq!(index.remap_path("/data/backup/data/x").expect("remap"), "/mnt/backup/data/x");
    }

    #[test]
    fn remap_path_without_match_is_an_error() {
        let index = MountIndex::build(&["/data:/mnt"], Direction::ToInternal).expect("build");
        let err = index.remap_path("/home/user/x").unwrap_err();
        assert!(matches!(err, BcbioError::NoMountMatch { ref path } if path == "/home/user/x"));
    }

    #[test]
    fn walk_preserves_structure() {
        let doc = json!({"a": "/data/x", "b": [1, "/data/y", null]});
        let out = remap_to_internal(doc, &["/data:/mnt"]).expect("remap");
        assert_eq!(out, json!({"a": "/mnt/x", "b": [1, "/mnt/y", null]}));
    }

    #[test]
    fn walk_leaves_scalars_and_unmatched_strings() {
        let doc = json!(["", true, 3.5, null, "relative/path", "/other/file", {"k": false}]);
        let out = remap_to_internal(doc.clone(), &["/data:/mnt"]).expect("remap");
        assert_eq!(out, doc);
    }

    #[test]
    fn keys_are_never_rewritten() {
        let doc = json!({"/data/key": "/data/value"});
        let out = remap_to_internal(doc, &["/data:/mnt"]).expect("remap");
        assert_eq!(out, json!({"/data/key": "/mnt/value"}));
    }

    #[test]
    fn empty_containers_stay_empty() {
        assert_eq!(remap_to_internal(json!({}), &["/data:/c_data"]).expect("remap"), json!({}));
        assert_eq!(remap_to_internal(json!([]), &["/data:/c_data"]).expect("remap"), json!([]));
    }

    #[test]
    fn empty_mount_list_is_identity() {
        let doc = json!({"a": "/data/x"});
        let out = remap_to_internal(doc.clone(), &[] as &[&str]).expect("remap");
        assert_eq!(out, doc);
    }

    #[test]
    fn malformed_mount_fails_before_walking() {
        let err = remap_to_internal(json!({"a": "/data/x"}), &["onlyonestring"]).unwrap_err();
        assert!(matches!(err, BcbioError::MalformedMount { .. }));
    }

    #[test]
    fn second_internal_pass_is_a_no_op_for_disjoint_namespaces() {
        let mounts = ["/data:/c_data"];
        let once = remap_to_internal(json!(["/data/a.bam"]), &mounts).expect("first pass");
        let twice = remap_to_internal(once.clone(), &mounts).expect("second pass");
        assert_eq!(once, json!(["/c_data/a.bam"]));
        assert_eq!(twice, once);
    }

    #[test]
    fn external_reverses_internal() {
        let mounts = ["/home/user/project:/mnt/work", "/refs:/mnt/biodata"];
        let doc = json!({
            "details": [{"files": ["/home/user/project/s1_R1.fq", "/home/user/project/s1_R2.fq"],
                         "genome_build": "GRCh37",
                         "algorithm": {"variant_regions": "/refs/regions.bed", "aligner": "bwa"}}],
            "upload": {"dir": "/home/user/project/final"}
        });
        let inside = remap_to_internal(doc.clone(), &mounts).expect("to internal");
        assert_eq!(inside["details"][0]["files"][1], json!("/mnt/work/s1_R2.fq"));
        assert_eq!(
            inside["details"][0]["algorithm"]["variant_regions"],
            json!("/mnt/biodata/regions.bed")
        );
        let back = remap_to_external(inside, &mounts).expect("to external");
        assert_eq!(back, doc);
    }
}
