//! Label grammar: mapping between object identifiers and tracker label strings.

use thiserror::Error;

/// The `canonical-object` label.
pub const CANONICAL_LABEL: &str = "canonical-object";
/// The `alias-object` label.
pub const ALIAS_LABEL: &str = "alias-object";
/// Prefix for `ALIAS-TO:<issue#>` labels.
pub const ALIAS_TO_PREFIX: &str = "ALIAS-TO:";
/// The `deprecated-object` label.
pub const DEPRECATED_LABEL: &str = "deprecated-object";
/// Prefix for `MERGED-INTO:<id>` labels.
pub const MERGED_INTO_PREFIX: &str = "MERGED-INTO:";
/// The `archived` label.
pub const ARCHIVED_LABEL: &str = "archived";

/// Errors raised while interpreting a label set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelError {
    /// No label in the set started with the uid prefix.
    #[error("no label carries the uid prefix")]
    NoUidLabel,
}

/// The role a single label plays in the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelKind<'a> {
    /// `<BASE_LABEL>`.
    Base,
    /// `<UID_PREFIX><id>`.
    Uid(&'a str),
    /// `canonical-object`.
    Canonical,
    /// `alias-object`.
    Alias,
    /// `ALIAS-TO:<issue#>`.
    AliasTo(u64),
    /// `deprecated-object`.
    Deprecated,
    /// `MERGED-INTO:<id>`.
    MergedInto(&'a str),
    /// `archived`.
    Archived,
    /// Anything else; carried along unmodified for callers that pass labels through.
    Other(&'a str),
}

/// Encode an object id as a uid label. Idempotent: a label that already carries
/// the prefix is returned unchanged rather than double-prefixed.
#[must_use]
pub fn encode_uid(uid_prefix: &str, id: &str) -> String {
    if id.starts_with(uid_prefix) {
        id.to_string()
    } else {
        format!("{uid_prefix}{id}")
    }
}

/// Decode a uid label back to the bare object id, if it carries the prefix.
#[must_use]
pub fn decode_uid<'a>(uid_prefix: &str, label: &'a str) -> Option<&'a str> {
    label.strip_prefix(uid_prefix)
}

/// Extract the first uid label's id from a label set.
///
/// # Errors
/// Returns [`LabelError::NoUidLabel`] if no label carries the uid prefix.
pub fn extract_uid<'a>(uid_prefix: &str, labels: &'a [String]) -> Result<&'a str, LabelError> {
    labels
        .iter()
        .find_map(|l| decode_uid(uid_prefix, l))
        .ok_or(LabelError::NoUidLabel)
}

/// Classify a single label according to the recognized grammar.
#[must_use]
pub fn classify<'a>(label: &'a str, base_label: &str, uid_prefix: &str) -> LabelKind<'a> {
    if label == base_label {
        return LabelKind::Base;
    }
    if label == CANONICAL_LABEL {
        return LabelKind::Canonical;
    }
    if label == ALIAS_LABEL {
        return LabelKind::Alias;
    }
    if label == DEPRECATED_LABEL {
        return LabelKind::Deprecated;
    }
    if label == ARCHIVED_LABEL {
        return LabelKind::Archived;
    }
    if let Some(n) = label.strip_prefix(ALIAS_TO_PREFIX) {
        if let Ok(n) = n.parse() {
            return LabelKind::AliasTo(n);
        }
    }
    if let Some(id) = label.strip_prefix(MERGED_INTO_PREFIX) {
        return LabelKind::MergedInto(id);
    }
    if let Some(id) = decode_uid(uid_prefix, label) {
        return LabelKind::Uid(id);
    }
    LabelKind::Other(label)
}

/// The label set a gateway query should filter on to find the anchor for `id`.
#[must_use]
pub fn query_labels(base_label: &str, uid_prefix: &str, id: &str) -> Vec<String> {
    vec![base_label.to_string(), encode_uid(uid_prefix, id)]
}

/// Build an `ALIAS-TO:<n>` label.
#[must_use]
pub fn alias_to_label(issue_number: u64) -> String {
    format!("{ALIAS_TO_PREFIX}{issue_number}")
}

/// Find the `ALIAS-TO:<n>` label in a label set, if any.
#[must_use]
pub fn find_alias_target(labels: &[String]) -> Option<u64> {
    labels.iter().find_map(|l| l.strip_prefix(ALIAS_TO_PREFIX)?.parse().ok())
}

/// Build a `MERGED-INTO:<id>` label.
#[must_use]
pub fn merged_into_label(id: &str) -> String {
    format!("{MERGED_INTO_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;

    const BASE: &str = "stored-object";
    const PREFIX: &str = "UID:";

    #[test]
    fn encode_uid_adds_prefix() {
        assert_eq!(encode_uid(PREFIX, "foo"), "UID:foo");
    }

    #[test]
    fn encode_uid_is_idempotent() {
        assert_eq!(encode_uid(PREFIX, "UID:foo"), "UID:foo");
    }

    #[test]
    fn decode_uid_strips_prefix() {
        assert_eq!(decode_uid(PREFIX, "UID:foo"), Some("foo"));
        assert_eq!(decode_uid(PREFIX, "other"), None);
    }

    #[test]
    fn extract_uid_finds_first_match() {
        let labels = vec!["stored-object".to_string(), "UID:foo".to_string()];
        assert_eq!(extract_uid(PREFIX, &labels), Ok("foo"));
    }

    #[test]
    fn extract_uid_errors_when_absent() {
        let labels = vec!["stored-object".to_string()];
        assert_eq!(extract_uid(PREFIX, &labels), Err(LabelError::NoUidLabel));
    }

    #[test]
    fn classify_recognizes_every_grammar_element() {
        assert_eq!(classify(BASE, BASE, PREFIX), LabelKind::Base);
        assert_eq!(classify("UID:foo", BASE, PREFIX), LabelKind::Uid("foo"));
        assert_eq!(classify(CANONICAL_LABEL, BASE, PREFIX), LabelKind::Canonical);
        assert_eq!(classify(ALIAS_LABEL, BASE, PREFIX), LabelKind::Alias);
        assert_eq!(classify("ALIAS-TO:42", BASE, PREFIX), LabelKind::AliasTo(42));
        assert_eq!(classify(DEPRECATED_LABEL, BASE, PREFIX), LabelKind::Deprecated);
        assert_eq!(
            classify("MERGED-INTO:bar", BASE, PREFIX),
            LabelKind::MergedInto("bar")
        );
        assert_eq!(classify(ARCHIVED_LABEL, BASE, PREFIX), LabelKind::Archived);
        assert_eq!(classify("unrelated", BASE, PREFIX), LabelKind::Other("unrelated"));
    }

    #[test]
    fn classify_alias_to_rejects_non_numeric_suffix() {
        assert_eq!(
            classify("ALIAS-TO:not-a-number", BASE, PREFIX),
            LabelKind::Other("ALIAS-TO:not-a-number")
        );
    }

    #[test]
    fn query_labels_pairs_base_and_uid() {
        assert_eq!(
            query_labels(BASE, PREFIX, "foo"),
            vec!["stored-object".to_string(), "UID:foo".to_string()]
        );
    }
}
