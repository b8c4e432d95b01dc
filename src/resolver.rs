//! Token resolution for incoming records.
//!
//! Resolution is substring-based and first-match: table entries are tried
//! in document order against both the tag and the record's JSON rendering,
//! and the first key contained in either haystack wins, even when a later
//! key would match more of the tag. Downstream deployments depend on that
//! precedence rule, so it must not be "improved" to longest-match.

use serde_json::Value;

use crate::token_table::{TokenTable, TokenValue};

/// Tag names that select sub-tokens from a categorized entry.
#[derive(Clone, Copy, Debug)]
pub struct CategoryTags<'a> {
    /// Tag whose exact match selects the `access` token.
    pub access: &'a str,
    /// Tag whose exact match selects the `error` token.
    pub error: &'a str,
}

/// Resolve the token for `(tag, record)`, or `None` when no key matches.
///
/// The record haystack is its compact JSON rendering; a null record
/// contributes an empty haystack. Matching is case-sensitive.
pub fn resolve<'t>(
    tag: &str,
    record: &Value,
    table: &'t TokenTable,
    tags: &CategoryTags<'_>,
) -> Option<&'t str> {
    let rendered = if record.is_null() {
        String::new()
    } else {
        record.to_string()
    };

    for (key, value) in table.iter() {
        if !tag.contains(key) && !rendered.contains(key) {
            continue;
        }
        return Some(match value {
            TokenValue::Plain(token) => token,
            TokenValue::Categorized { access, error, app } => {
                if tag == tags.access {
                    access
                } else if tag == tags.error {
                    error
                } else {
                    app
                }
            }
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::{CategoryTags, resolve};
    use crate::token_table::{TokenTable, TokenValue};

    const TAGS: CategoryTags<'static> = CategoryTags {
        access: "logs-access",
        error: "logs-error",
    };

    fn plain_table(entries: &[(&str, &str)]) -> TokenTable {
        TokenTable::from_entries(
            entries
                .iter()
                .map(|(key, token)| ((*key).to_owned(), TokenValue::Plain((*token).to_owned())))
                .collect(),
        )
    }

    fn categorized_table(key: &str) -> TokenTable {
        TokenTable::from_entries(vec![(
            key.to_owned(),
            TokenValue::Categorized {
                access: "TA".into(),
                error: "TE".into(),
                app: "TAPP".into(),
            },
        )])
    }

    #[rstest]
    fn matches_key_against_tag() {
        let table = plain_table(&[("app1", "TOKENA"), ("app2", "TOKENB")]);
        let record = json!({"message": "hello"});
        assert_eq!(resolve("app1.logs", &record, &table, &TAGS), Some("TOKENA"));
    }

    #[rstest]
    fn matches_key_against_record_rendering() {
        let table = plain_table(&[("needle", "TOKENR")]);
        let record = json!({"message": "a needle in a haystack"});
        assert_eq!(resolve("unrelated", &record, &table, &TAGS), Some("TOKENR"));
    }

    #[rstest]
    fn first_match_wins_over_later_longer_key() {
        let table = plain_table(&[("app", "SHORT"), ("app1.logs", "EXACT")]);
        let record = json!({});
        assert_eq!(resolve("app1.logs", &record, &table, &TAGS), Some("SHORT"));
    }

    #[rstest]
    fn matching_is_case_sensitive() {
        let table = plain_table(&[("App1", "TOKENA")]);
        let record = json!({});
        assert_eq!(resolve("app1.logs", &record, &table, &TAGS), None);
    }

    #[rstest]
    fn null_record_matches_on_tag_only() {
        let table = plain_table(&[("null", "TOKENN")]);
        assert_eq!(resolve("app", &Value::Null, &table, &TAGS), None);
        assert_eq!(resolve("null.logs", &Value::Null, &table, &TAGS), Some("TOKENN"));
    }

    #[rstest]
    #[case("logs-access", "TA")]
    #[case("logs-error", "TE")]
    #[case("logs-anything-else", "TAPP")]
    fn categorized_value_selects_by_exact_tag(#[case] tag: &str, #[case] expected: &str) {
        let table = categorized_table("logs");
        let record = json!({"message": "hi"});
        assert_eq!(resolve(tag, &record, &table, &TAGS), Some(expected));
    }

    #[rstest]
    fn categorized_requires_exact_tag_for_access_token() {
        // A tag merely containing the access tag name still selects `app`.
        let table = categorized_table("svc");
        let record = json!({});
        assert_eq!(
            resolve("svc.logs-access.front", &record, &table, &TAGS),
            Some("TAPP")
        );
    }

    #[rstest]
    fn no_matching_key_yields_none() {
        let table = plain_table(&[("app1", "TOKENA")]);
        let record = json!({"message": "hello"});
        assert_eq!(resolve("other.logs", &record, &table, &TAGS), None);
    }

    proptest! {
        // With every key present in the tag, resolution always picks the
        // first entry regardless of what follows it.
        #[test]
        fn first_entry_wins_when_all_keys_match(
            keys in prop::collection::vec("[a-z]{1,6}", 1..6),
        ) {
            let entries: Vec<(&str, &str)> = keys
                .iter()
                .enumerate()
                .map(|(i, key)| (key.as_str(), if i == 0 { "FIRST" } else { "LATER" }))
                .collect();
            let table = plain_table(&entries);
            let tag = keys.join(".");
            prop_assert_eq!(resolve(&tag, &Value::Null, &table, &TAGS), Some("FIRST"));
        }

        // Keys absent from both haystacks never resolve.
        #[test]
        fn disjoint_keys_never_resolve(key in "[a-z]{3,8}") {
            let table = plain_table(&[(key.as_str(), "TOKEN")]);
            let record = serde_json::json!({"message": "0123456789"});
            prop_assume!(!"ABC.XYZ".contains(key.as_str()));
            prop_assume!(!record.to_string().contains(key.as_str()));
            prop_assert_eq!(resolve("ABC.XYZ", &record, &table, &TAGS), None);
        }
    }
}
