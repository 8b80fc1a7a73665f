use std::collections::BTreeSet;

const MIN_REDACTED_LEN: usize = 3;

/// Mask every occurrence of a sensitive value, longest values first.
#[must_use]
pub fn redact_sensitive(text: &str, sensitive_values: &BTreeSet<String>) -> String {
    let mut values: Vec<&str> = sensitive_values
        .iter()
        .map(String::as_str)
        .filter(|value| value.len() >= MIN_REDACTED_LEN)
        .collect();
    values.sort_by_key(|value| std::cmp::Reverse(value.len()));

    values
        .into_iter()
        .fold(text.to_string(), |redacted, value| {
            redacted.replace(value, "[REDACTED]")
        })
}
