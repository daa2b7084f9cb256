//! Domain models for the workshop portal.
//!
//! These are the core types shared across all crates.

pub mod account;
pub mod invoice;
pub mod job;

/// Parse a stored or user-supplied enum label.
///
/// Matching ignores ASCII case and the separators `-`, `_` and spaces so
/// that `Half-rim`, `half_rim` and `HalfRim` resolve to the same variant.
pub(crate) fn parse_label<T: Copy>(
    kind: &str,
    input: &str,
    variants: &[(&str, T)],
) -> crate::error::MontageResult<T> {
    let wanted = normalize_label(input);
    variants
        .iter()
        .find(|(name, _)| normalize_label(name) == wanted)
        .map(|(_, value)| *value)
        .ok_or_else(|| crate::error::MontageError::validation(format!("unknown {kind}: {input}")))
}

fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
