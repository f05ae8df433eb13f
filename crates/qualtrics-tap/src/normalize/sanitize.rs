//! Column header sanitization

/// Rewrite a raw header into a field-safe name.
///
/// Parentheses are removed; spaces, `'`, `.`, `?` and `!` become `_`.
/// Applying it twice gives the same result as applying it once.
pub fn sanitize_column_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '(' | ')'))
        .map(|c| match c {
            ' ' | '\'' | '.' | '?' | '!' => '_',
            other => other,
        })
        .collect()
}
