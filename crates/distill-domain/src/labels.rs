//! Label normalization for entity and relationship types

/// Normalize a type label: trimmed, lower-cased, with runs of whitespace and
/// hyphens collapsed to a single underscore.
///
/// # Examples
///
/// ```
/// use distill_domain::normalize_label;
///
/// assert_eq!(normalize_label(" WORKS_FOR "), "works_for");
/// assert_eq!(normalize_label("Tech Company"), "tech_company");
/// assert_eq!(normalize_label("part-of"), "part_of");
/// ```
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;

    for c in label.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(c.to_lowercase());
    }

    out
}
