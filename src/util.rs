//! Shared utility functions used across the codebase.

use rand::Rng;

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// everything else maps to `false`.
pub fn env_var_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_bool(&value),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Current time as an RFC 3339 string, the format every stored timestamp uses.
pub fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Lowercase, hyphen-separated form of `text`.
///
/// Whitespace becomes `-`, anything other than ASCII letters, digits, `_` or `-` is
/// dropped and runs of `-` collapse into one. Leading and trailing hyphens are removed.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().to_lowercase().chars() {
        let mapped = if c.is_whitespace() {
            '-'
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            continue;
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Slug for a new workspace: `slugify(name)` plus a random 5-character base36 suffix.
pub fn workspace_slug(name: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    let base = slugify(name);
    if base.is_empty() {
        suffix
    } else {
        format!("{}-{}", base, suffix)
    }
}

/// Split a comma-separated list, trimming entries and dropping empties and duplicates.
pub fn split_csv(value: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in value.split(',') {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_truthy_values() {
        for v in ["1", "true", "YES", " on ", "y"] {
            assert!(parse_bool(v), "{v} should be true");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!parse_bool(v), "{v} should be false");
        }
    }

    #[test]
    fn slugify_collapses_and_strips() {
        assert_eq!(slugify("  My Team Board "), "my-team-board");
        assert_eq!(slugify("Q3 -- Launch!!"), "q3-launch");
        assert_eq!(slugify("snake_case ok"), "snake_case-ok");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn slugify_keeps_ascii_only() {
        assert_eq!(slugify("Café Crème"), "caf-crme");
        assert_eq!(slugify("Équipe ① Ω"), "quipe");
        assert_eq!(slugify("日本語"), "");
        assert!(workspace_slug("日本語").chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn workspace_slug_has_random_base36_suffix() {
        let slug = workspace_slug("Acme Corp");
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "acme-corp");
        assert_eq!(suffix.len(), 5);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn workspace_slug_for_unsluggable_name_is_just_suffix() {
        assert_eq!(workspace_slug("!!!").len(), 5);
    }

    #[test]
    fn split_csv_deduplicates_and_trims() {
        assert_eq!(
            split_csv(" a , b,,a, c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
