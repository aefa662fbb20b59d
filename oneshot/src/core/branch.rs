//! Deterministic branch naming.

/// Prefix used when no `branchPrefix` is configured.
pub const DEFAULT_BRANCH_PREFIX: &str = "oneshot";

/// Build `<prefix>/<slug>` for a task name.
///
/// The slug is lowercase ASCII alphanumerics; every run of other characters
/// collapses to a single `-`, and leading/trailing `-` are stripped. A name
/// with no alphanumerics yields an empty slug (`"x/"`).
pub fn format_branch_name(prefix: &str, name: &str) -> String {
    format!("{prefix}/{}", slugify(name))
}

/// Lowercase, hyphen-delimited rendering of `name`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_prefix_and_slug() {
        assert_eq!(
            format_branch_name("marco", "Fix the Login Bug!"),
            "marco/fix-the-login-bug"
        );
    }

    #[test]
    fn blank_name_yields_empty_slug() {
        assert_eq!(format_branch_name("x", "   "), "x/");
    }

    #[test]
    fn collapses_runs_and_trims_edges() {
        assert_eq!(slugify("--Add  API__v2 (beta)--"), "add-api-v2-beta");
    }

    #[test]
    fn non_ascii_letters_are_separators() {
        assert_eq!(slugify("café au lait"), "caf-au-lait");
    }
}
