//! Pull request URL extraction from `gh pr create` output.

use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));

/// Return the first URL-shaped substring of `output`.
///
/// Falls back to the trimmed output when no URL is present, so the caller
/// always has something to show.
pub fn extract_pr_url(output: &str) -> String {
    URL_RE
        .find(output)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| output.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_url() {
        let out = "Creating pull request for marco/fix into main\n\nhttps://github.com/acme/app/pull/42\nhttps://example.com/other\n";
        assert_eq!(extract_pr_url(out), "https://github.com/acme/app/pull/42");
    }

    #[test]
    fn falls_back_to_trimmed_output() {
        assert_eq!(extract_pr_url("  created  \n"), "created");
    }
}
