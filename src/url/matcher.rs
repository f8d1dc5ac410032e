/// Checks if a host is in scope for a host pattern
///
/// A plain pattern only matches itself. A `*.` pattern matches the bare
/// domain and any subdomain at any depth, which is how scope is widened
/// when subdomains are included.
///
/// # Examples
///
/// ```
/// use sumi_audit::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "badexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Checks if a URL matches any exclusion pattern
///
/// Patterns are plain substrings, compared case-insensitively against the
/// full URL, so `logout` excludes `/account/Logout.php?x=1`.
pub fn matches_any_pattern(patterns: &[String], url: &str) -> bool {
    let haystack = url.to_lowercase();
    patterns
        .iter()
        .any(|pattern| haystack.contains(&pattern.to_lowercase()))
}
