use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a URL into the identity used by the sitemap and retry ledger
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything other than http/https
/// 3. Lowercase the host
/// 4. Remove dot segments and duplicate slashes from the path; keep a
///    trailing slash, since `/dir/` and `/dir` can be different resources
/// 5. Remove the fragment
/// 6. Sort query parameters by name (values and duplicates are kept)
/// 7. Remove an empty query string
///
/// # Examples
///
/// ```
/// use sumi_audit::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.COM/a/../login.php?b=2&a=1#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/login.php?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = sorted_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Resolves `input` against `base` and normalizes the result
///
/// Absolute inputs ignore the base; relative inputs (`/path`, `page.php`,
/// `?q=1`) are joined onto it.
pub fn resolve_url(base: &Url, input: &str) -> UrlResult<Url> {
    let joined = base
        .join(input.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", input, e)))?;
    normalize_url(joined.as_str())
}

/// Normalizes a URL path by removing dot segments and duplicate slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let trailing_slash = path.len() > 1 && path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if trailing_slash {
        result.push('/');
    }
    result
}

fn sorted_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Stable sort keeps the order of repeated keys
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}
