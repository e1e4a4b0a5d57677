use reqwest::Url;

use crate::CourierError;

/// Joins a base URL and a relative path with exactly one `/` between them.
///
/// An empty base yields `relative` verbatim; an empty relative path yields
/// the base without its trailing `/`.
///
/// ```
/// use courier_http::build_url;
///
/// assert_eq!(build_url("http://host/", "/path"), "http://host/path");
/// assert_eq!(build_url("http://host", "path"), "http://host/path");
/// ```
pub fn build_url(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_owned();
    }

    let base = base.strip_suffix('/').unwrap_or(base);
    if relative.is_empty() {
        return base.to_owned();
    }

    match relative.strip_prefix('/') {
        Some(rest) => format!("{base}/{rest}"),
        None => format!("{base}/{relative}"),
    }
}

/// Parses `raw` and requires both a scheme and a host.
pub fn parse_absolute_url(raw: &str) -> Result<Url, CourierError> {
    let bad_url = |reason: String| CourierError::BadUrl {
        url: raw.to_owned(),
        reason,
    };

    let url = Url::parse(raw).map_err(|err| bad_url(err.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(bad_url("missing host".to_owned()));
    }
    Ok(url)
}
