/// Clean up a configured public base URL.
///
/// Repairs `https:://` / `http:://`, keeps only the last URL when several were
/// pasted back to back, adds `https://` when no scheme is given, and strips
/// trailing slashes. Blank input stays blank.
///
/// # Examples
/// ```
/// use tasksheet::share::normalize_public_url;
///
/// assert_eq!(normalize_public_url("https:://foo.app/"), "https://foo.app");
/// assert_eq!(normalize_public_url("foo.app"), "https://foo.app");
/// assert_eq!(
///     normalize_public_url("https://old.app/https://new.app/"),
///     "https://new.app"
/// );
/// ```
pub fn normalize_public_url(url: &str) -> String {
    let mut text = url.trim().to_string();
    if text.is_empty() {
        return text;
    }

    text = text
        .replace("https:://", "https://")
        .replace("http:://", "http://");

    if text.matches("http://").count() + text.matches("https://").count() >= 2 {
        let last = [text.rfind("https://"), text.rfind("http://")]
            .into_iter()
            .flatten()
            .max();
        if let Some(start) = last {
            text = text[start..].to_string();
        }
    }

    if !text.starts_with("http://") && !text.starts_with("https://") {
        text = format!("https://{}", text);
    }

    text.trim_end_matches('/').to_string()
}

/// `<base>/?token=<token>`
pub fn token_link(base: &str, token: &str) -> String {
    format!("{}/?token={}", base.trim_end_matches('/'), urlencoding::encode(token))
}

/// `<base>/?payload=<payload>`
pub fn payload_link(base: &str, payload: &str) -> String {
    format!("{}/?payload={}", base.trim_end_matches('/'), urlencoding::encode(payload))
}
