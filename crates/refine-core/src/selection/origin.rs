/// URL schemes owned by the browser itself.
const RESTRICTED_SCHEMES: &[&str] = &[
    "chrome:",
    "chrome-extension:",
    "chrome-search:",
    "edge:",
    "about:",
    "moz-extension:",
    "view-source:",
    "devtools:",
];

/// Extension galleries where content scripts are blocked.
const RESTRICTED_HOSTS: &[&str] = &[
    "chrome.google.com/webstore",
    "chromewebstore.google.com",
    "microsoftedge.microsoft.com/addons",
    "addons.mozilla.org",
];

/// Whether capture must not run on a page with this origin (or URL).
pub fn is_restricted_origin(origin: &str) -> bool {
    let origin = origin.trim().to_ascii_lowercase();
    if origin.is_empty() {
        return true;
    }
    if RESTRICTED_SCHEMES
        .iter()
        .any(|scheme| origin.starts_with(scheme))
    {
        return true;
    }
    let without_scheme = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .unwrap_or(&origin);
    RESTRICTED_HOSTS
        .iter()
        .any(|host| without_scheme.starts_with(host))
}
