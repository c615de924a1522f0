use crate::{UrlError, UrlResult};
use url::{Host, ParseError, Url};

/// Link prefixes that never lead to a crawlable page
const REJECTED_PREFIXES: &[&str] = &["javascript:", "tel:", "mailto:"];

/// Canonicalizes a raw `href` value found on a page of the site rooted at `site_url`
///
/// # Canonicalization Steps
///
/// 1. Reject empty or single-character values and `javascript:`, `tel:`, `mailto:` links
/// 2. Strip the fragment (`#...`) and the query string (`?...`)
/// 3. Relative paths are resolved against the site root; absolute URLs must be
///    on the site's host (a leading `www.` is ignored when comparing)
/// 4. The host gets a `www.` label when it is a dotted domain name without one
/// 5. Runs of consecutive slashes in the path collapse to one
/// 6. The result always ends with a trailing slash
///
/// The output only depends on its inputs, so canonical links can be
/// deduplicated by plain string equality.
///
/// # Examples
///
/// ```
/// use sitesearch::url::canonicalize;
///
/// let link = canonicalize("/a/b", "https://x.com/").unwrap();
/// assert_eq!(link, "https://www.x.com/a/b/");
///
/// let link = canonicalize("https://x.com/a?x=1#y", "https://x.com/").unwrap();
/// assert_eq!(link, "https://www.x.com/a/");
///
/// assert!(canonicalize("mailto:a@b.com", "https://x.com/").is_err());
/// ```
pub fn canonicalize(href: &str, site_url: &str) -> UrlResult<String> {
    let href = href.trim();

    if href.chars().count() <= 1 {
        return Err(UrlError::Rejected(href.to_string()));
    }

    let lowered = href.to_ascii_lowercase();
    if REJECTED_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Err(UrlError::Rejected(href.to_string()));
    }

    let base = parse_site_url(site_url)?;
    let stripped = strip_fragment_and_query(href);

    let raw_path = if let Some(rest) = stripped.strip_prefix("//") {
        // protocol-relative: borrow the site's scheme
        let absolute = parse_absolute(&format!("{}://{}", base.scheme(), rest))?;
        ensure_same_host(&absolute, &base, href)?;
        absolute.path().to_string()
    } else {
        match Url::parse(stripped) {
            Ok(absolute) => {
                if absolute.scheme() != "http" && absolute.scheme() != "https" {
                    return Err(UrlError::InvalidScheme(absolute.scheme().to_string()));
                }
                ensure_same_host(&absolute, &base, href)?;
                absolute.path().to_string()
            }
            Err(ParseError::RelativeUrlWithoutBase) => relative_path(&base, stripped)?,
            Err(e) => return Err(UrlError::Parse(e.to_string())),
        }
    };

    Ok(format!("{}{}", origin(&base), finish_path(&raw_path)))
}

/// Returns the canonical root URL of a configured site
///
/// # Examples
///
/// ```
/// use sitesearch::url::site_root;
///
/// assert_eq!(site_root("https://example.com").unwrap(), "https://www.example.com/");
/// assert_eq!(site_root("http://127.0.0.1:8080").unwrap(), "http://127.0.0.1:8080/");
/// ```
pub fn site_root(site_url: &str) -> UrlResult<String> {
    let base = parse_site_url(site_url)?;
    Ok(format!("{}/", origin(&base)))
}

/// Computes the site-relative path (leading slash) of a canonical link
///
/// Returns `None` when the link does not start with the site root.
pub fn site_relative_path(link: &str, root: &str) -> Option<String> {
    let rest = link.strip_prefix(root.trim_end_matches('/'))?;
    if rest.is_empty() {
        return Some("/".to_string());
    }
    if !rest.starts_with('/') {
        return None;
    }
    Some(rest.to_string())
}

/// Returns true when `url` lives on the site configured as `site_url`
pub fn same_site(site_url: &str, url: &str) -> bool {
    match (parse_site_url(site_url), Url::parse(url.trim())) {
        (Ok(base), Ok(candidate)) => {
            matches!(candidate.scheme(), "http" | "https")
                && host_key(&candidate) == host_key(&base)
                && candidate.port() == base.port()
        }
        _ => false,
    }
}

fn parse_site_url(site_url: &str) -> UrlResult<Url> {
    let url = Url::parse(site_url.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

fn parse_absolute(candidate: &str) -> UrlResult<Url> {
    Url::parse(candidate).map_err(|e| UrlError::Parse(e.to_string()))
}

fn ensure_same_host(link: &Url, base: &Url, href: &str) -> UrlResult<()> {
    if host_key(link) == host_key(base) && link.port() == base.port() {
        Ok(())
    } else {
        Err(UrlError::ForeignHost(href.to_string()))
    }
}

/// Resolves a relative reference against the site root
fn relative_path(base: &Url, stripped: &str) -> UrlResult<String> {
    let rooted = if stripped.starts_with('/') {
        collapse_slashes(stripped)
    } else {
        collapse_slashes(&format!("/{}", stripped))
    };

    // let the url crate resolve dot segments and percent-encoding
    let resolved = parse_absolute(&format!("{}{}", origin(base), rooted))?;
    Ok(resolved.path().to_string())
}

/// Cuts everything from the first `#`, then everything from the first `?`
fn strip_fragment_and_query(href: &str) -> &str {
    let without_fragment = href.split('#').next().unwrap_or_default();
    without_fragment.split('?').next().unwrap_or_default()
}

fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !previous_slash {
                collapsed.push(c);
            }
            previous_slash = true;
        } else {
            collapsed.push(c);
            previous_slash = false;
        }
    }
    collapsed
}

fn finish_path(path: &str) -> String {
    let mut path = collapse_slashes(path);
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// `scheme://host[:port]` with the `www.` label applied
fn origin(base: &Url) -> String {
    let host = match base.host() {
        Some(Host::Domain(domain)) => with_www(&domain.to_lowercase()),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    match base.port() {
        Some(port) => format!("{}://{}:{}", base.scheme(), host, port),
        None => format!("{}://{}", base.scheme(), host),
    }
}

/// Adds `www.` to dotted domain names that lack it; IPs and `localhost` stay as-is
fn with_www(domain: &str) -> String {
    if domain.starts_with("www.") || !domain.contains('.') {
        domain.to_string()
    } else {
        format!("www.{}", domain)
    }
}

/// Host used for same-site comparison: lowercase, without a leading `www.`
fn host_key(url: &Url) -> Option<String> {
    url.host_str().map(|host| {
        let host = host.to_lowercase();
        match host.strip_prefix("www.") {
            Some(rest) => rest.to_string(),
            None => host,
        }
    })
}
