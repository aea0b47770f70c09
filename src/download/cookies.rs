//! Read-only view of the Netscape cookie file
//!
//! The file is produced by the external cookie-refresh sidecar and handed to
//! yt-dlp. The bot only parses it to report its health at startup and from
//! the `check-cookies` command; it never writes it.
//!
//! Format: a `# Netscape HTTP Cookie File` header followed by one
//! tab-separated line per cookie:
//! `domain  includeSubdomains  path  secure  expiration  name  value`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Header line every valid cookie file starts with
pub const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// curl/yt-dlp mark HttpOnly cookies with this prefix on the domain field
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Parsed cookie from Netscape format
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp, 0 means session cookie
    pub expires: i64,
    pub name: String,
    pub value: String,
}

impl ParsedCookie {
    pub fn is_session(&self) -> bool {
        self.expires == 0
    }

    /// Check if cookie is expired relative to `now` (unix seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        !self.is_session() && self.expires < now
    }
}

/// Parses one cookie line; comments, blank lines and malformed lines yield `None`.
pub fn parse_cookie_line(line: &str) -> Option<ParsedCookie> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = line.strip_prefix(HTTP_ONLY_PREFIX).unwrap_or(line);
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }

    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 7 {
        return None;
    }

    Some(ParsedCookie {
        domain: parts[0].to_string(),
        include_subdomains: parts[1] == "TRUE",
        path: parts[2].to_string(),
        secure: parts[3] == "TRUE",
        expires: parts[4].parse().ok()?,
        name: parts[5].to_string(),
        value: parts[6..].join("\t"),
    })
}

/// Summary of a cookie file
#[derive(Debug, Clone, Default)]
pub struct CookiesDiagnostic {
    pub has_header: bool,
    pub total_cookies: usize,
    pub session_cookies: usize,
    pub expired_cookies: usize,
    pub malformed_lines: usize,
    pub domains: Vec<String>,
    pub issues: Vec<String>,
}

impl CookiesDiagnostic {
    pub fn is_usable(&self) -> bool {
        self.has_header && self.total_cookies > self.expired_cookies
    }
}

/// Parse Netscape cookie file content and return diagnostics
pub fn diagnose_cookies_content(content: &str) -> CookiesDiagnostic {
    diagnose_cookies_content_at(content, unix_now())
}

fn diagnose_cookies_content_at(content: &str, now: i64) -> CookiesDiagnostic {
    let mut diagnostic = CookiesDiagnostic {
        has_header: content.lines().any(|l| l.trim() == NETSCAPE_HEADER),
        ..Default::default()
    };

    if !diagnostic.has_header {
        diagnostic.issues.push(format!("Missing '{}' header", NETSCAPE_HEADER));
    }

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed.starts_with('#') && !trimmed.starts_with(HTTP_ONLY_PREFIX)) {
            continue;
        }

        let Some(cookie) = parse_cookie_line(line) else {
            diagnostic.malformed_lines += 1;
            continue;
        };

        diagnostic.total_cookies += 1;
        if cookie.is_session() {
            diagnostic.session_cookies += 1;
        } else if cookie.is_expired_at(now) {
            diagnostic.expired_cookies += 1;
        }

        let domain = cookie.domain.trim_start_matches('.').to_string();
        if !diagnostic.domains.contains(&domain) {
            diagnostic.domains.push(domain);
        }
    }

    if diagnostic.total_cookies == 0 {
        diagnostic.issues.push("No cookies found".to_string());
    } else if diagnostic.expired_cookies == diagnostic.total_cookies {
        diagnostic.issues.push("All cookies are expired".to_string());
    } else if diagnostic.expired_cookies > 0 {
        diagnostic
            .issues
            .push(format!("{} expired cookies", diagnostic.expired_cookies));
    }

    if diagnostic.malformed_lines > 0 {
        diagnostic
            .issues
            .push(format!("{} malformed lines skipped", diagnostic.malformed_lines));
    }

    diagnostic
}

/// Reads and diagnoses a cookie file
pub fn diagnose_cookies_file(path: &Path) -> std::io::Result<CookiesDiagnostic> {
    let content = fs_err::read_to_string(path)?;
    Ok(diagnose_cookies_content(&content))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_800_000_000;

    #[test]
    fn test_parse_cookie_line() {
        let cookie = parse_cookie_line(".youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tf6=40000000").unwrap();
        assert_eq!(cookie.domain, ".youtube.com");
        assert!(cookie.include_subdomains);
        assert_eq!(cookie.path, "/");
        assert!(cookie.secure);
        assert!(cookie.is_session());
        assert_eq!(cookie.name, "PREF");
        assert_eq!(cookie.value, "f6=40000000");
    }

    #[test]
    fn test_parse_skips_comments_and_short_lines() {
        assert!(parse_cookie_line(NETSCAPE_HEADER).is_none());
        assert!(parse_cookie_line("").is_none());
        assert!(parse_cookie_line(".youtube.com\tTRUE\t/").is_none());
    }

    #[test]
    fn test_parse_http_only_prefix() {
        let cookie = parse_cookie_line("#HttpOnly_.youtube.com\tTRUE\t/\tFALSE\t1900000000\tSID\tabc").unwrap();
        assert_eq!(cookie.domain, ".youtube.com");
        assert!(!cookie.secure);
    }

    #[test]
    fn test_diagnose_counts() {
        let content = format!(
            "{}\n\
             .youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tx\n\
             .youtube.com\tTRUE\t/\tTRUE\t{}\tSID\ty\n\
             .instagram.com\tTRUE\t/\tTRUE\t{}\tsessionid\tz\n\
             garbage line\n",
            NETSCAPE_HEADER,
            NOW - 10,
            NOW + 86_400
        );
        let diagnostic = diagnose_cookies_content_at(&content, NOW);
        assert!(diagnostic.has_header);
        assert_eq!(diagnostic.total_cookies, 3);
        assert_eq!(diagnostic.session_cookies, 1);
        assert_eq!(diagnostic.expired_cookies, 1);
        assert_eq!(diagnostic.malformed_lines, 1);
        assert_eq!(diagnostic.domains, vec!["youtube.com".to_string(), "instagram.com".to_string()]);
        assert!(diagnostic.is_usable());
    }

    #[test]
    fn test_diagnose_missing_header() {
        let diagnostic = diagnose_cookies_content_at(".youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tx\n", NOW);
        assert!(!diagnostic.has_header);
        assert!(!diagnostic.is_usable());
        assert!(diagnostic.issues.iter().any(|i| i.contains("header")));
    }

    #[test]
    fn test_diagnose_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, format!("{}\n.youtube.com\tTRUE\t/\tTRUE\t0\tPREF\tx\n", NETSCAPE_HEADER)).unwrap();
        let diagnostic = diagnose_cookies_file(&path).unwrap();
        assert_eq!(diagnostic.total_cookies, 1);
    }
}
