//! Credential paths, secret-harvesting commands, and forbidden endpoints.
//!
//! These checks apply at every control level and run before any
//! read-only or approval logic. Paths are normalized lexically (no
//! filesystem access) before matching.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use pulse_core::BlockedCode;
use url::{Host, Url};

use crate::classifier::tokenize::tokenize;

/// Glob patterns for paths that are never read or written.
pub const SENSITIVE_PATH_PATTERNS: &[&str] = &[
    "/etc/shadow",
    "/etc/shadow-",
    "/etc/gshadow",
    "/etc/gshadow-",
    "/root/.ssh",
    "/root/.ssh/**",
    "/home/*/.ssh",
    "/home/*/.ssh/**",
    "**/.ssh",
    "**/.ssh/**",
    "/proc/*/environ",
    "**/*.pem",
    "**/*.key",
    "**/id_rsa*",
    "**/id_ed25519*",
    "**/id_ecdsa*",
    "**/id_dsa*",
    "**/*credentials*",
    "**/*secret*",
];

/// Hostnames of cloud instance-metadata services.
pub const METADATA_HOSTS: &[&str] = &[
    "169.254.169.254",
    "metadata.google.internal",
    "metadata.goog",
    "100.100.100.200",
    "fd00:ec2::254",
];

/// Substrings refused anywhere in a command, even when tokenizing fails.
const RAW_MARKERS: &[&str] = &[
    "/etc/shadow",
    "/etc/gshadow",
    ".ssh/",
    "/environ",
    "169.254.169.254",
    "metadata.google.internal",
];

/// Characters that make the shell expand a word into matching paths.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Secret locations every shell glob is tested against.
const SENSITIVE_SAMPLES: &[&str] = &[
    "/etc/shadow",
    "/etc/gshadow",
    "/root/.ssh/id_rsa",
    "/root/.ssh/authorized_keys",
    "/home/user/.ssh/id_rsa",
    "/home/user/.ssh/authorized_keys",
    "/proc/1/environ",
    "/proc/self/environ",
];

/// Secret names placed under the literal directory of a glob, directly and
/// one level further down.
const SENSITIVE_TAILS: &[&str] = &[
    "shadow",
    "shadow-",
    "gshadow",
    "gshadow-",
    "environ",
    ".ssh",
    ".ssh/id_rsa",
    ".ssh/id_ed25519",
    ".ssh/authorized_keys",
    ".ssh/config",
    "id_rsa",
    "id_ed25519",
    "server.pem",
    "server.key",
    "credentials",
    "secrets.yaml",
];

const FETCHERS: &[&str] = &["curl", "wget", "http", "https", "xh", "fetch", "lynx", "links"];

static SENSITIVE_GLOBS: LazyLock<Option<GlobSet>> = LazyLock::new(|| {
    let mut builder = GlobSetBuilder::new();
    for pattern in SENSITIVE_PATH_PATTERNS {
        match GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(true)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            },
            Err(e) => {
                tracing::error!(pattern, error = %e, "Invalid sensitive path pattern");
                return None;
            },
        }
    }
    builder
        .build()
        .inspect_err(|e| tracing::error!(error = %e, "Failed to build sensitive path set"))
        .ok()
});

/// Why a path or command was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveMatch {
    /// `SENSITIVE_PATH` or `SENSITIVE_COMMAND`.
    pub code: BlockedCode,
    /// Human-readable explanation.
    pub reason: String,
    /// The word, path, or host that matched.
    pub matched: String,
}

impl SensitiveMatch {
    fn path(matched: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: BlockedCode::SensitivePath,
            reason: reason.into(),
            matched: matched.into(),
        }
    }

    fn command(matched: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: BlockedCode::SensitiveCommand,
            reason: reason.into(),
            matched: matched.into(),
        }
    }
}

/// Outcome of checking a URL before it is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlVerdict {
    /// Safe to resolve and fetch. Hostnames still need their resolved
    /// addresses checked with [`blocked_ip_reason`].
    Allowed(Url),
    /// Refused by policy.
    Blocked(SensitiveMatch),
    /// Not a usable http(s) URL.
    Invalid(String),
}

/// Lexically normalize a path: collapse `//`, drop `.`, resolve `..`.
///
/// A `..` above the root of an absolute path stays at the root. A relative
/// path keeps leading `..` components.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Whether `path` is a credential or secret location.
///
/// Fails closed: if the pattern set could not be built, every path is
/// treated as sensitive.
#[must_use]
pub fn is_sensitive_path(path: &str) -> bool {
    let normalized = normalize_path(path.trim());
    let lower = normalized.to_ascii_lowercase();
    if METADATA_HOSTS.iter().any(|h| lower.contains(h)) {
        return true;
    }
    match SENSITIVE_GLOBS.as_ref() {
        Some(set) => set.is_match(&normalized),
        None => true,
    }
}

/// Check a path argument (file read, write, tail, search root).
#[must_use]
pub fn check_path(path: &str) -> Option<SensitiveMatch> {
    is_sensitive_path(path).then(|| {
        SensitiveMatch::path(
            path,
            format!("'{path}' is a credential or secret location and cannot be accessed"),
        )
    })
}

/// Whether the shell could expand the glob `word` onto a sensitive path.
///
/// The glob is matched against well-known secret locations and against
/// secret names under its own literal directory. A word that is not a valid
/// glob is left to the shell as-is and is not treated as one.
#[must_use]
pub fn glob_reaches_sensitive(word: &str) -> bool {
    if !word.contains(GLOB_META) {
        return false;
    }
    let pattern = normalize_path(word);
    let Ok(glob) = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .case_insensitive(true)
        .build()
    else {
        return false;
    };
    let matcher = glob.compile_matcher();

    let head = pattern
        .find(GLOB_META)
        .and_then(|i| pattern.get(..i))
        .unwrap_or_default();
    let dir = head
        .rfind('/')
        .and_then(|i| head.get(..=i))
        .unwrap_or_default();

    let under_dir = SENSITIVE_TAILS.iter().flat_map(|tail| {
        ["", "user/", "1/"].map(|middle| format!("{dir}{middle}{tail}"))
    });
    SENSITIVE_SAMPLES
        .iter()
        .map(|s| (*s).to_string())
        .chain(under_dir)
        .any(|candidate| matcher.is_match(&candidate) && is_sensitive_path(&candidate))
}

fn looks_like_path(word: &str) -> bool {
    word.contains('/') || word.starts_with('~') || word.contains('.') || word.starts_with("id_")
}

/// Check a shell command for secret harvesting and forbidden endpoints.
///
/// `allow_loopback` permits fetches of loopback and link-local addresses;
/// metadata endpoints are refused regardless.
#[must_use]
pub fn check_command(command: &str, allow_loopback: bool) -> Option<SensitiveMatch> {
    if let Ok(parsed) = tokenize(command) {
        for seg in &parsed.segments {
            let words = seg
                .words
                .iter()
                .chain(seg.redirects.iter().map(|r| &r.target));
            if let Some(found) = check_words(&seg.words, words, allow_loopback) {
                return Some(found);
            }
        }
    }

    let lower = command.to_ascii_lowercase();
    RAW_MARKERS
        .iter()
        .find(|m| lower.contains(*m))
        .map(|m| SensitiveMatch::command(*m, format!("command references '{m}'")))
}

fn check_words<'a>(
    argv: &[String],
    all: impl Iterator<Item = &'a String>,
    allow_loopback: bool,
) -> Option<SensitiveMatch> {
    for word in all {
        let candidates = std::iter::once(word.as_str())
            .chain(word.split_once('=').map(|(_, value)| value));
        for candidate in candidates {
            if !looks_like_path(candidate) {
                continue;
            }
            if is_sensitive_path(candidate) {
                return Some(SensitiveMatch::command(
                    candidate,
                    format!("command touches sensitive path '{candidate}'"),
                ));
            }
            if glob_reaches_sensitive(candidate) {
                return Some(SensitiveMatch::command(
                    candidate,
                    format!("'{candidate}' can expand onto a sensitive path"),
                ));
            }
        }
    }

    let (first, args) = argv.split_first()?;
    let bin = first.rsplit('/').next().unwrap_or(first);

    if bin == "ps" {
        let bsd_env = args.iter().any(|a| {
            !a.starts_with('-') && a.chars().all(|c| c.is_ascii_alphabetic()) && a.contains('e')
        });
        if bsd_env {
            return Some(SensitiveMatch::command(
                "ps e",
                "ps with the 'e' modifier prints process environments",
            ));
        }
    }

    if FETCHERS.contains(&bin) {
        for arg in args.iter().filter(|a| !a.starts_with('-')) {
            if let Some(reason) = fetch_target_reason(arg, allow_loopback) {
                return Some(SensitiveMatch::command(arg.as_str(), reason));
            }
        }
    }
    None
}

/// Parse a fetch argument that may omit its scheme.
fn parse_target(arg: &str) -> Option<Url> {
    if arg.contains("://") {
        return Url::parse(arg).ok();
    }
    let host_part = arg.split(['/', '?']).next().unwrap_or(arg);
    let hostlike = host_part == "localhost"
        || host_part.contains('.')
        || host_part.starts_with('[')
        || host_part.contains(':');
    if hostlike {
        Url::parse(&format!("http://{arg}")).ok()
    } else {
        None
    }
}

fn fetch_target_reason(arg: &str, allow_loopback: bool) -> Option<String> {
    let url = parse_target(arg)?;
    host_reason(url.host()?, allow_loopback)
}

fn host_reason(host: Host<&str>, allow_loopback: bool) -> Option<String> {
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            if METADATA_HOSTS.contains(&name.as_str()) {
                Some(format!("'{name}' is a cloud metadata endpoint"))
            } else if !allow_loopback && (name == "localhost" || name.ends_with(".localhost")) {
                Some(format!("'{name}' is a loopback address"))
            } else {
                None
            }
        },
        Host::Ipv4(ip) => blocked_ip_reason(IpAddr::V4(ip), allow_loopback).map(str::to_string),
        Host::Ipv6(ip) => blocked_ip_reason(IpAddr::V6(ip), allow_loopback).map(str::to_string),
    }
}

/// Whether `ip` is a cloud metadata address.
#[must_use]
pub fn is_metadata_ip(ip: IpAddr) -> bool {
    const AWS: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);
    const ALIBABA: Ipv4Addr = Ipv4Addr::new(100, 100, 100, 200);
    const AWS_V6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x0254);
    match ip {
        IpAddr::V4(v4) => v4 == AWS || v4 == ALIBABA,
        IpAddr::V6(v6) => {
            v6 == AWS_V6 || v6.to_ipv4_mapped().is_some_and(|v4| is_metadata_ip(IpAddr::V4(v4)))
        },
    }
}

/// Why fetching `ip` is refused, if it is.
#[must_use]
pub fn blocked_ip_reason(ip: IpAddr, allow_loopback: bool) -> Option<&'static str> {
    if is_metadata_ip(ip) {
        return Some("cloud metadata endpoints are never fetched");
    }
    if allow_loopback {
        return None;
    }
    let local = match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| {
                    v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
                })
        },
    };
    local.then_some("loopback and link-local addresses are not fetched")
}

/// Check a URL for the URL content tool.
#[must_use]
pub fn check_url(raw: &str, allow_loopback: bool) -> UrlVerdict {
    let url = match Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(e) => return UrlVerdict::Invalid(format!("invalid URL: {e}")),
    };
    if !matches!(url.scheme(), "http" | "https") {
        return UrlVerdict::Invalid(format!(
            "unsupported scheme '{}': only http and https are fetched",
            url.scheme()
        ));
    }
    let Some(host) = url.host() else {
        return UrlVerdict::Invalid("URL has no host".to_string());
    };
    if let Some(reason) = host_reason(host, allow_loopback) {
        let matched = url.host_str().unwrap_or_default().to_string();
        return UrlVerdict::Blocked(SensitiveMatch::path(matched, reason));
    }
    UrlVerdict::Allowed(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/etc//ssh/../shadow"), "/etc/shadow");
        assert_eq!(normalize_path("/../../etc/./shadow"), "/etc/shadow");
        assert_eq!(normalize_path("/var/log/"), "/var/log");
        assert_eq!(normalize_path("a/../../b"), "../b");
        assert_eq!(normalize_path("./"), ".");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_sensitive_paths() {
        for path in [
            "/etc/shadow",
            "/etc/gshadow-",
            "/root/.ssh/authorized_keys",
            "/home/alice/.ssh/id_ed25519",
            "~/.ssh/config",
            "/proc/1/environ",
            "/proc/self/environ",
            "/etc/ssl/private/server.key",
            "/opt/app/tls.PEM",
            "/srv/app/aws_credentials",
            "/var/lib/app/client_secret.json",
            "/var/log/../../etc/shadow",
            "/etc//shadow",
        ] {
            assert!(is_sensitive_path(path), "{path}");
        }
        for path in [
            "/etc/hosts",
            "/var/log/syslog",
            "/etc/ssh/sshd_config",
            "/proc/1/status",
            "/etc/nginx/nginx.conf",
        ] {
            assert!(!is_sensitive_path(path), "{path}");
        }
    }

    #[test]
    fn test_check_path_code() {
        let found = check_path("/etc/shadow").unwrap();
        assert_eq!(found.code, BlockedCode::SensitivePath);
        assert!(check_path("/etc/hosts").is_none());
    }

    #[test]
    fn test_commands_reading_secrets() {
        for cmd in [
            "cat /etc/shadow",
            "grep root /etc/shadow",
            "tail -n 5 /root/.ssh/id_rsa",
            "head /home/bob/.ssh/id_ed25519",
            "strings /proc/1/environ",
            "cat /proc/self/environ | tr '\\0' '\\n'",
            "ps eww",
            "ps auxe",
            "cat --file=/etc/shadow",
            "ls > /root/.ssh/x",
        ] {
            let found = check_command(cmd, false).unwrap_or_else(|| panic!("{cmd}"));
            assert_eq!(found.code, BlockedCode::SensitiveCommand, "{cmd}");
        }
    }

    #[test]
    fn test_globs_expanding_onto_secrets_are_refused() {
        for cmd in [
            "cat /etc/shad*",
            "cat /etc/sha?ow",
            "cat /etc/[gs]shadow",
            "cat /etc/{passwd,shadow}",
            "cat /proc/self/envir*",
            "strings /proc/[0-9]*/environ",
            "head /root/.ss*/authorized_keys",
            "cat /home/*/.ssh/id_*",
            "grep -r root /etc/*",
            "cat /opt/app/*.pem",
            "cat /srv/../etc/sh*dow",
        ] {
            let found = check_command(cmd, false).unwrap_or_else(|| panic!("{cmd}"));
            assert_eq!(found.code, BlockedCode::SensitiveCommand, "{cmd}");
        }
        for cmd in [
            "ls /etc/*.conf",
            "cat /var/log/nginx/*.log",
            "tail -n 20 /var/log/syslog*",
            "cat /proc/[0-9]*/status",
            "awk '/^[a-z]/ {print}' /etc/hosts",
        ] {
            assert!(check_command(cmd, false).is_none(), "{cmd}");
        }
    }

    #[test]
    fn test_raw_fallback_catches_untokenizable() {
        assert!(check_command("cat $(echo /etc/shadow)", false).is_some());
        assert!(check_command("xargs -0 < /proc/1/environ", false).is_some());
    }

    #[test]
    fn test_benign_commands_pass() {
        for cmd in [
            "ps aux",
            "ps -ef",
            "grep secret /var/log/app.log",
            "cat /etc/hosts",
            "curl -s https://example.com/health",
            "df -h",
        ] {
            assert!(check_command(cmd, false).is_none(), "{cmd}");
        }
    }

    #[test]
    fn test_fetch_targets() {
        assert!(check_command("curl http://169.254.169.254/latest/meta-data/", true).is_some());
        assert!(check_command("curl -s metadata.google.internal/computeMetadata", true).is_some());
        assert!(check_command("curl http://127.0.0.1:8080/", false).is_some());
        assert!(check_command("wget -qO- localhost:9090/metrics", false).is_some());
        assert!(check_command("curl http://[::1]/", false).is_some());
        assert!(check_command("curl http://127.0.0.1:8080/", true).is_none());
        assert!(check_command("curl https://example.com", false).is_none());
    }

    #[test]
    fn test_check_url() {
        assert!(matches!(
            check_url("https://example.com/a", false),
            UrlVerdict::Allowed(_)
        ));
        assert!(matches!(
            check_url("ftp://example.com", false),
            UrlVerdict::Invalid(_)
        ));
        assert!(matches!(check_url("not a url", false), UrlVerdict::Invalid(_)));

        let UrlVerdict::Blocked(found) = check_url("http://169.254.169.254/", true) else {
            panic!("metadata endpoint allowed");
        };
        assert_eq!(found.code, BlockedCode::SensitivePath);

        assert!(matches!(
            check_url("http://localhost:8080", false),
            UrlVerdict::Blocked(_)
        ));
        assert!(matches!(
            check_url("http://localhost:8080", true),
            UrlVerdict::Allowed(_)
        ));
        assert!(matches!(
            check_url("http://[fe80::1]/", false),
            UrlVerdict::Blocked(_)
        ));
    }

    #[test]
    fn test_blocked_ip_reason() {
        let meta: IpAddr = "169.254.169.254".parse().unwrap();
        assert!(blocked_ip_reason(meta, true).is_some());
        let link_local: IpAddr = "169.254.1.1".parse().unwrap();
        assert!(blocked_ip_reason(link_local, false).is_some());
        assert!(blocked_ip_reason(link_local, true).is_none());
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(blocked_ip_reason(mapped, false).is_some());
        let public: IpAddr = "93.184.216.34".parse().unwrap();
        assert!(blocked_ip_reason(public, false).is_none());
    }
}
