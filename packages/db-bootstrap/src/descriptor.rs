//! Connection URL parsing.
//!
//! Turns a raw `DATABASE_URL` value into a [`ConnectionDescriptor`]. The
//! driver-qualified alias (`postgresql+asyncpg://`) is rewritten to the
//! canonical prefix before any component is extracted.

use std::borrow::Cow;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use percent_encoding::percent_decode_str;

use crate::error::FailureReason;

pub const CLIENT_SERVER_ALIAS: &str = "postgresql+asyncpg://";
pub const CLIENT_SERVER_PREFIX: &str = "postgresql://";

const CLIENT_SERVER_SCHEME: &str = "postgresql";
const EMBEDDED_SCHEME: &str = "sqlite";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_USER: &str = "postgres";

/// Backend family selected by the URL scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// File-backed embedded database; no server-side existence/create steps.
    Embedded,
    /// Client/server database reached over the network.
    ClientServer,
    /// Anything else. Carries the raw scheme for error reporting.
    Unsupported(String),
}

/// Parsed, defaulted view of a connection URL. Built once per run.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl ConnectionDescriptor {
    /// `host:port` of the administrative connection, safe to print.
    pub fn server_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ConnectionDescriptor")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Default)]
struct Authority {
    user: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

/// Parse a connection URL.
///
/// Unknown schemes yield [`Backend::Unsupported`]; only input that cannot be
/// read as `scheme:[//authority]path` at all is an error.
pub fn parse_connection_url(raw: &str) -> Result<ConnectionDescriptor, FailureReason> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FailureReason::UnparseableUrl(
            "connection URL is empty".to_string(),
        ));
    }

    let normalized = normalize_alias(raw);
    let (scheme, rest) = split_scheme(&normalized)?;

    // Query and fragment never contribute to any field.
    let rest = rest.split('#').next().unwrap_or_default();
    let rest = rest.split('?').next().unwrap_or_default();

    let (authority, path) = match rest.strip_prefix("//") {
        Some(after) => {
            let end = after.find('/').unwrap_or(after.len());
            (Some(&after[..end]), &after[end..])
        }
        None => (None, rest),
    };

    let authority = match authority {
        Some(a) => parse_authority(a)?,
        None => Authority::default(),
    };

    let database = Some(decode(path.trim_start_matches('/'))).filter(|name| !name.is_empty());

    let backend = match scheme.as_str() {
        EMBEDDED_SCHEME => Backend::Embedded,
        CLIENT_SERVER_SCHEME => Backend::ClientServer,
        _ => Backend::Unsupported(scheme),
    };

    Ok(ConnectionDescriptor {
        backend,
        host: authority.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: authority.port.unwrap_or(DEFAULT_PORT),
        user: authority.user.unwrap_or_else(|| DEFAULT_USER.to_string()),
        password: authority.password.unwrap_or_default(),
        database,
    })
}

/// Only the portion of a URL after the last `@`, so credentials never print.
pub fn redacted_url(raw: &str) -> &str {
    raw.rsplit('@').next().unwrap_or(raw)
}

fn normalize_alias(raw: &str) -> Cow<'_, str> {
    match raw.get(..CLIENT_SERVER_ALIAS.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(CLIENT_SERVER_ALIAS) => Cow::Owned(format!(
            "{CLIENT_SERVER_PREFIX}{}",
            &raw[CLIENT_SERVER_ALIAS.len()..]
        )),
        _ => Cow::Borrowed(raw),
    }
}

fn split_scheme(url: &str) -> Result<(String, &str), FailureReason> {
    let Some((scheme, rest)) = url.split_once(':') else {
        return Err(FailureReason::UnparseableUrl(
            "missing '<scheme>:' prefix".to_string(),
        ));
    };

    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(FailureReason::UnparseableUrl(
            "invalid scheme".to_string(),
        ));
    }

    Ok((scheme.to_ascii_lowercase(), rest))
}

fn parse_authority(authority: &str) -> Result<Authority, FailureReason> {
    let (userinfo, hostport) = match authority.rsplit_once('@') {
        Some((userinfo, hostport)) => (Some(userinfo), hostport),
        None => (None, authority),
    };

    let (user, password) = match userinfo {
        Some(info) => match info.split_once(':') {
            Some((user, password)) => (Some(decode(user)), Some(decode(password))),
            None => (Some(decode(info)), None),
        },
        None => (None, None),
    };

    let (host, port) = split_host_port(hostport)?;

    Ok(Authority {
        user,
        password,
        host: Some(host.to_ascii_lowercase()).filter(|h| !h.is_empty()),
        port: match port {
            Some(port) => parse_port(port)?,
            None => None,
        },
    })
}

fn split_host_port(hostport: &str) -> Result<(&str, Option<&str>), FailureReason> {
    if let Some(bracketed) = hostport.strip_prefix('[') {
        let Some((host, after)) = bracketed.split_once(']') else {
            return Err(FailureReason::UnparseableUrl(
                "unterminated IPv6 host".to_string(),
            ));
        };
        return match after {
            "" => Ok((host, None)),
            _ => match after.strip_prefix(':') {
                Some(port) => Ok((host, Some(port))),
                None => Err(FailureReason::UnparseableUrl(
                    "unexpected characters after IPv6 host".to_string(),
                )),
            },
        };
    }

    Ok(match hostport.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (hostport, None),
    })
}

/// An empty port (`host:`) counts as absent. The rejected text is never
/// echoed: an unencoded `/` in a password puts part of the secret here.
fn parse_port(port: &str) -> Result<Option<u16>, FailureReason> {
    if port.is_empty() {
        return Ok(None);
    }
    port.parse::<u16>()
        .map(Some)
        .map_err(|_| FailureReason::UnparseableUrl("invalid port".to_string()))
}

fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}
