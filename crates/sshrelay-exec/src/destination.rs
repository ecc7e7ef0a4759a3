//! Destination parsing and resolution
//!
//! Two input forms are accepted:
//!
//! * URI form, `ssh://[user@]host[:port]`, parsed with URI host rules so
//!   bracketed IPv6 literals work.
//! * Plain form, `[user@]host`. Whatever follows the `@` is the host, colons
//!   included, and the port is always 22. `host:2222` therefore resolves to
//!   the address `[host:2222]:22`. Use the URI form to pick a port.

use std::fmt;
use std::path::Path;

use percent_encoding::percent_decode_str;
use tracing::{debug, instrument};
use url::{Host, ParseError, Url};

use crate::error::DestinationError;
use crate::keys::{DIAL_TIMEOUT, HostKeyPolicy, SshCredentials, key_path, load_private_key};

/// Port used when the destination does not name one
pub const DEFAULT_PORT: u16 = 22;

const SSH_SCHEME: &str = "ssh";

/// Parsed `(user, host, port)` triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Login name, never empty
    pub user: String,
    /// Host name or address, never empty
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Destination {
    /// Parse a destination string
    ///
    /// # Errors
    /// * `DestinationError::InvalidDestination` - empty input, empty user or
    ///   host in the plain form, unsupported scheme, malformed URI
    /// * `DestinationError::MissingHost` - URI form without a host
    pub fn parse(spec: &str) -> Result<Self, DestinationError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(DestinationError::InvalidDestination("empty".to_string()));
        }

        if has_scheme(spec) {
            parse_uri(spec)
        } else {
            parse_plain(spec)
        }
    }

    /// `host:port` suitable for dialing; hosts containing a colon are bracketed
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.address())
    }
}

/// A destination together with the credentials to reach it
#[derive(Debug, Clone)]
pub struct Target {
    /// Where to connect
    pub destination: Destination,
    /// How to authenticate
    pub credentials: SshCredentials,
}

impl Target {
    /// Dial address
    #[must_use]
    pub fn address(&self) -> String {
        self.destination.address()
    }
}

/// Resolve a destination string and load the relay's private key
///
/// The key is read from `<config_dir>/ssh/id_rsa`.
///
/// # Errors
/// Any [`DestinationError`] from parsing, or `KeyLoadError` for the key
#[instrument(skip(config_dir, host_key_policy), level = "debug")]
pub fn resolve(
    spec: &str,
    config_dir: &Path,
    host_key_policy: HostKeyPolicy,
) -> Result<Target, DestinationError> {
    let destination = Destination::parse(spec)?;
    let key = load_private_key(&key_path(config_dir))?;

    debug!(%destination, "destination resolved");

    Ok(Target {
        credentials: SshCredentials::new(destination.user.clone(), key)
            .with_dial_timeout(DIAL_TIMEOUT)
            .with_host_key_policy(host_key_policy),
        destination,
    })
}

/// `scheme://` with an RFC 3986 scheme name
fn has_scheme(spec: &str) -> bool {
    let Some((scheme, _)) = spec.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn parse_uri(spec: &str) -> Result<Destination, DestinationError> {
    let url = Url::parse(spec).map_err(|e| match e {
        ParseError::EmptyHost => DestinationError::MissingHost,
        e => DestinationError::InvalidDestination(format!("invalid ssh URI {spec:?}: {e}")),
    })?;

    if url.scheme() != SSH_SCHEME {
        return Err(DestinationError::InvalidDestination(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }

    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    };
    if host.is_empty() {
        return Err(DestinationError::MissingHost);
    }

    let user = match url.username() {
        "" => current_user()?,
        name => percent_decode_str(name)
            .decode_utf8()
            .map_err(|e| DestinationError::InvalidDestination(format!("invalid username: {e}")))?
            .into_owned(),
    };

    Ok(Destination {
        user,
        host,
        port: url.port().unwrap_or(DEFAULT_PORT),
    })
}

fn parse_plain(spec: &str) -> Result<Destination, DestinationError> {
    let (user, host) = match spec.split_once('@') {
        Some((user, host)) => {
            if user.is_empty() {
                return Err(DestinationError::InvalidDestination(
                    "empty username".to_string(),
                ));
            }
            (user.to_string(), host)
        }
        None => (current_user()?, spec),
    };

    if host.is_empty() {
        return Err(DestinationError::InvalidDestination("empty host".to_string()));
    }

    Ok(Destination {
        user,
        host: host.to_string(),
        port: DEFAULT_PORT,
    })
}

/// Login name of the user running the relay
fn current_user() -> Result<String, DestinationError> {
    let name = whoami::fallible::username().map_err(|e| {
        DestinationError::InvalidDestination(format!("unable to determine current user: {e}"))
    })?;
    if name.is_empty() {
        return Err(DestinationError::InvalidDestination(
            "unable to determine current user".to_string(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TEST_KEY;

    struct Case {
        name: &'static str,
        input: &'static str,
        user: Option<&'static str>,
        address: &'static str,
    }

    #[test]
    fn test_parse_accepted_forms() {
        let cases = [
            Case {
                name: "ssh URI no port",
                input: "ssh://alice@example.com",
                user: Some("alice"),
                address: "example.com:22",
            },
            Case {
                name: "ssh URI with port",
                input: "ssh://bob@host:2222",
                user: Some("bob"),
                address: "host:2222",
            },
            Case {
                name: "ssh URI without user",
                input: "ssh://host.example:2200",
                user: None,
                address: "host.example:2200",
            },
            Case {
                name: "plain user@host",
                input: "carol@host.example",
                user: Some("carol"),
                address: "host.example:22",
            },
            Case {
                name: "plain host",
                input: "host.local",
                user: None,
                address: "host.local:22",
            },
            Case {
                name: "plain host with colon kept whole",
                input: "host:2222",
                user: None,
                address: "[host:2222]:22",
            },
            Case {
                name: "unbracketed ipv6 kept whole",
                input: "fe80::1:2222",
                user: None,
                address: "[fe80::1:2222]:22",
            },
            Case {
                name: "bracketed ipv6 via uri",
                input: "ssh://dave@[fe80::1]:2222",
                user: Some("dave"),
                address: "[fe80::1]:2222",
            },
            Case {
                name: "ipv4 via uri",
                input: "ssh://erin@10.0.0.7",
                user: Some("erin"),
                address: "10.0.0.7:22",
            },
            Case {
                name: "surrounding whitespace",
                input: "  frank@box \n",
                user: Some("frank"),
                address: "box:22",
            },
        ];

        for case in cases {
            let dest = Destination::parse(case.input)
                .unwrap_or_else(|e| panic!("{}: unexpected error {e}", case.name));
            match case.user {
                Some(user) => assert_eq!(dest.user, user, "{}", case.name),
                None => assert!(!dest.user.is_empty(), "{}: user empty", case.name),
            }
            assert_eq!(dest.address(), case.address, "{}", case.name);
        }
    }

    #[test]
    fn test_plain_user_at_host_defaults_port() {
        let dest = Destination::parse("alice@example.com").unwrap();
        assert_eq!(dest.user, "alice");
        assert_eq!(dest.host, "example.com");
        assert_eq!(dest.port, 22);
    }

    #[test]
    fn test_uri_port() {
        let dest = Destination::parse("ssh://bob@host:2222").unwrap();
        assert_eq!(dest.user, "bob");
        assert_eq!(dest.port, 2222);
    }

    #[test]
    fn test_uri_username_is_percent_decoded() {
        let dest = Destination::parse("ssh://al%69ce@host").unwrap();
        assert_eq!(dest.user, "alice");

        let dest = Destination::parse("ssh://svc%40corp@host:2200").unwrap();
        assert_eq!(dest.user, "svc@corp");
        assert_eq!(dest.port, 2200);

        assert!(matches!(
            Destination::parse("ssh://%ff%fe@host"),
            Err(DestinationError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_missing_user_is_invoking_user() {
        let expected = whoami::fallible::username().unwrap();
        assert_eq!(Destination::parse("host.local").unwrap().user, expected);
        assert_eq!(Destination::parse("ssh://host.local").unwrap().user, expected);
    }

    #[test]
    fn test_colon_host_is_not_split() {
        let dest = Destination::parse("host:2222").unwrap();
        assert_eq!(dest.host, "host:2222");
        assert_eq!(dest.port, DEFAULT_PORT);
    }

    #[test]
    fn test_rejected_forms() {
        for input in ["", "   ", "@host", "alice@"] {
            let err = Destination::parse(input).unwrap_err();
            assert!(
                matches!(err, DestinationError::InvalidDestination(_)),
                "{input:?}: {err:?}"
            );
        }
    }

    #[test]
    fn test_uri_without_host() {
        assert_eq!(
            Destination::parse("ssh://alice@:22"),
            Err(DestinationError::MissingHost)
        );
    }

    #[test]
    fn test_uri_bad_port() {
        assert!(matches!(
            Destination::parse("ssh://bob@host:notaport"),
            Err(DestinationError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_uri_other_scheme() {
        assert!(matches!(
            Destination::parse("http://bob@host"),
            Err(DestinationError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_resolve_loads_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ssh")).unwrap();
        std::fs::write(dir.path().join("ssh/id_rsa"), TEST_KEY).unwrap();

        let target = resolve("ssh://bob@host:2222", dir.path(), HostKeyPolicy::default()).unwrap();
        assert_eq!(target.address(), "host:2222");
        assert_eq!(target.credentials.user, "bob");
        assert_eq!(target.credentials.dial_timeout, DIAL_TIMEOUT);
        assert_eq!(
            target.credentials.host_key_policy,
            HostKeyPolicy::InsecureAcceptAny
        );
    }

    #[test]
    fn test_resolve_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve("alice@host", dir.path(), HostKeyPolicy::default()).unwrap_err();
        assert!(matches!(err, DestinationError::KeyLoadError { .. }));
    }

    #[test]
    fn test_resolve_reports_destination_before_key() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve("@host", dir.path(), HostKeyPolicy::default()).unwrap_err();
        assert!(matches!(err, DestinationError::InvalidDestination(_)));
    }
}
