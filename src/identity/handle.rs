use crate::HandleError;
use url::Host;

/// Splits a handle into its username and instance domain
///
/// Bare handles belong to `home_domain`. A single leading `@` (the display
/// form, `@alice@example.com`) is accepted.
///
/// # Examples
///
/// ```
/// use fedi_ripple::identity::resolve;
///
/// assert_eq!(
///     resolve("alice@b.example", "a.example").unwrap(),
///     ("alice".to_string(), "b.example".to_string())
/// );
/// assert_eq!(
///     resolve("bob", "a.example").unwrap(),
///     ("bob".to_string(), "a.example".to_string())
/// );
/// assert!(resolve("@", "a.example").is_err());
/// ```
pub fn resolve(handle: &str, home_domain: &str) -> Result<(String, String), HandleError> {
    let malformed = |reason| HandleError::Malformed {
        handle: handle.to_string(),
        reason,
    };

    let trimmed = handle.strip_prefix('@').unwrap_or(handle);

    let (username, domain) = match trimmed.split_once('@') {
        Some((username, domain)) => (username, domain),
        None => (trimmed, home_domain),
    };

    if username.is_empty() {
        return Err(malformed("empty username"));
    }
    if domain.is_empty() {
        return Err(malformed("empty instance domain"));
    }
    if domain.contains('@') {
        return Err(malformed("more than one '@' separator"));
    }
    if username.chars().any(char::is_whitespace) || domain.chars().any(char::is_whitespace) {
        return Err(malformed("contains whitespace"));
    }
    if let Err(reason) = check_domain(domain) {
        return Err(malformed(reason));
    }

    Ok((username.to_string(), domain.to_string()))
}

/// Accepts `host` or `host:port`, where host is a DNS name or an IPv4 address
fn check_domain(domain: &str) -> Result<(), &'static str> {
    let host = match domain.rsplit_once(':') {
        Some((host, port)) => {
            port.parse::<u16>().map_err(|_| "invalid port")?;
            host
        }
        None => domain,
    };

    if host.is_empty() {
        return Err("empty instance domain");
    }
    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err("invalid character in instance domain");
    }
    if host.starts_with(['.', '-']) || host.ends_with(['.', '-']) || host.contains("..") {
        return Err("invalid instance domain");
    }
    Host::parse(host).map_err(|_| "invalid instance domain")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "a.example";

    fn ok(handle: &str) -> (String, String) {
        resolve(handle, HOME).unwrap()
    }

    #[test]
    fn test_qualified_handle() {
        assert_eq!(ok("alice@b.example"), ("alice".into(), "b.example".into()));
        assert_eq!(ok("bob@a.example"), ("bob".into(), "a.example".into()));
    }

    #[test]
    fn test_bare_handle_belongs_to_home() {
        assert_eq!(ok("bob"), ("bob".into(), HOME.into()));
        assert_eq!(ok("bob_99"), ("bob_99".into(), HOME.into()));
    }

    #[test]
    fn test_leading_at_is_stripped() {
        assert_eq!(ok("@alice@b.example"), ("alice".into(), "b.example".into()));
        assert_eq!(ok("@bob"), ("bob".into(), HOME.into()));
    }

    #[test]
    fn test_domain_with_port() {
        assert_eq!(
            ok("carol@127.0.0.1:3000"),
            ("carol".into(), "127.0.0.1:3000".into())
        );
    }

    #[test]
    fn test_malformed_handles() {
        for handle in [
            "",
            "@",
            "@@",
            "@@b.example",
            "alice@",
            "a@b@c",
            "al ice",
            "alice@b .example",
            "a@b.example/x",
            "a@b?c",
            "a@b#c",
            "a@b.example:",
            "a@b.example:99999",
            "a@.b.example",
            "a@b..example",
        ] {
            assert!(
                matches!(resolve(handle, HOME), Err(HandleError::Malformed { .. })),
                "{:?} should be malformed",
                handle
            );
        }
    }

    #[test]
    fn test_bare_handle_with_empty_home_is_malformed() {
        assert!(resolve("bob", "").is_err());
    }

    #[test]
    fn test_path_and_query_never_reach_the_domain() {
        let err = resolve("alice@b.example/evil", HOME).unwrap_err();
        assert_eq!(
            err,
            HandleError::Malformed {
                handle: "alice@b.example/evil".into(),
                reason: "invalid character in instance domain",
            }
        );
        assert!(resolve("alice@internal.host:8080/admin?x=#", HOME).is_err());
    }

    #[test]
    fn test_bare_handle_with_invalid_home_is_malformed() {
        assert!(resolve("bob", "a.example/x").is_err());
    }
}
