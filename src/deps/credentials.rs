//! Basic-auth credentials for private package repositories.

use std::fmt;

pub const USERNAME_VAR: &str = "GIT_USERNAME";
pub const PASSWORD_VAR: &str = "GIT_PASSWORD";

/// Username/secret pair used for a credentialed clone.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read credentials from `GIT_USERNAME` / `GIT_PASSWORD` at call time.
///
/// Returns `None` when the password is unset or empty, whatever the username.
pub fn resolve() -> Option<Credentials> {
    resolve_from(|key| std::env::var(key).ok())
}

/// Same as [`resolve`], with an arbitrary variable lookup.
pub fn resolve_from<F>(lookup: F) -> Option<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let password = lookup(PASSWORD_VAR).filter(|p| !p.is_empty())?;
    let username = lookup(USERNAME_VAR).unwrap_or_default();
    Some(Credentials { username, password })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_both_set() {
        let creds = resolve_from(env(&[(USERNAME_VAR, "bot"), (PASSWORD_VAR, "s3cret")])).unwrap();
        assert_eq!(creds.username, "bot");
        assert_eq!(creds.password, "s3cret");
    }

    #[test]
    fn test_empty_password_is_absent() {
        assert!(resolve_from(env(&[(USERNAME_VAR, "bot"), (PASSWORD_VAR, "")])).is_none());
        assert!(resolve_from(env(&[(USERNAME_VAR, "bot")])).is_none());
    }

    #[test]
    fn test_password_without_username() {
        let creds = resolve_from(env(&[(PASSWORD_VAR, "token")])).unwrap();
        assert_eq!(creds.username, "");
    }

    #[test]
    fn test_resolve_reads_process_env_at_call_time() {
        temp_env::with_vars(
            [(USERNAME_VAR, Some("ci")), (PASSWORD_VAR, Some("abc"))],
            || {
                let creds = resolve().unwrap();
                assert_eq!(creds.username, "ci");
            },
        );
        temp_env::with_vars([(PASSWORD_VAR, None::<&str>)], || {
            assert!(resolve().is_none());
        });
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            username: "bot".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("redacted"));
    }
}
