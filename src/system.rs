//! Username and hostname lookup for the system-info banner slots

use nix::unistd::{User, getuid};
use tracing::warn;

/// Login name of the invoking user; empty when the uid has no passwd entry
pub fn username() -> String {
    match User::from_uid(getuid()) {
        Ok(Some(user)) => user.name,
        Ok(None) => String::new(),
        Err(err) => {
            warn!(%err, "could not resolve current user");
            String::new()
        }
    }
}

/// Short hostname (everything before the first dot)
pub fn hostname() -> String {
    let host = match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(err) => {
            warn!(%err, "could not resolve hostname");
            return String::new();
        }
    };
    host.split('.').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_has_no_domain_part() {
        assert!(!hostname().contains('.'));
    }

    #[test]
    fn username_never_panics() {
        // May legitimately be empty in a stripped-down container
        let _ = username();
    }
}
