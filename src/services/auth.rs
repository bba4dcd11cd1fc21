use std::collections::HashSet;

use tracing::warn;

/// Authorization gate over the configured set of privileged identities.
///
/// Loaded once at startup and immutable for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct AdminRoster {
    admins: HashSet<i64>,
}

impl AdminRoster {
    /// Build the roster from the configured identities.
    pub fn new(admins: impl IntoIterator<Item = i64>) -> Self {
        let admins: HashSet<i64> = admins.into_iter().collect();
        if admins.is_empty() {
            warn!("no administrators configured; every admin command will be rejected");
        }
        Self { admins }
    }

    /// Whether `user_id` may run admin commands. Unknown identities are not
    /// admins; there is no failure mode.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_decides_admin_rights() {
        let roster = AdminRoster::new([904281253, 7]);
        assert!(roster.is_admin(904281253));
        assert!(roster.is_admin(7));
        assert!(!roster.is_admin(8));
    }

    #[test]
    fn empty_roster_rejects_everyone() {
        let roster = AdminRoster::new([]);
        assert!(!roster.is_admin(0));
        assert!(!roster.is_admin(904281253));
    }
}
