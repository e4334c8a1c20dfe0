//! Session registry -- the set of usernames that have sent LOGIN.
//!
//! Not a security boundary. There is no password, no expiry, no logout and no
//! binding to a connection: once a name is registered, any connection that
//! presents it is treated as logged in for the life of the process.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    users: HashSet<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `username`. Always succeeds; returns whether the name is new.
    pub fn authenticate(&mut self, username: &str) -> bool {
        let added = self.users.insert(username.to_string());
        if added {
            tracing::info!(username, sessions = self.users.len(), "session: user logged in");
        } else {
            tracing::debug!(username, "session: repeat login");
        }
        added
    }

    pub fn is_authenticated(&self, username: &str) -> bool {
        self.users.contains(username)
    }
}
