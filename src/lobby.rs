use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use rand::seq::SliceRandom;

use crate::models::game_match::PlayerIdentity;

// Players waiting for an opponent, with the time they started hosting
#[derive(Default)]
pub struct Lobby {
    hosts: DashMap<PlayerIdentity, DateTime<Utc>>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the identity is already hosting.
    pub fn host(&self, identity: &str) -> bool {
        match self.hosts.entry(identity.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Utc::now());
                true
            }
        }
    }

    pub fn unhost(&self, identity: &str) -> bool {
        self.hosts.remove(identity).is_some()
    }

    pub fn is_hosting(&self, identity: &str) -> bool {
        self.hosts.contains_key(identity)
    }

    /// Claims a random host other than `guest`.
    ///
    /// Two guests racing for the same host cannot both win it: only the one
    /// whose removal succeeds gets it, the other draws again.
    pub fn take_random_host(&self, guest: &str) -> Option<PlayerIdentity> {
        let mut rng = rand::thread_rng();
        loop {
            let candidates: Vec<PlayerIdentity> = self
                .hosts
                .iter()
                .map(|entry| entry.key().clone())
                .filter(|host| host != guest)
                .collect();
            let pick = candidates.choose(&mut rng)?;
            if let Some((host, _)) = self.hosts.remove(pick) {
                return Some(host);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn host_twice_is_refused() {
        let lobby = Lobby::new();
        assert!(lobby.host("alice"));
        assert!(!lobby.host("alice"));
        assert!(lobby.unhost("alice"));
        assert!(!lobby.unhost("alice"));
    }

    #[test]
    fn guest_never_joins_itself() {
        let lobby = Lobby::new();
        lobby.host("alice");
        assert_eq!(lobby.take_random_host("alice"), None);
        assert!(lobby.is_hosting("alice"));
        assert_eq!(lobby.take_random_host("bob").as_deref(), Some("alice"));
        assert!(!lobby.is_hosting("alice"));
    }

    #[test]
    fn each_host_is_claimed_once() {
        let lobby = Arc::new(Lobby::new());
        for i in 0..16 {
            lobby.host(&format!("host-{i}"));
        }

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let lobby = Arc::clone(&lobby);
                std::thread::spawn(move || lobby.take_random_host(&format!("guest-{i}")))
            })
            .collect();
        let claimed: Vec<_> = handles.into_iter().filter_map(|h| h.join().unwrap()).collect();

        assert_eq!(claimed.len(), 16);
        assert_eq!(claimed.iter().collect::<HashSet<_>>().len(), 16);
    }
}
