//! Module capability flags.
//!
//! A flag is a named tag with two roles: any number of modules may
//! *advertise* possessing it, while at most one party may *claim* it. Only
//! the claimant — authenticated by the opaque token handed out at claim time
//! — may query which module namespaces advertised the flag.

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Per-runtime flag registry. Never persisted across restarts.
#[derive(Default)]
pub struct FlagRegistry {
    /// flag name -> advertising module namespace ids, in advertisement order
    advertisers: RwLock<HashMap<String, Vec<String>>>,
    /// flag name -> claim token of the single claimant
    owners: RwLock<HashMap<String, String>>,
}

impl FlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `namespace_id` advertises `flag`.
    pub fn advertise(&self, flag: &str, namespace_id: &str) {
        let mut advertisers = self.advertisers.write();
        let entries = advertisers.entry(flag.to_string()).or_default();
        if !entries.iter().any(|n| n == namespace_id) {
            entries.push(namespace_id.to_string());
        }
    }

    /// Drop every advertisement made by `namespace_id`. Called on unload.
    pub fn retract(&self, namespace_id: &str) {
        let mut advertisers = self.advertisers.write();
        for entries in advertisers.values_mut() {
            entries.retain(|n| n != namespace_id);
        }
    }

    /// Claim `flag`, returning the claim token.
    ///
    /// Returns `None` when the flag already has a claimant.
    pub fn claim(&self, flag: &str) -> Option<String> {
        let mut owners = self.owners.write();
        if owners.contains_key(flag) {
            return None;
        }
        let token = Uuid::new_v4().simple().to_string();
        owners.insert(flag.to_string(), token.clone());
        tracing::debug!(flag, "flag claimed");
        Some(token)
    }

    /// Release a claim previously handed out for `flag`.
    ///
    /// Only the holder of the matching token can release it.
    pub fn release(&self, flag: &str, token: &str) -> bool {
        let mut owners = self.owners.write();
        if owners.get(flag).is_some_and(|t| t == token) {
            owners.remove(flag);
            return true;
        }
        false
    }

    /// Namespace ids of every module advertising `flag`.
    ///
    /// Returns `None` unless `token` matches the flag's claimant.
    pub fn namespaces_with(&self, flag: &str, token: &str) -> Option<Vec<String>> {
        if !self.owners.read().get(flag).is_some_and(|t| t == token) {
            return None;
        }
        Some(
            self.advertisers
                .read()
                .get(flag)
                .cloned()
                .unwrap_or_default(),
        )
    }

    pub fn is_claimed(&self, flag: &str) -> bool {
        self.owners.read().contains_key(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let flags = FlagRegistry::new();

        let token = flags.claim("telemetry").unwrap();
        assert!(flags.claim("telemetry").is_none());
        assert!(flags.is_claimed("telemetry"));

        assert!(flags.release("telemetry", &token));
        assert!(flags.claim("telemetry").is_some());
    }

    #[test]
    fn test_release_requires_matching_token() {
        let flags = FlagRegistry::new();
        flags.claim("telemetry").unwrap();

        assert!(!flags.release("telemetry", "wrong-token"));
        assert!(flags.is_claimed("telemetry"));
    }

    #[test]
    fn test_membership_requires_claim_token() {
        let flags = FlagRegistry::new();
        flags.advertise("telemetry", "sensor-a");
        flags.advertise("telemetry", "sensor-b");
        flags.advertise("telemetry", "sensor-a"); // duplicate advertisement

        let token = flags.claim("telemetry").unwrap();
        assert_eq!(
            flags.namespaces_with("telemetry", &token).unwrap(),
            vec!["sensor-a".to_string(), "sensor-b".to_string()]
        );
        assert!(flags.namespaces_with("telemetry", "forged").is_none());
    }

    #[test]
    fn test_retract_removes_all_advertisements() {
        let flags = FlagRegistry::new();
        flags.advertise("telemetry", "sensor-a");
        flags.advertise("logging", "sensor-a");
        flags.advertise("telemetry", "sensor-b");

        flags.retract("sensor-a");

        let token = flags.claim("telemetry").unwrap();
        assert_eq!(
            flags.namespaces_with("telemetry", &token).unwrap(),
            vec!["sensor-b".to_string()]
        );
    }
}
