//! Named network profiles.
//!
//! A profile maps a symbolic network name ("local-dev", "staging") to the
//! connection and account parameters needed to talk to that network's node.
//! Profiles are loaded once at process start from a TOML file merged with
//! `CHAINRIG_*` environment overrides; every component that needs network
//! parameters receives a resolved profile explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use alloy_core::primitives::Address;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Environment prefix for profile overrides, e.g.
/// `CHAINRIG_NETWORKS__DEVNET__HOST=10.0.0.7`.
pub const ENV_PREFIX: &str = "CHAINRIG_";

/// Connection and account parameters for one named network.
///
/// Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// The symbolic network name. Filled in from the configuration key.
    #[serde(default)]
    pub name: String,
    /// Host of the node's HTTP JSON-RPC endpoint.
    pub host: String,
    /// Port of the node's HTTP JSON-RPC endpoint.
    pub port: u16,
    /// The account transactions are sent from.
    pub from_address: Address,
    /// Expected chain id, checked against the node when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl NetworkProfile {
    /// The HTTP JSON-RPC URL for this profile.
    pub fn rpc_url(&self) -> Result<Url> {
        Url::parse(&format!("http://{}:{}/", self.host, self.port)).map_err(|e| {
            Error::Config(format!(
                "invalid host/port for network '{}': {e}",
                self.name
            ))
        })
    }
}

/// The full set of configured network profiles, keyed by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkProfiles {
    #[serde(default)]
    networks: BTreeMap<String, NetworkProfile>,
}

impl NetworkProfiles {
    /// Load profiles from a TOML file, merged with `CHAINRIG_*` environment
    /// overrides.
    ///
    /// ```toml
    /// [networks.local-dev]
    /// host = "127.0.0.1"
    /// port = 8545
    /// from_address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
    /// chain_id = 1337
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "network configuration file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::from_figment(figment)
    }

    /// Parse profiles from a TOML string. Used by tests and embedded configs.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Self::from_figment(Figment::from(Toml::string(raw)))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let mut profiles: Self = figment
            .extract()
            .map_err(|e| Error::Config(format!("failed to parse network configuration: {e}")))?;

        for (name, profile) in profiles.networks.iter_mut() {
            profile.name = name.clone();
        }

        Ok(profiles)
    }

    /// Look up a profile by name. Pure lookup, no network I/O.
    pub fn resolve(&self, name: &str) -> Result<&NetworkProfile> {
        self.networks
            .get(name)
            .ok_or_else(|| Error::UnknownNetwork(name.to_string()))
    }

    /// Configured network names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    /// All configured profiles, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &NetworkProfile> {
        self.networks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [networks.local-dev]
        host = "127.0.0.1"
        port = 8545
        from_address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"

        [networks.unlocked-node]
        host = "geth.internal"
        port = 8545
        from_address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        chain_id = 1337
    "#;

    #[test]
    fn test_resolve_known_network() {
        let profiles = NetworkProfiles::from_toml_str(SAMPLE).unwrap();
        let profile = profiles.resolve("unlocked-node").unwrap();
        assert_eq!(profile.name, "unlocked-node");
        assert_eq!(profile.host, "geth.internal");
        assert_eq!(profile.chain_id, Some(1337));
    }

    #[test]
    fn test_resolve_unknown_network_fails() {
        let profiles = NetworkProfiles::from_toml_str(SAMPLE).unwrap();
        let err = profiles.resolve("mainnet").unwrap_err();
        assert!(matches!(err, Error::UnknownNetwork(ref name) if name == "mainnet"));
    }

    #[test]
    fn test_rpc_url() {
        let profiles = NetworkProfiles::from_toml_str(SAMPLE).unwrap();
        let profile = profiles.resolve("local-dev").unwrap();
        assert_eq!(profile.rpc_url().unwrap().as_str(), "http://127.0.0.1:8545/");
    }

    #[test]
    fn test_names_are_sorted() {
        let profiles = NetworkProfiles::from_toml_str(SAMPLE).unwrap();
        let names: Vec<&str> = profiles.names().collect();
        assert_eq!(names, vec!["local-dev", "unlocked-node"]);
    }

    #[test]
    fn test_env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("networks.toml", SAMPLE)?;
            jail.set_env("CHAINRIG_NETWORKS__LOCAL-DEV__PORT", "9545");

            let profiles = NetworkProfiles::load(Path::new("networks.toml")).unwrap();
            assert_eq!(profiles.resolve("local-dev").unwrap().port, 9545);
            Ok(())
        });
    }
}
