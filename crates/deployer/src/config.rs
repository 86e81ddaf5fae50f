//! Network configuration.
//!
//! A [`Networks`] value is resolved once at startup, either from a TOML file
//! with one table per network or from the `RPC_URL`, `PRIVATE_KEY` and
//! `NETWORK_NAME` environment keys, and is then passed around immutably.

use {
    serde::{Deserialize, Serialize},
    std::{
        collections::HashMap,
        fmt::{self, Debug, Display, Formatter},
        path::{Path, PathBuf},
        time::Duration,
    },
    url::Url,
};

pub const DEFAULT_CONFIRMATIONS: u64 = 1;
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Identifies a target network, e.g. `amoy`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkName(String);

impl NetworkName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NetworkName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for NetworkName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Hex encoded signing key. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(SECRET)")
    }
}

/// Everything needed to deploy to one network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub name: NetworkName,
    pub rpc_url: Url,
    pub private_key: PrivateKey,
    /// When set, the node's chain id must match before anything is sent.
    pub chain_id: Option<u64>,
    /// Number of blocks, including the one with the transaction, that have
    /// to exist before a deployment counts as confirmed.
    pub confirmations: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl NetworkConfig {
    pub fn new(name: NetworkName, rpc_url: Url, private_key: PrivateKey) -> Self {
        Self {
            name,
            rpc_url,
            private_key,
            chain_id: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing required configuration key {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("network {0} is not configured")]
    UnknownNetwork(NetworkName),
    #[error("failed to read networks file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    // The TOML error is not included since it could leak private keys.
    #[error("syntax error in networks file {0:?}")]
    Syntax(PathBuf),
}

/// Values shared by every network unless a network overrides them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Defaults {
    pub private_key: Option<PrivateKey>,
    pub confirmations: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            private_key: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// All networks the orchestrator can deploy to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Networks(HashMap<NetworkName, NetworkConfig>);

impl Networks {
    pub fn new(networks: impl IntoIterator<Item = NetworkConfig>) -> Self {
        Self(
            networks
                .into_iter()
                .map(|network| (network.name.clone(), network))
                .collect(),
        )
    }

    /// Builds a single network from the plain environment keys.
    pub fn from_env(
        network_name: Option<&str>,
        rpc_url: Option<&str>,
        defaults: Defaults,
    ) -> Result<Self, ConfigurationError> {
        let name = non_empty(network_name).ok_or(ConfigurationError::Missing("NETWORK_NAME"))?;
        let rpc_url = non_empty(rpc_url).ok_or(ConfigurationError::Missing("RPC_URL"))?;
        let rpc_url = parse_url(rpc_url)?;
        let private_key = defaults
            .private_key
            .ok_or(ConfigurationError::Missing("PRIVATE_KEY"))?;
        validate_confirmations(defaults.confirmations)?;

        Ok(Self::new([NetworkConfig {
            name: name.into(),
            rpc_url,
            private_key,
            chain_id: None,
            confirmations: defaults.confirmations,
            confirmation_timeout: defaults.confirmation_timeout,
            poll_interval: defaults.poll_interval,
        }]))
    }

    /// Loads the networks from a TOML file. Networks without their own
    /// `private-key` use the one from `defaults`.
    pub async fn load(path: &Path, defaults: Defaults) -> Result<Self, ConfigurationError> {
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigurationError::Io {
                path: path.to_owned(),
                source,
            })?;
        let file: file::Config =
            toml::from_str(&data).map_err(|_| ConfigurationError::Syntax(path.to_owned()))?;
        Self::from_file(file, defaults)
    }

    fn from_file(file: file::Config, defaults: Defaults) -> Result<Self, ConfigurationError> {
        let networks = file
            .networks
            .into_iter()
            .map(|(name, network)| {
                let private_key = network
                    .private_key
                    .or_else(|| defaults.private_key.clone())
                    .ok_or(ConfigurationError::Missing("PRIVATE_KEY"))?;
                let confirmations = network.confirmations.unwrap_or(defaults.confirmations);
                validate_confirmations(confirmations)?;
                Ok(NetworkConfig {
                    name: name.into(),
                    rpc_url: network.rpc_url,
                    private_key,
                    chain_id: network.chain_id,
                    confirmations,
                    confirmation_timeout: network
                        .confirmation_timeout
                        .unwrap_or(defaults.confirmation_timeout),
                    poll_interval: network.poll_interval.unwrap_or(defaults.poll_interval),
                })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;
        Ok(Self::new(networks))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.0.values()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_url(url: &str) -> Result<Url, ConfigurationError> {
    url.parse().map_err(|err: url::ParseError| ConfigurationError::Invalid {
        key: "RPC_URL",
        reason: err.to_string(),
    })
}

fn validate_confirmations(confirmations: u64) -> Result<(), ConfigurationError> {
    if confirmations == 0 {
        return Err(ConfigurationError::Invalid {
            key: "CONFIRMATIONS",
            reason: "at least one confirmation is required".to_string(),
        });
    }
    Ok(())
}

mod file {
    use {
        super::PrivateKey,
        serde::Deserialize,
        std::{collections::HashMap, time::Duration},
        url::Url,
    };

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    pub struct Config {
        #[serde(default)]
        pub networks: HashMap<String, Network>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    pub struct Network {
        pub rpc_url: Url,
        pub private_key: Option<PrivateKey>,
        pub chain_id: Option<u64>,
        pub confirmations: Option<u64>,
        #[serde(default, with = "humantime_serde")]
        pub confirmation_timeout: Option<Duration>,
        #[serde(default, with = "humantime_serde")]
        pub poll_interval: Option<Duration>,
    }
}
