//! Configuration for the forwarding engine and the node daemon.
//!
//! Every field has a default, so an empty file yields a working forwarder.
//! Files are read with the `config` crate (format picked from the file
//! extension) and may be overridden through `NDNFW_*` environment variables,
//! e.g. `NDNFW_FORWARDER__NACKS_ENABLED=true`.

use rust_ndnfw_common::{
    ndn::Name,
    types::{DEFAULT_CS_CAPACITY, DEFAULT_PIT_PRUNING_TIMEOUT_MS},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, path::Path, time::Duration};

/// What to do with a non-duplicate Interest arriving on a face we already
/// forwarded the same name to (a producer asking for its own data, or a
/// short loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpstreamRequestPolicy {
    /// Mark the face YELLOW in the FIB and propagate anyway.
    MarkYellowAndPropagate,
    /// Apply the ordinary suppression rule.
    Suppress,
}

/// Which forwarding strategy the node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    BestRoute,
    Flooding,
}

/// Forwarding engine options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Answer duplicates with NACK_LOOP and failed Interests with NACK_GIVEUP_PIT
    pub nacks_enabled: bool,

    /// Cache Data nobody asked for
    pub cache_unsolicited_data: bool,

    /// Maximum number of PIT entries, 0 for unlimited
    pub pit_max_size: usize,

    /// How long a satisfied or abandoned entry lingers (in milliseconds)
    pub pit_pruning_timeout_ms: u64,

    /// Added to an entry's retransmission budget on each increase
    pub retx_increment: u32,

    /// Minimum time between two budget increases (in milliseconds)
    pub retx_min_interval_ms: u64,

    pub upstream_request_policy: UpstreamRequestPolicy,

    /// Content store capacity, 0 disables caching
    pub cs_capacity: usize,

    pub strategy: StrategyKind,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            nacks_enabled: false,
            cache_unsolicited_data: false,
            pit_max_size: 0,
            pit_pruning_timeout_ms: DEFAULT_PIT_PRUNING_TIMEOUT_MS,
            retx_increment: 1,
            retx_min_interval_ms: 100,
            upstream_request_policy: UpstreamRequestPolicy::MarkYellowAndPropagate,
            cs_capacity: DEFAULT_CS_CAPACITY,
            strategy: StrategyKind::BestRoute,
        }
    }
}

impl ForwarderConfig {
    pub fn pit_pruning_timeout(&self) -> Duration {
        Duration::from_millis(self.pit_pruning_timeout_ms)
    }

    pub fn retx_min_interval(&self) -> Duration {
        Duration::from_millis(self.retx_min_interval_ms)
    }
}

/// A UDP tunnel to one neighbour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdpFaceConfig {
    pub name: String,
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

/// A static FIB route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Name prefix (NDN URI format)
    pub prefix: String,
    /// Name of the face in `faces`
    pub face: String,
    #[serde(default = "default_route_cost")]
    pub cost: u8,
}

fn default_route_cost() -> u8 {
    10
}

/// Daemon configuration: engine options plus the node's faces and routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub forwarder: ForwarderConfig,
    pub faces: Vec<UdpFaceConfig>,
    pub routes: Vec<RouteConfig>,
}

impl NodeConfig {
    /// Load the configuration from `path`, applying environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("NDNFW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let node: NodeConfig = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        node.validate()?;
        Ok(node)
    }

    /// Checks that face names are unique and routes are well formed.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for face in &self.faces {
            if !names.insert(face.name.as_str()) {
                return Err(Error::Config(format!("Duplicate face name '{}'", face.name)));
            }
        }

        for route in &self.routes {
            route
                .prefix
                .parse::<Name>()
                .map_err(|e| Error::Config(format!("Invalid route prefix: {}", e)))?;
            if !names.contains(route.face.as_str()) {
                return Err(Error::Config(format!(
                    "Route {} refers to unknown face '{}'",
                    route.prefix, route.face
                )));
            }
        }

        if self.forwarder.retx_increment == 0 {
            return Err(Error::Config("retx_increment must be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: ForwarderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ForwarderConfig::default());
        assert_eq!(config.pit_pruning_timeout(), Duration::from_millis(100));
        assert_eq!(
            config.upstream_request_policy,
            UpstreamRequestPolicy::MarkYellowAndPropagate
        );
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[forwarder]
nacks_enabled = true
strategy = "flooding"
upstream_request_policy = "suppress"

[[faces]]
name = "up"
local = "127.0.0.1:6363"
remote = "127.0.0.1:6364"

[[routes]]
prefix = "/a"
face = "up"
"#
        )
        .unwrap();

        let node = NodeConfig::load(file.path()).unwrap();
        assert!(node.forwarder.nacks_enabled);
        assert_eq!(node.forwarder.strategy, StrategyKind::Flooding);
        assert_eq!(node.forwarder.upstream_request_policy, UpstreamRequestPolicy::Suppress);
        assert_eq!(node.faces.len(), 1);
        assert_eq!(node.routes[0].cost, 10);
    }

    #[test]
    fn test_route_to_unknown_face_is_rejected() {
        let node = NodeConfig {
            routes: vec![RouteConfig {
                prefix: "/a".into(),
                face: "missing".into(),
                cost: 1,
            }],
            ..Default::default()
        };
        assert!(matches!(node.validate(), Err(Error::Config(_))));
    }
}
