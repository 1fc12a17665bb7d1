//! Cluster configuration for clustermon
//!
//! The configuration describes every node of the cluster grouped by role:
//! the global transaction manager (GTM) and its optional slave, GTM proxies,
//! coordinators and data nodes with their optional slaves and learners.
//! It is loaded once from a TOML file and only read afterwards.

use crate::command::ALL;
use crate::error::{MonitorError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Role of a node inside the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Gtm,
    GtmProxy,
    Coordinator,
    Datanode,
    Unknown,
}

impl NodeRole {
    /// Roles in classification order
    pub const KNOWN: [NodeRole; 4] = [
        NodeRole::Gtm,
        NodeRole::GtmProxy,
        NodeRole::Coordinator,
        NodeRole::Datanode,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NodeRole::Gtm => "gtm",
            NodeRole::GtmProxy => "gtm proxy",
            NodeRole::Coordinator => "coordinator",
            NodeRole::Datanode => "datanode",
            NodeRole::Unknown => "unknown",
        }
    }
}

/// Which instance of a node an endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Master,
    Slave,
    Learner,
}

impl EndpointKind {
    pub fn label(&self) -> &'static str {
        match self {
            EndpointKind::Master => "master",
            EndpointKind::Slave => "slave",
            EndpointKind::Learner => "learner",
        }
    }
}

/// Boolean deployment switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    GtmSlave,
    GtmProxy,
    CoordinatorSlave,
    DatanodeSlave,
    Standalone,
    ConsensusReplication,
}

/// Network location of a single node instance
///
/// Master probes use `server` and `port`, replica probes use `server` and
/// `data_dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Endpoint {
    pub fn new<S: Into<String>>(server: S, port: u16) -> Self {
        Self {
            server: server.into(),
            port: Some(port),
            data_dir: None,
        }
    }

    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// An empty server or the literal `none` marks an unconfigured slot.
    pub fn is_configured(&self) -> bool {
        let server = self.server.trim();
        !server.is_empty() && !server.eq_ignore_ascii_case("none")
    }
}

/// Logging section of the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// How the GTM is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GtmCheck {
    /// Report the GTM as running without contacting it
    #[default]
    Assume,
    /// Open a TCP connection to the GTM port
    Connect,
}

/// Probe section of the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub gtm_check: GtmCheck,
    /// Status command for replicas, `{data_dir}` and `{host}` are substituted
    #[serde(default = "default_replica_command")]
    pub replica_command: Vec<String>,
    /// Prefix used to run the status command on remote hosts
    #[serde(default = "default_remote_shell")]
    pub remote_shell: Vec<String>,
    #[serde(default = "default_local_hosts")]
    pub local_hosts: Vec<String>,
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_replica_command() -> Vec<String> {
    ["pg_ctl", "status", "-D", "{data_dir}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_remote_shell() -> Vec<String> {
    ["ssh", "-o", "BatchMode=yes"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_local_hosts() -> Vec<String> {
    vec!["localhost".to_string(), "127.0.0.1".to_string()]
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            gtm_check: GtmCheck::default(),
            replica_command: default_replica_command(),
            remote_shell: default_remote_shell(),
            local_hosts: default_local_hosts(),
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// GTM section
#[derive(Debug, Clone, Deserialize)]
pub struct GtmConfig {
    #[serde(default = "default_gtm_name")]
    pub name: String,
    #[serde(default)]
    pub slave_enabled: bool,
    #[serde(default)]
    pub master: Endpoint,
    #[serde(default)]
    pub slave: Option<Endpoint>,
}

fn default_gtm_name() -> String {
    "gtm".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyNode {
    pub name: String,
    #[serde(flatten)]
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GtmProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub nodes: Vec<ProxyNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorNode {
    pub name: String,
    pub master: Endpoint,
    #[serde(default)]
    pub slave: Option<Endpoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub slave_enabled: bool,
    #[serde(default)]
    pub nodes: Vec<CoordinatorNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatanodeNode {
    pub name: String,
    pub master: Endpoint,
    #[serde(default)]
    pub slave: Option<Endpoint>,
    #[serde(default)]
    pub learner: Option<Endpoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatanodeConfig {
    #[serde(default)]
    pub slave_enabled: bool,
    #[serde(default)]
    pub nodes: Vec<DatanodeNode>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterConfig {
    /// Deployment with data nodes only
    #[serde(default)]
    standalone: bool,
    /// Learner replicas exist only under consensus replication
    #[serde(default)]
    consensus_replication: bool,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    probe: ProbeConfig,
    #[serde(default)]
    gtm: Option<GtmConfig>,
    #[serde(default)]
    gtm_proxy: GtmProxyConfig,
    #[serde(default)]
    coordinator: CoordinatorConfig,
    #[serde(default)]
    datanode: DatanodeConfig,
}

impl ClusterConfig {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            "Loaded cluster configuration from {}: {} gtm proxies, {} coordinators, {} datanodes",
            path.display(),
            config.gtm_proxy.nodes.len(),
            config.coordinator.nodes.len(),
            config.datanode.nodes.len()
        );
        Ok(config)
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClusterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub fn probe(&self) -> &ProbeConfig {
        &self.probe
    }

    pub fn gtm(&self) -> Option<&GtmConfig> {
        self.gtm.as_ref()
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::GtmSlave => self.gtm.as_ref().is_some_and(|g| g.slave_enabled),
            Feature::GtmProxy => self.gtm_proxy.enabled,
            Feature::CoordinatorSlave => self.coordinator.slave_enabled,
            Feature::DatanodeSlave => self.datanode.slave_enabled,
            Feature::Standalone => self.standalone,
            Feature::ConsensusReplication => self.consensus_replication,
        }
    }

    /// Configured node names of a role, in configuration order
    pub fn names(&self, role: NodeRole) -> Vec<&str> {
        match role {
            NodeRole::Gtm => self.gtm.iter().map(|g| g.name.as_str()).collect(),
            NodeRole::GtmProxy => self.gtm_proxy.nodes.iter().map(|n| n.name.as_str()).collect(),
            NodeRole::Coordinator => self
                .coordinator
                .nodes
                .iter()
                .map(|n| n.name.as_str())
                .collect(),
            NodeRole::Datanode => self.datanode.nodes.iter().map(|n| n.name.as_str()).collect(),
            NodeRole::Unknown => Vec::new(),
        }
    }

    /// Position of `name` in the configured list of `role`
    pub fn index_of(&self, role: NodeRole, name: &str) -> Option<usize> {
        self.names(role).iter().position(|n| *n == name)
    }

    /// Endpoint of the given instance, if it is configured
    pub fn endpoint(&self, role: NodeRole, kind: EndpointKind, index: usize) -> Option<&Endpoint> {
        let endpoint = match (role, kind) {
            (NodeRole::Gtm, EndpointKind::Master) if index == 0 => {
                self.gtm.as_ref().map(|g| &g.master)
            }
            (NodeRole::Gtm, EndpointKind::Slave) if index == 0 => {
                self.gtm.as_ref().and_then(|g| g.slave.as_ref())
            }
            (NodeRole::GtmProxy, EndpointKind::Master) => {
                self.gtm_proxy.nodes.get(index).map(|n| &n.endpoint)
            }
            (NodeRole::Coordinator, EndpointKind::Master) => {
                self.coordinator.nodes.get(index).map(|n| &n.master)
            }
            (NodeRole::Coordinator, EndpointKind::Slave) => self
                .coordinator
                .nodes
                .get(index)
                .and_then(|n| n.slave.as_ref()),
            (NodeRole::Datanode, EndpointKind::Master) => {
                self.datanode.nodes.get(index).map(|n| &n.master)
            }
            (NodeRole::Datanode, EndpointKind::Slave) => {
                self.datanode.nodes.get(index).and_then(|n| n.slave.as_ref())
            }
            (NodeRole::Datanode, EndpointKind::Learner) => self
                .datanode
                .nodes
                .get(index)
                .and_then(|n| n.learner.as_ref()),
            _ => None,
        };
        endpoint.filter(|e| e.is_configured())
    }

    /// Role of a node name, first match wins
    pub fn classify(&self, name: &str) -> NodeRole {
        NodeRole::KNOWN
            .into_iter()
            .find(|role| self.index_of(*role, name).is_some())
            .unwrap_or(NodeRole::Unknown)
    }

    /// Replace every `all` token with the configured names of `group`.
    ///
    /// The token is matched case-insensitively, like the qualifiers.
    /// Without a group, `all` stands for every configured node of every
    /// role. The expansion is one level deep; other tokens are kept as is.
    pub fn expand(&self, group: Option<NodeRole>, names: &[String]) -> Vec<String> {
        let mut actual = Vec::with_capacity(names.len());
        for name in names {
            if !name.eq_ignore_ascii_case(ALL) {
                actual.push(name.clone());
                continue;
            }
            match group {
                Some(role) => actual.extend(self.names(role).into_iter().map(String::from)),
                None => {
                    for role in NodeRole::KNOWN {
                        actual.extend(self.names(role).into_iter().map(String::from));
                    }
                }
            }
        }
        actual
    }

    fn validate(&self) -> Result<()> {
        for role in NodeRole::KNOWN {
            let mut seen = HashSet::new();
            for name in self.names(role) {
                if name.trim().is_empty() {
                    return Err(MonitorError::InvalidConfig(format!(
                        "{} with an empty name",
                        role.label()
                    )));
                }
                if name.split_whitespace().count() != 1 {
                    return Err(MonitorError::InvalidConfig(format!(
                        "{} name '{}' contains whitespace",
                        role.label(),
                        name
                    )));
                }
                if name.eq_ignore_ascii_case(ALL) {
                    return Err(MonitorError::InvalidConfig(format!(
                        "'{}' is reserved and cannot name a {}",
                        name,
                        role.label()
                    )));
                }
                if !seen.insert(name) {
                    return Err(MonitorError::InvalidConfig(format!(
                        "duplicate {} name '{}'",
                        role.label(),
                        name
                    )));
                }
            }
        }

        if let Some(gtm) = &self.gtm {
            require_port(&gtm.master, "gtm master", &gtm.name)?;
            if let Some(slave) = &gtm.slave {
                require_port(slave, "gtm slave", &gtm.name)?;
            }
        }
        for node in &self.gtm_proxy.nodes {
            require_port(&node.endpoint, "gtm proxy", &node.name)?;
        }
        for node in &self.coordinator.nodes {
            require_port(&node.master, "coordinator master", &node.name)?;
            if let Some(slave) = &node.slave {
                require_data_dir(slave, "coordinator slave", &node.name)?;
            }
        }
        for node in &self.datanode.nodes {
            require_port(&node.master, "datanode master", &node.name)?;
            if let Some(slave) = &node.slave {
                require_data_dir(slave, "datanode slave", &node.name)?;
            }
            if let Some(learner) = &node.learner {
                require_data_dir(learner, "datanode learner", &node.name)?;
            }
        }
        Ok(())
    }
}

fn require_port(endpoint: &Endpoint, what: &str, name: &str) -> Result<()> {
    if endpoint.is_configured() && endpoint.port.is_none() {
        return Err(MonitorError::InvalidConfig(format!(
            "{} {} has no port",
            what, name
        )));
    }
    Ok(())
}

fn require_data_dir(endpoint: &Endpoint, what: &str, name: &str) -> Result<()> {
    if endpoint.is_configured() && endpoint.data_dir.is_none() {
        return Err(MonitorError::InvalidConfig(format!(
            "{} {} has no data_dir",
            what, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        consensus_replication = true

        [gtm]
        slave_enabled = true
        master = { server = "node1", port = 6666 }
        slave = { server = "node2", port = 6666 }

        [gtm_proxy]
        enabled = true
        [[gtm_proxy.nodes]]
        name = "p1"
        server = "node1"
        port = 6667
        [[gtm_proxy.nodes]]
        name = "p2"
        server = "node2"
        port = 6667

        [coordinator]
        slave_enabled = true
        [[coordinator.nodes]]
        name = "coord1"
        master = { server = "node1", port = 5432 }
        slave = { server = "node2", data_dir = "/data/coord1_slave" }
        [[coordinator.nodes]]
        name = "coord2"
        master = { server = "node2", port = 5432 }
        slave = { server = "none" }

        [[datanode.nodes]]
        name = "dn1"
        master = { server = "node1", port = 15432 }
        learner = { server = "node3", data_dir = "/data/dn1_learner" }
    "#;

    #[test]
    fn test_parse_sample() {
        let config = ClusterConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.names(NodeRole::Gtm), vec!["gtm"]);
        assert_eq!(config.names(NodeRole::GtmProxy), vec!["p1", "p2"]);
        assert_eq!(config.names(NodeRole::Coordinator), vec!["coord1", "coord2"]);
        assert_eq!(config.names(NodeRole::Datanode), vec!["dn1"]);
        assert!(config.is_enabled(Feature::GtmSlave));
        assert!(config.is_enabled(Feature::ConsensusReplication));
        assert!(!config.is_enabled(Feature::DatanodeSlave));
        assert!(!config.is_enabled(Feature::Standalone));
        assert_eq!(config.logging().level, "info");
        assert_eq!(config.probe().connect_timeout_ms, 3000);
        assert_eq!(config.probe().gtm_check, GtmCheck::Assume);
    }

    #[test]
    fn test_defaults_for_empty_file() {
        let config = ClusterConfig::from_toml_str("").unwrap();
        assert!(config.gtm().is_none());
        assert!(config.names(NodeRole::Gtm).is_empty());
        assert!(config.names(NodeRole::Datanode).is_empty());
        assert_eq!(config.logging().format, "text");
        assert_eq!(config.probe().replica_command[0], "pg_ctl");
    }

    #[test]
    fn test_index_and_endpoint_lookup() {
        let config = ClusterConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.index_of(NodeRole::Coordinator, "coord2"), Some(1));
        assert_eq!(config.index_of(NodeRole::Coordinator, "dn1"), None);

        let master = config
            .endpoint(NodeRole::Coordinator, EndpointKind::Master, 0)
            .unwrap();
        assert_eq!(master, &Endpoint::new("node1", 5432));

        // "none" marks the slave of coord2 as absent
        assert!(config
            .endpoint(NodeRole::Coordinator, EndpointKind::Slave, 0)
            .is_some());
        assert!(config
            .endpoint(NodeRole::Coordinator, EndpointKind::Slave, 1)
            .is_none());

        assert!(config
            .endpoint(NodeRole::Datanode, EndpointKind::Slave, 0)
            .is_none());
        assert!(config
            .endpoint(NodeRole::Datanode, EndpointKind::Learner, 0)
            .is_some());
        assert!(config
            .endpoint(NodeRole::GtmProxy, EndpointKind::Slave, 0)
            .is_none());
    }

    #[test]
    fn test_classify() {
        let config = ClusterConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.classify("gtm"), NodeRole::Gtm);
        assert_eq!(config.classify("p2"), NodeRole::GtmProxy);
        assert_eq!(config.classify("coord1"), NodeRole::Coordinator);
        assert_eq!(config.classify("dn1"), NodeRole::Datanode);
        assert_eq!(config.classify("foo"), NodeRole::Unknown);
    }

    #[test]
    fn test_expand_keeps_order_and_duplicates() {
        let config = ClusterConfig::from_toml_str(SAMPLE).unwrap();
        let names: Vec<String> = ["coord2", "All", "coord2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            config.expand(Some(NodeRole::Coordinator), &names),
            vec!["coord2", "coord1", "coord2", "coord2"]
        );
    }

    #[test]
    fn test_expand_without_group() {
        let config = ClusterConfig::from_toml_str(SAMPLE).unwrap();
        let names = vec!["all".to_string()];
        assert_eq!(
            config.expand(None, &names),
            vec!["gtm", "p1", "p2", "coord1", "coord2", "dn1"]
        );
    }

    #[test]
    fn test_reject_duplicate_names() {
        let err = ClusterConfig::from_toml_str(
            r#"
            [[datanode.nodes]]
            name = "dn1"
            master = { server = "a", port = 1 }
            [[datanode.nodes]]
            name = "dn1"
            master = { server = "b", port = 1 }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));
    }

    #[test]
    fn test_reject_master_without_port() {
        let err = ClusterConfig::from_toml_str(
            r#"
            [[coordinator.nodes]]
            name = "coord1"
            master = { server = "a" }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("coordinator master coord1 has no port"));
    }

    #[test]
    fn test_reject_replica_without_data_dir() {
        let err = ClusterConfig::from_toml_str(
            r#"
            [[datanode.nodes]]
            name = "dn1"
            master = { server = "a", port = 1 }
            slave = { server = "b", port = 2 }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("datanode slave dn1 has no data_dir"));
    }

    #[test]
    fn test_reject_reserved_name() {
        let err = ClusterConfig::from_toml_str(
            r#"
            [[gtm_proxy.nodes]]
            name = "all"
            server = "a"
            port = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = ClusterConfig::from_toml_str("standalone = ").unwrap_err();
        assert!(matches!(err, MonitorError::ConfigParse(_)));
    }
}
