//! Monitor command dispatcher
//!
//! Resolves the node names of a [`MonitorCommand`] against the cluster
//! configuration, probes every selected instance and reports one status line
//! per probe. Nothing here is fatal: an unknown name or a missing replica is
//! reported and processing moves on to the next name.

use crate::command::{CoordinatorScope, GtmTarget, MonitorCommand, Scope, Targets, ALL};
use crate::config::{ClusterConfig, EndpointKind, Feature, NodeRole};
use crate::probe::Probe;
use crate::report::{status_line, Level, Reporter};
use tracing::debug;

pub struct Monitor<'a> {
    config: &'a ClusterConfig,
    probe: &'a dyn Probe,
    reporter: &'a mut dyn Reporter,
}

impl<'a> Monitor<'a> {
    pub fn new(
        config: &'a ClusterConfig,
        probe: &'a dyn Probe,
        reporter: &'a mut dyn Reporter,
    ) -> Self {
        Self {
            config,
            probe,
            reporter,
        }
    }

    /// Parse and run one command line
    pub fn execute(&mut self, line: &str) {
        match MonitorCommand::parse(line) {
            Ok(command) => self.run(&command),
            Err(e) => self.error(&e.to_string()),
        }
    }

    pub fn run(&mut self, command: &MonitorCommand) {
        debug!("Running monitor command {:?}", command);
        let config = self.config;
        let enabled = |feature: Feature| config.is_enabled(feature);

        match command {
            MonitorCommand::Gtm(GtmTarget::All) => {
                self.gtm_master();
                if enabled(Feature::GtmSlave) {
                    self.gtm_slave();
                }
            }
            MonitorCommand::Gtm(GtmTarget::Master) => self.gtm_master(),
            MonitorCommand::Gtm(GtmTarget::Slave) => {
                if enabled(Feature::GtmSlave) {
                    self.gtm_slave();
                } else {
                    self.error("gtm slave is not configured.");
                }
            }
            MonitorCommand::GtmProxy(targets) => self.gtm_proxy(&target_names(targets)),
            MonitorCommand::Coordinator(CoordinatorScope::Combined, Targets::All) => {
                let all = all_names();
                self.coordinator_master(&all);
                if enabled(Feature::CoordinatorSlave) {
                    self.coordinator_slave(&all);
                }
            }
            MonitorCommand::Coordinator(CoordinatorScope::Combined, Targets::Names(names)) => {
                self.coordinator(names)
            }
            MonitorCommand::Coordinator(CoordinatorScope::Master, targets) => {
                self.coordinator_master(&target_names(targets))
            }
            MonitorCommand::Coordinator(CoordinatorScope::Slave, targets) => {
                self.coordinator_slave(&target_names(targets))
            }
            MonitorCommand::Datanode(Scope::Combined, Targets::All) => {
                let all = all_names();
                self.datanode_master(&all);
                if enabled(Feature::DatanodeSlave) {
                    self.datanode_slave(&all);
                    if enabled(Feature::ConsensusReplication) {
                        self.datanode_learner(&all);
                    }
                }
            }
            MonitorCommand::Datanode(Scope::Combined, Targets::Names(names)) => self.datanode(names),
            MonitorCommand::Datanode(Scope::Master, targets) => {
                self.datanode_master(&target_names(targets))
            }
            MonitorCommand::Datanode(Scope::Slave, targets) => {
                self.datanode_slave(&target_names(targets))
            }
            MonitorCommand::Datanode(Scope::Learner, targets) => {
                self.datanode_learner(&target_names(targets))
            }
            MonitorCommand::All => self.all(),
            MonitorCommand::Nodes(names) => self.something(names),
        }
    }

    fn all(&mut self) {
        let all = all_names();
        if self.config.is_enabled(Feature::Standalone) {
            self.datanode(&all);
            return;
        }
        self.gtm_master();
        if self.config.is_enabled(Feature::GtmSlave) {
            self.gtm_slave();
        }
        if self.config.is_enabled(Feature::GtmProxy) {
            self.gtm_proxy(&all);
        }
        self.coordinator(&all);
        self.datanode(&all);
    }

    fn gtm_master(&mut self) {
        let config = self.config;
        let target = config
            .endpoint(NodeRole::Gtm, EndpointKind::Master, 0)
            .and_then(|e| e.port.map(|port| (e.server.as_str(), port)));
        match target {
            Some((server, port)) => {
                let running = self.probe.probe_gtm(server, port);
                self.status(running, "gtm master", None);
            }
            None => self.notice("GTM master not running"),
        }
    }

    fn gtm_slave(&mut self) {
        let config = self.config;
        let target = config
            .endpoint(NodeRole::Gtm, EndpointKind::Slave, 0)
            .and_then(|e| e.port.map(|port| (e.server.as_str(), port)));
        if let Some((server, port)) = target {
            let running = self.probe.probe_gtm(server, port);
            self.status(running, "gtm slave", None);
        }
    }

    fn gtm_proxy(&mut self, names: &[String]) {
        let config = self.config;
        for name in config.expand(Some(NodeRole::GtmProxy), names) {
            let Some(idx) = self.resolve(NodeRole::GtmProxy, &name) else {
                continue;
            };
            let target = config
                .endpoint(NodeRole::GtmProxy, EndpointKind::Master, idx)
                .and_then(|e| e.port.map(|port| (e.server.as_str(), port)));
            match target {
                Some((server, port)) => {
                    let running = self.probe.probe_gtm(server, port);
                    self.status(running, "gtm proxy", Some(&name));
                }
                None => self.error(&format!("gtm proxy {} is not configured.", name)),
            }
        }
    }

    fn coordinator_master(&mut self, names: &[String]) {
        for name in self.config.expand(Some(NodeRole::Coordinator), names) {
            if let Some(idx) = self.resolve(NodeRole::Coordinator, &name) {
                self.probe_required(NodeRole::Coordinator, EndpointKind::Master, idx, &name, "");
            }
        }
    }

    fn coordinator_slave(&mut self, names: &[String]) {
        if !self.config.is_enabled(Feature::CoordinatorSlave) {
            self.error("coordinator slave is not configured.");
            return;
        }
        for name in self.config.expand(Some(NodeRole::Coordinator), names) {
            if let Some(idx) = self.resolve(NodeRole::Coordinator, &name) {
                self.probe_required(NodeRole::Coordinator, EndpointKind::Slave, idx, &name, "");
            }
        }
    }

    /// Master, then the slave when one is configured for the node
    fn coordinator(&mut self, names: &[String]) {
        for name in self.config.expand(Some(NodeRole::Coordinator), names) {
            let Some(idx) = self.resolve(NodeRole::Coordinator, &name) else {
                continue;
            };
            self.probe_required(NodeRole::Coordinator, EndpointKind::Master, idx, &name, "");
            self.probe_instance(NodeRole::Coordinator, EndpointKind::Slave, idx, &name);
        }
    }

    fn datanode_master(&mut self, names: &[String]) {
        for name in self.config.expand(Some(NodeRole::Datanode), names) {
            if let Some(idx) = self.resolve(NodeRole::Datanode, &name) {
                self.probe_required(NodeRole::Datanode, EndpointKind::Master, idx, &name, ".");
            }
        }
    }

    fn datanode_slave(&mut self, names: &[String]) {
        if !self.config.is_enabled(Feature::DatanodeSlave) {
            self.error("datanode slave is not configured.");
            return;
        }
        for name in self.config.expand(Some(NodeRole::Datanode), names) {
            if let Some(idx) = self.resolve(NodeRole::Datanode, &name) {
                self.probe_required(NodeRole::Datanode, EndpointKind::Slave, idx, &name, ".");
            }
        }
    }

    fn datanode_learner(&mut self, names: &[String]) {
        if !self.config.is_enabled(Feature::DatanodeSlave) {
            self.error("datanode slave is not configured.");
            return;
        }
        if !self.config.is_enabled(Feature::ConsensusReplication) {
            self.error("datanode learner or replication number is configured error.");
            return;
        }
        for name in self.config.expand(Some(NodeRole::Datanode), names) {
            if let Some(idx) = self.resolve(NodeRole::Datanode, &name) {
                self.probe_required(NodeRole::Datanode, EndpointKind::Learner, idx, &name, ".");
            }
        }
    }

    /// Master, then the slave and, under consensus replication, the learner
    fn datanode(&mut self, names: &[String]) {
        let consensus = self.config.is_enabled(Feature::ConsensusReplication);
        for name in self.config.expand(Some(NodeRole::Datanode), names) {
            let Some(idx) = self.resolve(NodeRole::Datanode, &name) else {
                continue;
            };
            self.probe_required(NodeRole::Datanode, EndpointKind::Master, idx, &name, ".");
            if self.probe_instance(NodeRole::Datanode, EndpointKind::Slave, idx, &name) && consensus {
                self.probe_instance(NodeRole::Datanode, EndpointKind::Learner, idx, &name);
            }
        }
    }

    /// Bare names: every name is monitored according to its own role
    fn something(&mut self, names: &[String]) {
        for name in self.config.expand(None, names) {
            let single = std::slice::from_ref(&name);
            match self.config.classify(&name) {
                NodeRole::Gtm => {
                    self.gtm_master();
                    if self.config.is_enabled(Feature::GtmSlave) {
                        self.gtm_slave();
                    }
                }
                NodeRole::GtmProxy => self.gtm_proxy(single),
                NodeRole::Coordinator => self.coordinator(single),
                NodeRole::Datanode => self.datanode(single),
                NodeRole::Unknown => self.error(&format!("{} is not found in any node.", name)),
            }
        }
    }

    /// Index of `name` in the configured list of `role`, reporting misses
    fn resolve(&mut self, role: NodeRole, name: &str) -> Option<usize> {
        let idx = self.config.index_of(role, name);
        if idx.is_none() {
            let message = match role {
                NodeRole::GtmProxy => format!("{} is not a gtm proxy.", name),
                _ => format!("{} is not a {}", name, role.label()),
            };
            self.error(&message);
        }
        idx
    }

    /// Probe one instance if it is configured, returning whether it was
    fn probe_instance(&mut self, role: NodeRole, kind: EndpointKind, idx: usize, name: &str) -> bool {
        let config = self.config;
        let Some(endpoint) = config.endpoint(role, kind, idx) else {
            return false;
        };
        let running = match kind {
            EndpointKind::Master => self.probe.probe_master(endpoint),
            EndpointKind::Slave | EndpointKind::Learner => self.probe.probe_replica(endpoint),
        };
        let what = format!("{} {}", role.label(), kind.label());
        self.status(running, &what, Some(name));
        true
    }

    /// Like [`Self::probe_instance`] but a missing endpoint is an error
    fn probe_required(
        &mut self,
        role: NodeRole,
        kind: EndpointKind,
        idx: usize,
        name: &str,
        suffix: &str,
    ) {
        if !self.probe_instance(role, kind, idx, name) {
            self.error(&format!(
                "{} {} {} is not configured{}",
                role.label(),
                kind.label(),
                name,
                suffix
            ));
        }
    }

    fn status(&mut self, running: bool, what: &str, name: Option<&str>) {
        self.reporter
            .report(Level::Notice, &status_line(running, what, name));
    }

    fn notice(&mut self, message: &str) {
        self.reporter.report(Level::Notice, message);
    }

    /// Report an error line, prefixed with `ERROR: `
    pub fn error(&mut self, message: &str) {
        debug!("Monitor error: {}", message);
        self.reporter
            .report(Level::Error, &format!("ERROR: {}", message));
    }
}

fn all_names() -> Vec<String> {
    vec![ALL.to_string()]
}

fn target_names(targets: &Targets) -> Vec<String> {
    match targets {
        Targets::All => all_names(),
        Targets::Names(names) => names.clone(),
    }
}
