//! Liveness probes for cluster nodes
//!
//! Masters and GTM proxies are checked by opening a TCP connection to their
//! port. Replicas are checked by running a status command against their data
//! directory, over the remote shell when the host is not local. The GTM
//! itself is either assumed alive or checked like a master, depending on
//! [`GtmCheck`].

use crate::config::{Endpoint, GtmCheck, ProbeConfig};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Reachability checks used by the monitor
pub trait Probe {
    /// Check a master instance through `server` and `port`
    fn probe_master(&self, endpoint: &Endpoint) -> bool;

    /// Check a slave or learner instance through `server` and `data_dir`
    fn probe_replica(&self, endpoint: &Endpoint) -> bool;

    /// Check the global transaction manager or one of its proxies
    fn probe_gtm(&self, host: &str, port: u16) -> bool;
}

/// Probe backed by TCP connects and status commands
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    config: ProbeConfig,
}

impl NetworkProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    fn can_connect(&self, host: &str, port: u16) -> bool {
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Could not resolve {}:{}: {}", host, port, e);
                return false;
            }
        };
        let timeout = self.config.connect_timeout();
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(_) => return true,
                Err(e) => debug!("Could not connect to {}: {}", addr, e),
            }
        }
        false
    }

    fn is_local(&self, host: &str) -> bool {
        self.config
            .local_hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(host))
    }

    /// Remote shell prefix; plain `ssh` gets a `ConnectTimeout` matching
    /// `connect_timeout_ms` unless one is configured already
    fn remote_shell(&self) -> Vec<String> {
        let mut shell = self.config.remote_shell.clone();
        let is_ssh = shell
            .first()
            .and_then(|program| Path::new(program).file_name())
            .is_some_and(|name| name == "ssh");
        let has_timeout = shell.iter().any(|arg| arg.contains("ConnectTimeout"));
        if is_ssh && !has_timeout {
            let secs = self.config.connect_timeout_ms.div_ceil(1000).max(1);
            shell.insert(1, "-o".to_string());
            shell.insert(2, format!("ConnectTimeout={}", secs));
        }
        shell
    }

    /// Command line that checks the replica behind `endpoint`
    pub fn replica_command(&self, endpoint: &Endpoint) -> Option<Vec<String>> {
        let data_dir = endpoint.data_dir.as_ref()?;
        let data_dir = data_dir.to_string_lossy();
        let status: Vec<String> = self
            .config
            .replica_command
            .iter()
            .map(|arg| {
                arg.replace("{data_dir}", &data_dir)
                    .replace("{host}", &endpoint.server)
            })
            .collect();
        if status.is_empty() {
            return None;
        }

        if self.is_local(&endpoint.server) {
            return Some(status);
        }
        let mut argv = self.remote_shell();
        argv.push(endpoint.server.clone());
        argv.extend(status);
        Some(argv)
    }
}

impl Probe for NetworkProbe {
    fn probe_master(&self, endpoint: &Endpoint) -> bool {
        let Some(port) = endpoint.port else {
            debug!("No port configured for {}", endpoint.server);
            return false;
        };
        let running = self.can_connect(&endpoint.server, port);
        debug!("Master {}:{} running: {}", endpoint.server, port, running);
        running
    }

    fn probe_replica(&self, endpoint: &Endpoint) -> bool {
        let Some(argv) = self.replica_command(endpoint) else {
            debug!("No status command for replica on {}", endpoint.server);
            return false;
        };
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => {
                debug!("Replica check {:?} exited with {}", argv, status);
                status.success()
            }
            Err(e) => {
                debug!("Failed to run {:?}: {}", argv, e);
                false
            }
        }
    }

    fn probe_gtm(&self, host: &str, port: u16) -> bool {
        match self.config.gtm_check {
            GtmCheck::Assume => true,
            GtmCheck::Connect => {
                let running = self.can_connect(host, port);
                debug!("GTM {}:{} running: {}", host, port, running);
                running
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn probe_with(f: impl FnOnce(&mut ProbeConfig)) -> NetworkProbe {
        let mut config = ProbeConfig {
            connect_timeout_ms: 500,
            ..ProbeConfig::default()
        };
        f(&mut config);
        NetworkProbe::new(config)
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_master_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = probe_with(|_| {});
        assert!(probe.probe_master(&Endpoint::new("127.0.0.1", port)));
    }

    #[test]
    fn test_master_not_listening() {
        let port = closed_port();
        let probe = probe_with(|_| {});
        assert!(!probe.probe_master(&Endpoint::new("127.0.0.1", port)));
    }

    #[test]
    fn test_master_without_port() {
        let probe = probe_with(|_| {});
        let endpoint = Endpoint {
            server: "127.0.0.1".to_string(),
            ..Endpoint::default()
        };
        assert!(!probe.probe_master(&endpoint));
    }

    #[test]
    fn test_gtm_assume_and_connect() {
        let port = closed_port();
        let assume = probe_with(|_| {});
        assert!(assume.probe_gtm("127.0.0.1", port));

        let connect = probe_with(|c| c.gtm_check = GtmCheck::Connect);
        assert!(!connect.probe_gtm("127.0.0.1", port));

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap().port();
        assert!(connect.probe_gtm("127.0.0.1", open));
    }

    #[test]
    fn test_replica_command_local() {
        let probe = probe_with(|_| {});
        let endpoint = Endpoint::new("localhost", 5432).with_data_dir("/data/dn1");
        assert_eq!(
            probe.replica_command(&endpoint).unwrap(),
            vec!["pg_ctl", "status", "-D", "/data/dn1"]
        );
    }

    #[test]
    fn test_replica_command_remote() {
        let probe = probe_with(|c| {
            c.replica_command = vec!["check".into(), "{host}".into(), "{data_dir}".into()];
            c.remote_shell = vec!["ssh".into()];
        });
        let endpoint = Endpoint::new("node2", 5432).with_data_dir("/data/s");
        assert_eq!(
            probe.replica_command(&endpoint).unwrap(),
            vec![
                "ssh",
                "-o",
                "ConnectTimeout=1",
                "node2",
                "check",
                "node2",
                "/data/s"
            ]
        );
    }

    #[test]
    fn test_remote_shell_connect_timeout() {
        let endpoint = Endpoint::new("node2", 5432).with_data_dir("/data/s");

        let probe = probe_with(|c| c.connect_timeout_ms = 2500);
        let argv = probe.replica_command(&endpoint).unwrap();
        assert_eq!(
            argv[..6],
            ["ssh", "-o", "ConnectTimeout=3", "-o", "BatchMode=yes", "node2"]
        );

        let probe = probe_with(|c| {
            c.remote_shell = vec!["/usr/bin/ssh".into(), "-o".into(), "ConnectTimeout=9".into()]
        });
        let argv = probe.replica_command(&endpoint).unwrap();
        assert_eq!(argv[..4], ["/usr/bin/ssh", "-o", "ConnectTimeout=9", "node2"]);

        let probe = probe_with(|c| c.remote_shell = vec!["rsh".into()]);
        let argv = probe.replica_command(&endpoint).unwrap();
        assert_eq!(argv[..2], ["rsh", "node2"]);
    }

    #[test]
    fn test_replica_without_data_dir() {
        let probe = probe_with(|_| {});
        let endpoint = Endpoint::new("localhost", 5432);
        assert!(probe.replica_command(&endpoint).is_none());
        assert!(!probe.probe_replica(&endpoint));
    }

    #[cfg(unix)]
    #[test]
    fn test_replica_exit_status() {
        let endpoint = Endpoint::new("localhost", 5432).with_data_dir("/tmp");
        let ok = probe_with(|c| c.replica_command = vec!["true".into()]);
        assert!(ok.probe_replica(&endpoint));
        let failed = probe_with(|c| c.replica_command = vec!["false".into()]);
        assert!(!failed.probe_replica(&endpoint));
        let missing = probe_with(|c| {
            c.replica_command = vec!["clustermon-no-such-command".into()]
        });
        assert!(!missing.probe_replica(&endpoint));
    }
}
