pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod probe;
pub mod report;
pub mod shell;

pub use command::MonitorCommand;
pub use config::ClusterConfig;
pub use error::{MonitorError, Result};
pub use monitor::Monitor;
pub use probe::{NetworkProbe, Probe};
pub use report::{ConsoleReporter, Level, MemoryReporter, Reporter};
