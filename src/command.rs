//! Monitor command grammar
//!
//! ```text
//! monitor gtm [master|slave|all]
//! monitor gtm_proxy [all | name...]
//! monitor coordinator [master|slave] [all | name...]
//! monitor datanode [master|slave|learner] [all | name...]
//! monitor all
//! monitor name...
//! ```
//!
//! Role keywords are case-sensitive, qualifiers after them are not.

use crate::error::{MonitorError, Result};

pub const VERB: &str = "monitor";
pub const ALL: &str = "all";

const GTM: &str = "gtm";
const GTM_PROXY: &str = "gtm_proxy";
const COORDINATOR: &str = "coordinator";
const DATANODE: &str = "datanode";
const MASTER: &str = "master";
const SLAVE: &str = "slave";
const LEARNER: &str = "learner";

/// Node names a routine should visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Every configured node of the role
    All,
    /// Names exactly as typed, possibly containing `all`
    Names(Vec<String>),
}

/// Instances of a coordinator to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorScope {
    /// Master, then the slave if configured
    Combined,
    Master,
    Slave,
}

/// Instances of a data node to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Master, then every configured replica
    Combined,
    Master,
    Slave,
    Learner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtmTarget {
    All,
    Master,
    Slave,
}

/// A parsed monitor command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    Gtm(GtmTarget),
    GtmProxy(Targets),
    Coordinator(CoordinatorScope, Targets),
    Datanode(Scope, Targets),
    All,
    /// Bare node names, the role of each is looked up
    Nodes(Vec<String>),
}

/// Split a command line on whitespace
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

impl MonitorCommand {
    /// Parse a command line, with or without the leading `monitor` verb
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = tokenize(line);
        if tokens.first().is_some_and(|t| t == VERB) {
            tokens.remove(0);
        }
        Self::from_tokens(tokens)
    }

    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        let mut tokens = tokens.into_iter();
        let Some(first) = tokens.next() else {
            return Err(MonitorError::Usage(
                "no monitor command options found.".to_string(),
            ));
        };
        let rest: Vec<String> = tokens.collect();

        let command = match first.as_str() {
            GTM => MonitorCommand::Gtm(parse_gtm(&rest)?),
            GTM_PROXY => MonitorCommand::GtmProxy(targets(rest)),
            COORDINATOR => {
                let (scope, names) = split_scope(rest, |t| match qualifier(t) {
                    Some(Scope::Master) => Some(CoordinatorScope::Master),
                    Some(Scope::Slave) => Some(CoordinatorScope::Slave),
                    _ => None,
                });
                MonitorCommand::Coordinator(scope.unwrap_or(CoordinatorScope::Combined), names)
            }
            DATANODE => {
                let (scope, names) = split_scope(rest, qualifier);
                MonitorCommand::Datanode(scope.unwrap_or(Scope::Combined), names)
            }
            ALL => MonitorCommand::All,
            _ => {
                let mut names = Vec::with_capacity(rest.len() + 1);
                names.push(first);
                names.extend(rest);
                MonitorCommand::Nodes(names)
            }
        };
        Ok(command)
    }
}

fn is_keyword(token: &str, keyword: &str) -> bool {
    token.eq_ignore_ascii_case(keyword)
}

fn parse_gtm(rest: &[String]) -> Result<GtmTarget> {
    match rest.first() {
        None => Ok(GtmTarget::All),
        Some(t) if is_keyword(t, ALL) => Ok(GtmTarget::All),
        Some(t) if is_keyword(t, MASTER) => Ok(GtmTarget::Master),
        Some(t) if is_keyword(t, SLAVE) => Ok(GtmTarget::Slave),
        Some(_) => Err(MonitorError::Usage(
            "Invalid monitor gtm command option.".to_string(),
        )),
    }
}

/// A missing name list or a leading `all` selects every node
fn targets(rest: Vec<String>) -> Targets {
    if rest.first().map_or(true, |t| is_keyword(t, ALL)) {
        Targets::All
    } else {
        Targets::Names(rest)
    }
}

fn qualifier(token: &str) -> Option<Scope> {
    if is_keyword(token, MASTER) {
        Some(Scope::Master)
    } else if is_keyword(token, SLAVE) {
        Some(Scope::Slave)
    } else if is_keyword(token, LEARNER) {
        Some(Scope::Learner)
    } else {
        None
    }
}

/// Consume a leading qualifier, if `scope_of` recognizes one
fn split_scope<S>(rest: Vec<String>, scope_of: impl Fn(&str) -> Option<S>) -> (Option<S>, Targets) {
    match rest.first().and_then(|t| scope_of(t)) {
        Some(scope) => (Some(scope), targets(rest[1..].to_vec())),
        None => (None, targets(rest)),
    }
}
