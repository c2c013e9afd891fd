/*
 * Created on Wed Feb 28 2024
 *
 * This file is a part of Crimson
 * Crimson is a free and open-source in-memory data structure server written
 * by Sayan Nandan ("the Author") with the vision to provide a compact,
 * protocol-compatible store for strings, lists and streams.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Configuration
//!
//! A layered configuration: built-in defaults, overridden by environment
//! variables, overridden by CLI flags. Every source normalizes through
//! [`ConfigSource`] so a bad value is reported with the knob it came from
//! instead of silently falling back.

mod cfgcli;
mod cfgenv;

use crate::util;
use core::str::FromStr;
use std::env::VarError;
use std::net::{IpAddr, Ipv4Addr};

// server defaults
const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const DEFAULT_PORT: u16 = 6379;
// snapshot defaults
const DEFAULT_SNAPSHOT_DIR: &str = ".";
const DEFAULT_SNAPSHOT_FILE: &str = "dump.rdb";

/// Where the snapshot file lives. Also what `CONFIG GET` reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub dir: String,
    pub file: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            dir: DEFAULT_SNAPSHOT_DIR.to_owned(),
            file: DEFAULT_SNAPSHOT_FILE.to_owned(),
        }
    }
}

/// The fully evaluated configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationSet {
    pub host: IpAddr,
    pub port: u16,
    /// `Some` makes this process a follower of that primary
    pub master: Option<(String, u16)>,
    pub snapshot: SnapshotConfig,
}

impl Default for ConfigurationSet {
    fn default() -> Self {
        ConfigurationSet {
            host: DEFAULT_IPV4,
            port: DEFAULT_PORT,
            master: None,
            snapshot: SnapshotConfig::default(),
        }
    }
}

/// What a configuration source turned out to hold for one knob
pub enum Fetched {
    /// The source says nothing about this knob
    Absent,
    /// The raw text the source supplied; parsing is the evaluator's job
    Value(String),
    /// The source carried something that is not even text
    Broken(&'static str),
}

/// A configuration source for a single knob. However the value arrives — a
/// CLI match, an environment variable — it normalizes to [`Fetched`] and the
/// evaluation below owns all parsing and error reporting
pub trait ConfigSource {
    fn fetch(self) -> Fetched;
}

impl ConfigSource for Option<&str> {
    fn fetch(self) -> Fetched {
        match self {
            Some(raw) => Fetched::Value(raw.to_owned()),
            None => Fetched::Absent,
        }
    }
}

impl ConfigSource for Result<String, VarError> {
    fn fetch(self) -> Fetched {
        match self {
            Ok(raw) => Fetched::Value(raw),
            Err(VarError::NotPresent) => Fetched::Absent,
            Err(VarError::NotUnicode(_)) => Fetched::Broken("not unicode"),
        }
    }
}

/// A configuration set under evaluation: the target values plus the error
/// stack accumulated while layering sources over them
#[derive(Debug)]
pub struct Configset {
    pub cfg: ConfigurationSet,
    estack: Vec<String>,
    /// Did any source actually touch anything?
    did_mutate: bool,
}

impl Configset {
    pub fn new() -> Self {
        Configset {
            cfg: ConfigurationSet::default(),
            estack: Vec::new(),
            did_mutate: false,
        }
    }
    fn epush(&mut self, key: &'static str, why: &str) {
        self.estack.push(format!("bad value for `{key}` ({why})"));
    }
    /// Fetch whatever `source` holds. Anything other than absence counts as
    /// a mutation attempt; a broken source goes straight onto the error stack
    fn take_value(&mut self, source: impl ConfigSource, key: &'static str) -> Option<String> {
        match source.fetch() {
            Fetched::Absent => None,
            Fetched::Value(raw) => {
                self.did_mutate = true;
                Some(raw)
            }
            Fetched::Broken(why) => {
                self.did_mutate = true;
                self.epush(key, why);
                None
            }
        }
    }
    /// Pull one knob out of `source`. An absent source leaves the target
    /// alone; a value that will not parse lands on the error stack against
    /// `key`
    pub fn try_mutate<T: FromStr>(
        &mut self,
        source: impl ConfigSource,
        target: &mut T,
        key: &'static str,
    ) {
        let raw = match self.take_value(source, key) {
            Some(raw) => raw,
            None => return,
        };
        match raw.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => self.epush(key, "failed to parse"),
        }
    }
    /// A primary address is `host port` (or `host:port`); it doesn't fit the
    /// single-value mould above
    pub fn try_mutate_master(&mut self, source: impl ConfigSource, key: &'static str) {
        let raw = match self.take_value(source, key) {
            Some(raw) => raw,
            None => return,
        };
        let mut split = raw.split(|c: char| c.is_whitespace() || c == ':');
        let parsed = match (split.next(), split.next(), split.next()) {
            (Some(host), Some(port), None) => {
                port.parse().ok().map(|port| (host.to_owned(), port))
            }
            _ => None,
        };
        match parsed {
            Some(master) => self.cfg.master = Some(master),
            None => self.epush(key, "expected `host port`"),
        }
    }
    pub fn is_okay(&self) -> bool {
        self.estack.is_empty()
    }
    pub fn is_mutated(&self) -> bool {
        self.did_mutate
    }
}

impl Default for Configset {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate every configuration source. Errors are logged and the process
/// exits: a server that mis-heard its operator must not come up half-right
pub fn get_config_or_exit() -> ConfigurationSet {
    let mut configset = Configset::new();
    cfgenv::parse_env(&mut configset);
    let matches = cfgcli::build().get_matches();
    cfgcli::parse_cli_args(&mut configset, &matches);
    if !configset.is_okay() {
        for error in &configset.estack {
            log::error!("config error: {error}");
        }
        util::exit_error();
    }
    if configset.is_mutated() {
        log::info!("configuration assembled from CLI/environment overrides");
    } else {
        log::info!("no configuration supplied, running with defaults");
    }
    configset.cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_without_sources() {
        let configset = Configset::new();
        assert!(configset.is_okay());
        assert!(!configset.is_mutated());
        assert_eq!(configset.cfg, ConfigurationSet::default());
    }

    #[test]
    fn cli_style_source_mutates() {
        let mut configset = Configset::new();
        let mut port = DEFAULT_PORT;
        configset.try_mutate(Some("7878"), &mut port, "--port");
        assert_eq!(port, 7878);
        assert!(configset.is_okay() && configset.is_mutated());
    }

    #[test]
    fn bad_values_land_on_the_error_stack() {
        let mut configset = Configset::new();
        let mut port = DEFAULT_PORT;
        configset.try_mutate(Some("no-number"), &mut port, "--port");
        assert!(!configset.is_okay());
        assert_eq!(port, DEFAULT_PORT);
    }

    #[test]
    fn env_style_source_mutates() {
        let mut configset = Configset::new();
        let mut port = DEFAULT_PORT;
        configset.try_mutate(
            Ok::<_, std::env::VarError>("9001".to_owned()),
            &mut port,
            "CRIMSON_PORT",
        );
        assert_eq!(port, 9001);
    }

    #[test]
    fn non_unicode_sources_are_reported_not_parsed() {
        use std::ffi::OsString;
        let mut configset = Configset::new();
        let mut port = DEFAULT_PORT;
        configset.try_mutate(
            Err::<String, _>(VarError::NotUnicode(OsString::new())),
            &mut port,
            "CRIMSON_PORT",
        );
        assert!(!configset.is_okay());
        assert!(configset.is_mutated());
        assert_eq!(port, DEFAULT_PORT);
    }

    #[test]
    fn master_accepts_both_spellings() {
        let mut configset = Configset::new();
        configset.try_mutate_master(Some("127.0.0.1 6379"), "--replicaof");
        assert_eq!(
            configset.cfg.master,
            Some(("127.0.0.1".to_owned(), 6379))
        );
        configset.try_mutate_master(Some("primary.local:7000"), "--replicaof");
        assert_eq!(
            configset.cfg.master,
            Some(("primary.local".to_owned(), 7000))
        );
        configset.try_mutate_master(Some("garbage"), "--replicaof");
        assert!(!configset.is_okay());
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let mut configset = Configset::new();
        let mut port = DEFAULT_PORT;
        // env first, CLI second
        configset.try_mutate(
            Ok::<_, std::env::VarError>("9001".to_owned()),
            &mut port,
            "CRIMSON_PORT",
        );
        configset.try_mutate(Some("7878"), &mut port, "--port");
        assert_eq!(port, 7878);
    }
}
