//! Typed model of the compose-format deployment descriptor.
//!
//! The orchestrator owns the runtime meaning of every field. This module only
//! parses the descriptor, writes it back, and checks the structural properties
//! the orchestrator would otherwise reject at deploy time: references resolve,
//! host ports do not collide, env files exist.

use crate::utils::error::{FitCheckError, Result};
use crate::utils::validation::Validate;
use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

fn invalid(field: &str, value: &str, reason: impl Into<String>) -> FitCheckError {
    FitCheckError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeFile {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_scalar"
    )]
    pub version: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceRecord>,
    /// Top-level named volumes. A bare `name:` entry has no options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Option<VolumeRecord>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `driver_opts`, `labels` and other options kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortMapping>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub env_file: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "environment_entries"
    )]
    pub environment: BTreeMap<String, Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "dependency_entries",
        serialize_with = "serialize_dependencies"
    )]
    pub depends_on: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Mount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartPolicy>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSource {
    Context(String),
    Detailed {
        context: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dockerfile: Option<String>,
    },
}

impl BuildSource {
    pub fn context(&self) -> &str {
        match self {
            BuildSource::Context(context) => context,
            BuildSource::Detailed { context, .. } => context,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(d)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
    List(Vec<String>),
    Map(BTreeMap<String, Option<serde_yaml_ng::Value>>),
}

fn scalar_to_string(value: serde_yaml_ng::Value) -> Option<String> {
    match value {
        serde_yaml_ng::Value::String(s) => Some(s),
        serde_yaml_ng::Value::Number(n) => Some(n.to_string()),
        serde_yaml_ng::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `version: 3.8` parses as a number unless quoted.
fn optional_scalar<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<serde_yaml_ng::Value>::deserialize(d)?.and_then(scalar_to_string))
}

fn environment_entries<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<BTreeMap<String, Option<String>>, D::Error> {
    match RawEnvironment::deserialize(d)? {
        RawEnvironment::List(entries) => Ok(entries
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (entry, None),
            })
            .collect()),
        RawEnvironment::Map(entries) => entries
            .into_iter()
            .map(|(key, value)| match value {
                None | Some(serde_yaml_ng::Value::Null) => Ok((key, None)),
                Some(v) => scalar_to_string(v)
                    .map(|s| (key.clone(), Some(s)))
                    .ok_or_else(|| de::Error::custom(format!("environment.{} must be a scalar", key))),
            })
            .collect(),
    }
}

/// Startup-order hint. The orchestrator only waits for `condition`, and the
/// default waits for the container to be started, not ready.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub service: String,
    pub condition: DependencyCondition,
    /// `required`, `restart` and other long-form options.
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

impl Dependency {
    pub fn started(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            condition: DependencyCondition::default(),
            extra: BTreeMap::new(),
        }
    }

    fn is_plain(&self) -> bool {
        self.condition == DependencyCondition::ServiceStarted && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCondition {
    #[default]
    ServiceStarted,
    ServiceHealthy,
    ServiceCompletedSuccessfully,
}

#[derive(Deserialize)]
struct DependencyOptions {
    #[serde(default)]
    condition: DependencyCondition,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml_ng::Value>,
}

#[derive(Serialize)]
struct DependencyOptionsRef<'a> {
    condition: DependencyCondition,
    #[serde(flatten)]
    extra: &'a BTreeMap<String, serde_yaml_ng::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDependencies {
    List(Vec<String>),
    Map(BTreeMap<String, DependencyOptions>),
}

fn dependency_entries<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Vec<Dependency>, D::Error> {
    Ok(match RawDependencies::deserialize(d)? {
        RawDependencies::List(names) => names.into_iter().map(Dependency::started).collect(),
        RawDependencies::Map(entries) => entries
            .into_iter()
            .map(|(service, options)| Dependency {
                service,
                condition: options.condition,
                extra: options.extra,
            })
            .collect(),
    })
}

/// List form when every entry is a plain start dependency, map form otherwise.
fn serialize_dependencies<S: Serializer>(
    dependencies: &[Dependency],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if dependencies.iter().all(Dependency::is_plain) {
        serializer.collect_seq(dependencies.iter().map(|d| &d.service))
    } else {
        serializer.collect_map(dependencies.iter().map(|d| {
            (
                &d.service,
                DependencyOptionsRef {
                    condition: d.condition,
                    extra: &d.extra,
                },
            )
        }))
    }
}

/// Inclusive port range; a single port has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn port_count(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortRange {
    type Err = FitCheckError;

    fn from_str(s: &str) -> Result<Self> {
        let port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| invalid("ports", s, "port must be a number between 0 and 65535"))
        };
        match s.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (port(start)?, port(end)?);
                if start > end {
                    return Err(invalid("ports", s, "range start is greater than its end"));
                }
                Ok(Self { start, end })
            }
            None => Ok(Self::single(port(s)?)),
        }
    }
}

/// Published port: `[host_ip:][host:]container[/protocol]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PortMapping {
    pub host_ip: Option<IpAddr>,
    /// `None` lets the orchestrator pick an ephemeral host port.
    pub host: Option<PortRange>,
    pub container: PortRange,
    pub protocol: Protocol,
    /// Long-form only options such as `mode` and `name`.
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

impl PortMapping {
    /// Whether two mappings would bind the same host socket.
    pub fn conflicts_with(&self, other: &PortMapping) -> bool {
        let (Some(a), Some(b)) = (self.host, other.host) else {
            return false;
        };
        let ips_overlap = match (self.host_ip, other.host_ip) {
            (Some(x), Some(y)) => x == y || x.is_unspecified() || y.is_unspecified(),
            _ => true,
        };
        self.protocol == other.protocol && ips_overlap && a.overlaps(&b)
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.host_ip, self.host) {
            (Some(IpAddr::V6(ip)), host) => {
                write!(f, "[{}]:", ip)?;
                if let Some(host) = host {
                    write!(f, "{}", host)?;
                }
                write!(f, ":")?;
            }
            (Some(ip), host) => {
                write!(f, "{}:", ip)?;
                if let Some(host) = host {
                    write!(f, "{}", host)?;
                }
                write!(f, ":")?;
            }
            (None, Some(host)) => write!(f, "{}:", host)?,
            (None, None) => {}
        }
        write!(f, "{}", self.container)?;
        if self.protocol != Protocol::Tcp {
            write!(f, "/{}", self.protocol)?;
        }
        Ok(())
    }
}

impl FromStr for PortMapping {
    type Err = FitCheckError;

    fn from_str(s: &str) -> Result<Self> {
        let (spec, protocol) = match s.rsplit_once('/') {
            Some((spec, proto)) => (spec, proto.parse()?),
            None => (s, Protocol::Tcp),
        };

        let (host_ip, rest) = if let Some(bracketed) = spec.strip_prefix('[') {
            let (ip, rest) = bracketed
                .split_once("]:")
                .ok_or_else(|| invalid("ports", s, "unterminated IPv6 address"))?;
            let ip = ip
                .parse::<IpAddr>()
                .map_err(|_| invalid("ports", s, "invalid host IP"))?;
            (Some(ip), rest)
        } else {
            (None, spec)
        };

        let parts: Vec<&str> = rest.split(':').collect();
        let (host_ip, host, container) = match (host_ip, parts.as_slice()) {
            (None, [container]) => (None, None, *container),
            (None, [host, container]) => (None, Some(*host), *container),
            (None, [ip, host, container]) => {
                let ip = ip
                    .parse::<IpAddr>()
                    .map_err(|_| invalid("ports", s, "invalid host IP"))?;
                (Some(ip), Some(*host), *container)
            }
            (Some(ip), [host, container]) => (Some(ip), Some(*host), *container),
            _ => return Err(invalid("ports", s, "expected [IP:][HOST:]CONTAINER[/PROTO]")),
        };

        let host = match host {
            Some(h) if !h.is_empty() => Some(h.parse::<PortRange>()?),
            _ => None,
        };
        let container = container.parse::<PortRange>()?;

        if let Some(host) = host {
            if host.port_count() != container.port_count() && container.port_count() != 1 {
                return Err(invalid(
                    "ports",
                    s,
                    "host and container ranges differ in length",
                ));
            }
        }

        Ok(Self {
            host_ip,
            host,
            container,
            protocol,
            extra: BTreeMap::new(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Short(String),
    Long {
        target: RawPortValue,
        #[serde(default)]
        published: Option<RawPortValue>,
        #[serde(default)]
        host_ip: Option<String>,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(flatten)]
        extra: BTreeMap<String, serde_yaml_ng::Value>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPortValue {
    Number(u16),
    Text(String),
}

impl RawPortValue {
    fn into_range(self) -> Result<PortRange> {
        match self {
            RawPortValue::Number(port) => Ok(PortRange::single(port)),
            RawPortValue::Text(text) => text.parse(),
        }
    }
}

impl<'de> Deserialize<'de> for PortMapping {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        match RawPort::deserialize(d)? {
            RawPort::Number(port) => Ok(PortMapping {
                host_ip: None,
                host: None,
                container: PortRange::single(port),
                protocol: Protocol::Tcp,
                extra: BTreeMap::new(),
            }),
            RawPort::Short(text) => text.parse().map_err(de::Error::custom),
            RawPort::Long {
                target,
                published,
                host_ip,
                protocol,
                extra,
            } => {
                let container = target.into_range().map_err(de::Error::custom)?;
                let host = published
                    .map(RawPortValue::into_range)
                    .transpose()
                    .map_err(de::Error::custom)?;
                let host_ip = host_ip
                    .map(|ip| ip.parse::<IpAddr>())
                    .transpose()
                    .map_err(de::Error::custom)?;
                let protocol = protocol
                    .map(|p| p.parse::<Protocol>())
                    .transpose()
                    .map_err(de::Error::custom)?
                    .unwrap_or(Protocol::Tcp);
                Ok(PortMapping {
                    host_ip,
                    host,
                    container,
                    protocol,
                    extra,
                })
            }
        }
    }
}

/// Single ports are written as numbers, ranges as `start-end`.
fn serialize_port_range<S: Serializer>(
    range: &PortRange,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if range.start == range.end {
        serializer.serialize_u16(range.start)
    } else {
        serializer.collect_str(range)
    }
}

fn serialize_optional_port_range<S: Serializer>(
    range: &Option<PortRange>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match range {
        Some(range) => serialize_port_range(range, serializer),
        None => serializer.serialize_none(),
    }
}

#[derive(Serialize)]
struct LongPort<'a> {
    #[serde(serialize_with = "serialize_port_range")]
    target: PortRange,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_port_range"
    )]
    published: Option<PortRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<String>,
    #[serde(flatten)]
    extra: &'a BTreeMap<String, serde_yaml_ng::Value>,
}

impl Serialize for PortMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.extra.is_empty() {
            return serializer.collect_str(self);
        }
        LongPort {
            target: self.container,
            published: self.host,
            host_ip: self.host_ip.map(|ip| ip.to_string()),
            protocol: (self.protocol != Protocol::Tcp).then(|| self.protocol.to_string()),
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    /// Host path mapped into the container.
    Bind(String),
    /// Orchestrator-managed volume declared at the top level.
    Named(String),
    /// Unnamed volume created for the container.
    Anonymous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    pub source: MountSource,
    pub target: String,
    pub mode: Option<String>,
    /// Long-form only options such as `bind`, `volume` and `tmpfs`.
    pub extra: BTreeMap<String, serde_yaml_ng::Value>,
}

const MOUNT_MODES: &[&str] = &[
    "ro",
    "rw",
    "z",
    "Z",
    "cached",
    "delegated",
    "consistent",
    "nocopy",
];

const CONSISTENCY_MODES: &[&str] = &["cached", "delegated", "consistent"];

impl Mount {
    pub fn is_read_only(&self) -> bool {
        self.mode
            .as_deref()
            .map(|m| m.split(',').any(|flag| flag == "ro"))
            .unwrap_or(false)
    }

    pub fn named_volume(&self) -> Option<&str> {
        match &self.source {
            MountSource::Named(name) => Some(name),
            _ => None,
        }
    }

    fn classify(source: &str) -> MountSource {
        if source.starts_with('.') || source.starts_with('/') || source.starts_with('~') {
            MountSource::Bind(source.to_string())
        } else {
            MountSource::Named(source.to_string())
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            MountSource::Bind(source) | MountSource::Named(source) => {
                write!(f, "{}:{}", source, self.target)?
            }
            MountSource::Anonymous => write!(f, "{}", self.target)?,
        }
        if let Some(mode) = &self.mode {
            write!(f, ":{}", mode)?;
        }
        Ok(())
    }
}

impl FromStr for Mount {
    type Err = FitCheckError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let (source, target, mode) = match parts.as_slice() {
            [target] => (MountSource::Anonymous, *target, None),
            [source, target] => (Self::classify(source), *target, None),
            [source, target, mode] => (Self::classify(source), *target, Some(*mode)),
            _ => return Err(invalid("volumes", s, "expected [SOURCE:]TARGET[:MODE]")),
        };

        if target.is_empty() || source == MountSource::Named(String::new()) {
            return Err(invalid("volumes", s, "empty source or target"));
        }
        if let Some(mode) = mode {
            if !mode.split(',').all(|flag| MOUNT_MODES.contains(&flag)) {
                return Err(invalid("volumes", s, format!("unknown access mode '{}'", mode)));
            }
        }

        Ok(Self {
            source,
            target: target.to_string(),
            mode: mode.map(str::to_string),
            extra: BTreeMap::new(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMount {
    Short(String),
    Long {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        source: Option<String>,
        target: String,
        #[serde(default)]
        read_only: Option<bool>,
        #[serde(default)]
        consistency: Option<String>,
        #[serde(flatten)]
        extra: BTreeMap<String, serde_yaml_ng::Value>,
    },
}

impl<'de> Deserialize<'de> for Mount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        match RawMount::deserialize(d)? {
            RawMount::Short(text) => text.parse().map_err(de::Error::custom),
            RawMount::Long {
                kind,
                source,
                target,
                read_only,
                consistency,
                mut extra,
            } => {
                let source = match (kind.as_str(), source) {
                    ("bind", Some(path)) => MountSource::Bind(path),
                    ("volume", Some(name)) => MountSource::Named(name),
                    ("volume", None) => MountSource::Anonymous,
                    (other, _) => {
                        return Err(de::Error::custom(format!(
                            "unsupported mount type '{}'",
                            other
                        )))
                    }
                };

                let mut flags = Vec::new();
                match read_only {
                    Some(true) => flags.push("ro".to_string()),
                    Some(false) => flags.push("rw".to_string()),
                    None => {}
                }
                match consistency {
                    Some(c) if CONSISTENCY_MODES.contains(&c.as_str()) => flags.push(c),
                    Some(c) => {
                        extra.insert("consistency".to_string(), serde_yaml_ng::Value::String(c));
                    }
                    None => {}
                }

                Ok(Mount {
                    source,
                    target,
                    mode: (!flags.is_empty()).then(|| flags.join(",")),
                    extra,
                })
            }
        }
    }
}

#[derive(Serialize)]
struct LongMount<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consistency: Option<&'a str>,
    #[serde(flatten)]
    extra: &'a BTreeMap<String, serde_yaml_ng::Value>,
}

impl Mount {
    /// The short string reads back as a different mount, e.g. `data` bound
    /// as a host path, or an anonymous volume with a mode.
    fn needs_long_form(&self) -> bool {
        !self.extra.is_empty()
            || self
                .to_string()
                .parse::<Mount>()
                .map(|reparsed| reparsed != *self)
                .unwrap_or(true)
    }

    fn long_form(&self) -> std::result::Result<LongMount<'_>, String> {
        let (kind, source) = match &self.source {
            MountSource::Bind(path) => ("bind", Some(path.as_str())),
            MountSource::Named(name) => ("volume", Some(name.as_str())),
            MountSource::Anonymous => ("volume", None),
        };
        let mut long = LongMount {
            kind,
            source,
            target: &self.target,
            read_only: None,
            consistency: None,
            extra: &self.extra,
        };
        for flag in self.mode.as_deref().into_iter().flat_map(|m| m.split(',')) {
            match flag {
                "ro" => long.read_only = Some(true),
                "rw" => long.read_only = Some(false),
                c if CONSISTENCY_MODES.contains(&c) => long.consistency = Some(c),
                other => {
                    return Err(format!(
                        "mount mode '{}' on {} has no long-syntax equivalent",
                        other, self.target
                    ))
                }
            }
        }
        Ok(long)
    }
}

impl Serialize for Mount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if !self.needs_long_form() {
            return serializer.collect_str(self);
        }
        self.long_form()
            .map_err(<S::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    No,
    Always,
    UnlessStopped,
    /// `on-failure[:max_retries]`
    OnFailure(Option<u32>),
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::No => f.write_str("no"),
            RestartPolicy::Always => f.write_str("always"),
            RestartPolicy::UnlessStopped => f.write_str("unless-stopped"),
            RestartPolicy::OnFailure(None) => f.write_str("on-failure"),
            RestartPolicy::OnFailure(Some(n)) => write!(f, "on-failure:{}", n),
        }
    }
}

impl FromStr for RestartPolicy {
    type Err = FitCheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no" => Ok(RestartPolicy::No),
            "always" => Ok(RestartPolicy::Always),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            "on-failure" => Ok(RestartPolicy::OnFailure(None)),
            other => match other.strip_prefix("on-failure:") {
                Some(n) => n
                    .parse::<u32>()
                    .map(|n| RestartPolicy::OnFailure(Some(n)))
                    .map_err(|_| invalid("restart", s, "retry count must be a number")),
                None => Err(invalid(
                    "restart",
                    s,
                    "expected no, always, unless-stopped or on-failure[:N]",
                )),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRestart {
    Text(String),
    // YAML 1.1 readers turn a bare `no` into false.
    Flag(bool),
}

impl<'de> Deserialize<'de> for RestartPolicy {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        match RawRestart::deserialize(d)? {
            RawRestart::Text(text) => text.parse().map_err(de::Error::custom),
            RawRestart::Flag(false) => Ok(RestartPolicy::No),
            RawRestart::Flag(true) => Err(de::Error::custom("restart: true is not a policy")),
        }
    }
}

impl Serialize for RestartPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One structural problem found in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorIssue {
    MissingImageOrBuild {
        service: String,
    },
    UnknownDependency {
        service: String,
        dependency: String,
    },
    SelfDependency {
        service: String,
    },
    DependencyCycle {
        services: Vec<String>,
    },
    UnknownVolume {
        service: String,
        volume: String,
    },
    ZeroHostPort {
        service: String,
        mapping: String,
    },
    PortConflict {
        port: String,
        first: String,
        second: String,
    },
    MissingEnvFile {
        service: String,
        path: String,
    },
}

impl fmt::Display for DescriptorIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorIssue::MissingImageOrBuild { service } => {
                write!(f, "service '{}' declares neither build nor image", service)
            }
            DescriptorIssue::UnknownDependency {
                service,
                dependency,
            } => write!(
                f,
                "service '{}' depends on undeclared service '{}'",
                service, dependency
            ),
            DescriptorIssue::SelfDependency { service } => {
                write!(f, "service '{}' depends on itself", service)
            }
            DescriptorIssue::DependencyCycle { services } => {
                write!(f, "dependency cycle between {}", services.join(", "))
            }
            DescriptorIssue::UnknownVolume { service, volume } => write!(
                f,
                "service '{}' mounts volume '{}' which is not declared under top-level volumes",
                service, volume
            ),
            DescriptorIssue::ZeroHostPort { service, mapping } => {
                write!(f, "service '{}' publishes host port 0 ({})", service, mapping)
            }
            DescriptorIssue::PortConflict {
                port,
                first,
                second,
            } => {
                if first == second {
                    write!(f, "service '{}' publishes host port {} twice", first, port)
                } else {
                    write!(
                        f,
                        "host port {} is published by both '{}' and '{}'",
                        port, first, second
                    )
                }
            }
            DescriptorIssue::MissingEnvFile { service, path } => {
                write!(f, "service '{}' needs env file '{}' which does not exist", service, path)
            }
        }
    }
}

impl DescriptorIssue {
    /// Env-file issues depend on the filesystem, not on the descriptor itself.
    pub fn is_env_file(&self) -> bool {
        matches!(self, DescriptorIssue::MissingEnvFile { .. })
    }
}

impl ComposeFile {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceRecord> {
        self.services.get(name)
    }

    pub fn published_ports(&self) -> Vec<(&str, &PortMapping)> {
        self.services
            .iter()
            .flat_map(|(name, service)| service.ports.iter().map(move |p| (name.as_str(), p)))
            .collect()
    }

    /// 結構檢查，不做任何 I/O；回傳所有發現的問題
    pub fn check(&self) -> Vec<DescriptorIssue> {
        let mut issues = Vec::new();

        for (name, service) in &self.services {
            if service.build.is_none() && service.image.is_none() {
                issues.push(DescriptorIssue::MissingImageOrBuild {
                    service: name.clone(),
                });
            }

            for dependency in &service.depends_on {
                if &dependency.service == name {
                    issues.push(DescriptorIssue::SelfDependency {
                        service: name.clone(),
                    });
                } else if !self.services.contains_key(&dependency.service) {
                    issues.push(DescriptorIssue::UnknownDependency {
                        service: name.clone(),
                        dependency: dependency.service.clone(),
                    });
                }
            }

            for mount in &service.volumes {
                if let Some(volume) = mount.named_volume() {
                    if !self.volumes.contains_key(volume) {
                        issues.push(DescriptorIssue::UnknownVolume {
                            service: name.clone(),
                            volume: volume.to_string(),
                        });
                    }
                }
            }

            for mapping in &service.ports {
                if mapping.host.map(|h| h.start == 0).unwrap_or(false) {
                    issues.push(DescriptorIssue::ZeroHostPort {
                        service: name.clone(),
                        mapping: mapping.to_string(),
                    });
                }
            }
        }

        let cycle = self.cycle_members();
        if !cycle.is_empty() {
            issues.push(DescriptorIssue::DependencyCycle { services: cycle });
        }

        let ports = self.published_ports();
        for (i, (first_service, first)) in ports.iter().enumerate() {
            for (second_service, second) in &ports[i + 1..] {
                if first.conflicts_with(second) {
                    let port = first.host.map(|h| h.to_string()).unwrap_or_default();
                    issues.push(DescriptorIssue::PortConflict {
                        port,
                        first: first_service.to_string(),
                        second: second_service.to_string(),
                    });
                }
            }
        }

        issues
    }

    /// Reports referenced env files missing under `base_dir`.
    pub fn check_env_files(&self, base_dir: impl AsRef<Path>) -> Vec<DescriptorIssue> {
        let base_dir = base_dir.as_ref();
        let mut issues = Vec::new();
        for (name, service) in &self.services {
            for env_file in &service.env_file {
                let path = base_dir.join(env_file);
                if !path.is_file() {
                    issues.push(DescriptorIssue::MissingEnvFile {
                        service: name.clone(),
                        path: env_file.clone(),
                    });
                }
            }
        }
        issues
    }

    /// Services ordered so that every dependency comes first; ties sort by name.
    pub fn startup_order(&self) -> Result<Vec<String>> {
        let (order, remaining) = self.topological_sort();
        if !remaining.is_empty() {
            return Err(FitCheckError::DescriptorError {
                issues: vec![DescriptorIssue::DependencyCycle {
                    services: self.cycle_members(),
                }
                .to_string()],
            });
        }
        Ok(order)
    }

    /// Resolved edges only; unknown and self references are reported by `check`.
    fn dependencies_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.services
            .get(name)
            .into_iter()
            .flat_map(|s| s.depends_on.iter())
            .map(|d| d.service.as_str())
            .filter(move |d| *d != name && self.services.contains_key(*d))
    }

    fn topological_sort(&self) -> (Vec<String>, BTreeSet<String>) {
        let mut pending: BTreeMap<&str, usize> = self
            .services
            .keys()
            .map(|name| {
                let unique: BTreeSet<&str> = self.dependencies_of(name).collect();
                (name.as_str(), unique.len())
            })
            .collect();

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(self.services.len());

        while let Some(next) = ready.pop_first() {
            pending.remove(next);
            order.push(next.to_string());
            for (name, count) in pending.iter_mut() {
                let depends: BTreeSet<&str> = self.dependencies_of(name).collect();
                if depends.contains(next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*name);
                    }
                }
            }
        }

        let remaining = pending.keys().map(|name| name.to_string()).collect();
        (order, remaining)
    }

    /// Services that lie on a dependency cycle, sorted by name.
    fn cycle_members(&self) -> Vec<String> {
        let (_, remaining) = self.topological_sort();
        remaining
            .iter()
            .filter(|start| self.reaches(start, start, &remaining))
            .cloned()
            .collect()
    }

    fn reaches(&self, from: &str, target: &str, within: &BTreeSet<String>) -> bool {
        let mut stack: Vec<&str> = self.dependencies_of(from).collect();
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !within.contains(current) || !seen.insert(current) {
                continue;
            }
            stack.extend(self.dependencies_of(current));
        }
        false
    }
}

impl Validate for ComposeFile {
    fn validate(&self) -> Result<()> {
        let issues = self.check();
        if issues.is_empty() {
            return Ok(());
        }
        Err(FitCheckError::DescriptorError {
            issues: issues.iter().map(|i| i.to_string()).collect(),
        })
    }
}
