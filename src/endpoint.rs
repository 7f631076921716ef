//! Wire types of the ExternalDNS webhook protocol.
//!
//! Field names and their optionality follow what ExternalDNS sends and expects,
//! any field we don't interpret ourselves is passed through untouched.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Display,
};

use serde::{Deserialize, Serialize};

use crate::{config::Ttl, fqdn};

/// Content type negotiated with ExternalDNS, sent on every webhook response
pub const MEDIA_TYPE_VERSION: &str = "application/external.dns.webhook+json;version=1";

/// A DNS record set as exchanged with ExternalDNS.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub dns_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,
    #[serde(rename = "recordTTL", default, skip_serializing_if = "is_zero")]
    pub record_ttl: Ttl,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderSpecificProperty {
    pub name: String,
    pub value: String,
}

fn is_zero(ttl: &Ttl) -> bool {
    *ttl == 0
}

/// Logical identity of a record set: two endpoints with the same key describe the same records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub name: String,
    pub record_type: String,
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.record_type, self.name)
    }
}

impl Endpoint {
    pub fn new(name: &str, record_type: &str, targets: Vec<String>, ttl: Ttl) -> Self {
        Endpoint {
            dns_name: name.to_owned(),
            targets,
            record_type: record_type.to_owned(),
            record_ttl: ttl,
            ..Default::default()
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            name: fqdn::normalize(&self.dns_name),
            record_type: self.record_type.trim().to_uppercase(),
        }
    }

    /// Lowercase the name and strip its trailing dot, leaving everything else untouched
    pub fn normalized(mut self) -> Self {
        self.dns_name = fqdn::normalize(&self.dns_name);
        self
    }

    /// Whether both endpoints describe the same records: same identity, same ttl and the same set of targets.
    /// Order and repetitions of targets don't matter
    pub fn same_records(&self, other: &Endpoint) -> bool {
        self.key() == other.key()
            && self.record_ttl == other.record_ttl
            && self.targets.iter().collect::<BTreeSet<_>>()
                == other.targets.iter().collect::<BTreeSet<_>>()
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {:?} (ttl {})",
            self.record_type, self.dns_name, self.targets, self.record_ttl
        )
    }
}

/// Change set sent by ExternalDNS on `POST /records`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde(default)]
    pub create: Vec<Endpoint>,
    #[serde(default)]
    pub update_old: Vec<Endpoint>,
    #[serde(default)]
    pub update_new: Vec<Endpoint>,
    #[serde(default)]
    pub delete: Vec<Endpoint>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }

    /// Every endpoint named anywhere in this change set
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.create
            .iter()
            .chain(&self.update_old)
            .chain(&self.update_new)
            .chain(&self.delete)
    }

    /// Derive the desired state by applying this change set on top of `current`.
    ///
    /// Deletions and old update sides remove their identity, new update sides and creations
    /// (re)insert theirs. Removing an identity that doesn't exist is a no-op.
    pub fn desired_state(&self, current: &[Endpoint]) -> Vec<Endpoint> {
        let mut desired = current
            .iter()
            .map(|e| (e.key(), e.clone()))
            .collect::<HashMap<_, _>>();

        for ep in self.delete.iter().chain(&self.update_old) {
            desired.remove(&ep.key());
        }
        for ep in self.update_new.iter().chain(&self.create) {
            desired.insert(ep.key(), ep.clone().normalized());
        }

        let mut desired = desired.into_values().collect::<Vec<_>>();
        desired.sort_by_key(Endpoint::key);
        desired
    }
}

/// Domain filter advertised to ExternalDNS during negotiation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}
