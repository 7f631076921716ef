//! The remote record store behind the webhook.
//!
//! A [`Provider`] is a DNS registrar such as Simply.com that hosts the records.
//! Providers only know about single-valued records addressed by `(host, domain)` and a numeric ID,
//! the conversion from and to ExternalDNS record sets happens in [`current_state()`] and the [`crate::executor`].

mod simply;

pub use self::simply::{SimplyProvider, SimplyProviderConfig, SIMPLY_API_URL};

use std::{collections::BTreeMap, fmt::Display};

#[cfg(test)]
use mockall::automock;

use itertools::Itertools;
use log::{debug, trace};
use thiserror::Error;

use crate::{
    config::Ttl,
    endpoint::{Endpoint, RecordKey},
    fqdn::{self, ManagedDomains},
};

/// ID assigned to a record by the provider. Only unique within a domain
pub type RecordId = u64;

/// Access to the records hosted by a DNS provider.
///
/// All calls are blocking and issued one after another, callers in async contexts need to
/// move them onto a blocking thread.
#[cfg_attr(test, automock)]
pub trait Provider: Send + Sync {
    /// List the names of all domains hosted with this provider
    fn list_domains(&self) -> Result<Vec<String>, ProviderError>;

    /// List all records of a single domain
    fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>, ProviderError>;

    /// Create a new record in `domain`. The provider assigns the ID
    fn add_record(&self, domain: &str, record: &NewRecord) -> Result<(), ProviderError>;

    /// Replace the contents of the existing record `record.id`
    fn update_record(&self, domain: &str, record: &RemoteRecord) -> Result<(), ProviderError>;

    fn delete_record(&self, domain: &str, id: RecordId) -> Result<(), ProviderError>;
}

/// Error returned by a provider action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached or failed internally
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The provider refused the request, e.g. because of invalid record data
    #[error("provider rejected request: {0}")]
    Rejected(String),
    /// The domain or record doesn't exist
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

/// A single record as stored by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteRecord {
    pub id: RecordId,
    /// Host relative to `domain`, [`fqdn::APEX`] for the apex
    pub host: String,
    pub domain: String,
    pub record_type: String,
    pub data: String,
    pub ttl: Ttl,
}

impl Display for RemoteRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} {} {} (ttl {})",
            self.id,
            self.record_type,
            fqdn::fqdn(&self.host, &self.domain),
            self.data,
            self.ttl
        )
    }
}

/// A record that hasn't been created yet and therefore has no ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewRecord {
    pub host: String,
    pub record_type: String,
    pub data: String,
    pub ttl: Ttl,
}

impl Display for NewRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} (ttl {})",
            self.record_type, self.host, self.data, self.ttl
        )
    }
}

/// Reference to the provider record holding one target of a [`RecordSet`].
///
/// Record IDs are only unique within a domain, so every reference keeps the domain and host
/// it was listed under. With nested domains the same name can live in either of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub id: RecordId,
    pub host: String,
    pub domain: String,
    pub target: String,
    pub ttl: Ttl,
}

/// A record set as currently stored by the provider: the endpoint plus the IDs of the records backing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    pub endpoint: Endpoint,
    pub records: Vec<RecordRef>,
}

impl RecordSet {
    pub fn key(&self) -> RecordKey {
        self.endpoint.key()
    }

    /// Whether the records of this set already hold exactly what `desired` describes,
    /// with every single record at the desired ttl
    pub fn is_current(&self, desired: &Endpoint) -> bool {
        self.endpoint.same_records(desired)
            && self.records.iter().all(|r| r.ttl == desired.record_ttl)
    }

    /// Group single-valued provider records into record sets keyed by `(name, type)`.
    ///
    /// Each record contributes one target. If the records of a set disagree on their TTL,
    /// the lowest one is reported as the TTL of the set, the individual TTLs stay on the [`RecordRef`]s.
    pub fn group(records: Vec<RemoteRecord>) -> Vec<RecordSet> {
        let mut sets: BTreeMap<RecordKey, RecordSet> = BTreeMap::new();

        for rec in records {
            let name = fqdn::fqdn(&rec.host, &rec.domain);
            let ep = Endpoint::new(&name, &rec.record_type, Vec::new(), rec.ttl);
            let set = sets.entry(ep.key()).or_insert_with(|| RecordSet {
                endpoint: ep,
                records: Vec::new(),
            });
            set.endpoint.record_ttl = set.endpoint.record_ttl.min(rec.ttl);
            set.endpoint.targets.push(rec.data.to_owned());
            set.records.push(RecordRef {
                id: rec.id,
                host: rec.host,
                domain: rec.domain,
                target: rec.data,
                ttl: rec.ttl,
            });
        }
        sets.into_values().collect()
    }
}

/// Read the current state of all managed domains from the provider.
///
/// Fails as a whole if any domain can't be read, a partial state would make records of
/// the missing domain look deleted.
pub fn current_state(
    provider: &dyn Provider,
    domains: &ManagedDomains,
) -> Result<Vec<RecordSet>, ProviderError> {
    let records = domains
        .domains()
        .iter()
        .map(|d| {
            debug!("Reading records of domain {}", d);
            provider.list_records(d).map(|records| {
                records.into_iter().map(|mut r| {
                    // providers don't always fill in the domain on listed records
                    r.domain = d.to_owned();
                    r
                })
            })
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect_vec();
    trace!("Collected records: {:?}", records);

    let sets = RecordSet::group(records);
    debug!(
        "Read {} record sets from {} domains",
        sets.len(),
        domains.len()
    );
    Ok(sets)
}
