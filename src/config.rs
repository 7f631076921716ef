use itertools::Itertools;
use log::{error, info};
use thiserror::Error;

use crate::fqdn::{self, ManagedDomains};

/// Record TTL in seconds. A value of 0 means "unspecified"
pub type Ttl = u32;

/// TTL applied to records that don't specify one
pub const DEFAULT_TTL: Ttl = 3600;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("the provider does not manage any domains")]
    NoProviderDomains,
    #[error("none of the domains in the domain filter are managed by the provider: {0:?}")]
    NoValidDomains(Vec<String>),
}

/// Settle on the set of domains this instance manages.
///
/// `available` is the authoritative list returned by the provider. An empty `filter` selects all of them,
/// otherwise only the filter entries known to the provider are kept. Unknown entries are logged and skipped.
pub fn resolve_domain_filter(
    available: &[String],
    filter: &[String],
) -> Result<ManagedDomains, ConfigError> {
    let available = ManagedDomains::new(available);
    if available.is_empty() {
        return Err(ConfigError::NoProviderDomains);
    }

    let requested = filter
        .iter()
        .map(|d| fqdn::normalize(d))
        .filter(|d| !d.is_empty())
        .unique()
        .collect::<Vec<_>>();
    if requested.is_empty() {
        info!(
            "No domain filter set, managing all {} provider domains",
            available.len()
        );
        return Ok(available);
    }

    let (known, unknown): (Vec<_>, Vec<_>) = requested
        .into_iter()
        .partition(|d| available.domains().contains(d));
    for d in &unknown {
        error!("Domain filter: {} is not managed by the provider, skipping", d);
    }
    if known.is_empty() {
        return Err(ConfigError::NoValidDomains(unknown));
    }

    info!("Managing filtered domains: {:?}", known);
    Ok(ManagedDomains::new(known))
}
