//! Mapping between flat DNS names and the `(host, domain)` addressing used by the registrar.
//!
//! A name is always resolved against the authoritative list of domains known to the provider,
//! picking the longest domain that the name falls under. Nested zones (`dev.example.com` next to
//! `example.com`) and multi-label suffixes (`example.co.uk`) are resolved the same way.

use std::sync::Arc;

use thiserror::Error;

/// Host value used by the registrar for records at the zone apex
pub const APEX: &str = "@";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no managed domain matches name `{0}`")]
    NoMatchingDomain(String),
}

/// A name split into its host part and the managed domain owning it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedName {
    pub host: String,
    pub domain: String,
}

/// The immutable set of domains managed by this instance.
///
/// Cloning is cheap, all clones share the same list. The list is never modified after creation,
/// a refresh means building a new `ManagedDomains` and swapping it in as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManagedDomains {
    domains: Arc<Vec<String>>,
}

impl ManagedDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains = domains
            .into_iter()
            .map(|d| normalize(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>();
        domains.sort();
        domains.dedup();
        ManagedDomains {
            domains: Arc::new(domains),
        }
    }

    /// All managed domains, sorted by name
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Split `fqdn` into host and owning domain.
    ///
    /// A single trailing dot is ignored and matching is case-insensitive.
    /// Names equal to a managed domain resolve to the [`APEX`] host.
    pub fn resolve(&self, fqdn: &str) -> Result<ResolvedName, ResolveError> {
        let name = normalize(fqdn);

        let mut matches = self
            .domains
            .iter()
            .filter(|d| is_within(&name, d))
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| a.len().cmp(&b.len()));
        let domain = matches
            .pop()
            .ok_or_else(|| ResolveError::NoMatchingDomain(fqdn.to_owned()))?;

        let host = if name == *domain {
            APEX.to_owned()
        } else {
            name[..name.len() - domain.len() - 1].to_owned()
        };
        Ok(ResolvedName {
            host,
            domain: domain.to_owned(),
        })
    }
}

/// Join a registrar host and domain back into a fully qualified name.
/// Both the apex sentinel and an empty host map to the domain itself.
pub fn fqdn(host: &str, domain: &str) -> String {
    let domain = normalize(domain);
    match host.trim() {
        "" | APEX => domain,
        h => format!("{}.{}", h.to_lowercase(), domain),
    }
}

/// Lowercase a DNS name and strip a single trailing dot
pub fn normalize(name: &str) -> String {
    let name = name.trim();
    name.strip_suffix('.').unwrap_or(name).to_lowercase()
}

// `name` is `domain` itself or a subdomain of it. A plain suffix check would also accept
// `badexample.com` for `example.com`, so the label boundary is checked explicitly.
fn is_within(name: &str, domain: &str) -> bool {
    name == domain
        || name
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.') && rest.len() > 1)
}
