mod traits;
mod wrapper;

use std::time::Duration;

use log::{debug, info, trace, warn};
use mockall_double::double;

#[double]
use self::wrapper::SimplyApi;
use self::wrapper::ApiRecord;
use super::{NewRecord, Provider, ProviderError, RecordId, RemoteRecord};

/// Base URL of the public Simply.com API
pub const SIMPLY_API_URL: &str = "https://api.simply.com";

/// A [`Provider`] connecting to the Simply.com API for listing, creating, updating and deleting DNS records.
///
/// To create a provider, use the [`SimplyProvider::from_config()`] function.
pub struct SimplyProvider {
    api: SimplyApi,
    dry_run: bool,
}

/// Configuration object for a [`SimplyProvider`]. Must be supplied when creating a provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SimplyProviderConfig<'a> {
    /// Simply.com account name, e.g. `S123456`
    pub account_name: &'a str,
    /// API key belonging to the account
    pub api_key: &'a str,
    /// Base URL of the API, [`SIMPLY_API_URL`] unless testing
    pub api_url: &'a str,
    /// Timeout for each request against the API
    pub timeout: Duration,
    /// Only read from the API, log all changes instead of making them
    pub dry_run: bool,
}

impl SimplyProvider {
    pub fn from_config(config: &SimplyProviderConfig) -> Result<Box<dyn Provider>, ProviderError> {
        let api = SimplyApi::try_new(
            config.api_url,
            config.account_name,
            config.api_key,
            config.timeout,
        )?;
        if config.dry_run {
            info!("Dry-run enabled, no changes will be made to Simply.com records");
        }

        Ok(Box::new(SimplyProvider {
            api,
            dry_run: config.dry_run,
        }))
    }
}

impl Provider for SimplyProvider {
    fn list_domains(&self) -> Result<Vec<String>, ProviderError> {
        debug!("Reading domains from Simply API");
        let domains = self
            .api
            .list_domains()?
            .into_iter()
            .map(|d| d.name)
            .collect::<Vec<_>>();
        trace!("Collected domains {:?}", domains);
        Ok(domains)
    }

    fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>, ProviderError> {
        let records = self
            .api
            .list_records(domain)?
            .into_iter()
            .filter_map(|mut r| {
                domain.clone_into(&mut r.domain);
                RemoteRecord::try_from(r)
                    .map_err(|e| warn!("Ignoring record in {}: {}", domain, e))
                    .ok()
            })
            .collect::<Vec<_>>();
        trace!("Collected records of {}: {:?}", domain, records);
        Ok(records)
    }

    fn add_record(&self, domain: &str, record: &NewRecord) -> Result<(), ProviderError> {
        if self.dry_run {
            info!("Dry-run: would add record {} to {}", record, domain);
            return Ok(());
        }
        self.api.add_record(&ApiRecord::from_new(domain, record))?;
        debug!("Added record {} to {}", record, domain);
        Ok(())
    }

    fn update_record(&self, domain: &str, record: &RemoteRecord) -> Result<(), ProviderError> {
        if self.dry_run {
            info!("Dry-run: would update record {}", record);
            return Ok(());
        }
        let mut rec = ApiRecord::from(record);
        domain.clone_into(&mut rec.domain);
        self.api.update_record(&rec)?;
        debug!("Updated record {}", record);
        Ok(())
    }

    fn delete_record(&self, domain: &str, id: RecordId) -> Result<(), ProviderError> {
        if self.dry_run {
            info!("Dry-run: would delete record #{} from {}", id, domain);
            return Ok(());
        }
        self.api.delete_record(domain, id)?;
        debug!("Deleted record #{} from {}", id, domain);
        Ok(())
    }
}
