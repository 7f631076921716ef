use crate::{
    fqdn::APEX,
    provider::{NewRecord, ProviderError, RemoteRecord},
};

use super::wrapper::ApiRecord;

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Internal(format!("invalid response from Simply API: {}", e))
        } else {
            ProviderError::Unavailable(e.to_string())
        }
    }
}

impl TryFrom<ApiRecord> for RemoteRecord {
    type Error = String;

    fn try_from(r: ApiRecord) -> Result<Self, Self::Error> {
        let id = r
            .id
            .ok_or_else(|| format!("Record without id: {:?}", r))?;
        let host = match r.host.trim() {
            "" => APEX.to_owned(),
            h => h.to_owned(),
        };
        Ok(RemoteRecord {
            id,
            host,
            domain: r.domain,
            record_type: r.record_type,
            data: r.data,
            ttl: r.ttl,
        })
    }
}

impl From<&RemoteRecord> for ApiRecord {
    fn from(r: &RemoteRecord) -> Self {
        ApiRecord {
            id: Some(r.id),
            record_type: r.record_type.to_owned(),
            host: r.host.to_owned(),
            data: r.data.to_owned(),
            ttl: r.ttl,
            domain: r.domain.to_owned(),
        }
    }
}

impl ApiRecord {
    pub fn from_new(domain: &str, r: &NewRecord) -> Self {
        ApiRecord {
            id: None,
            record_type: r.record_type.to_owned(),
            host: r.host.to_owned(),
            data: r.data.to_owned(),
            ttl: r.ttl,
            domain: domain.to_owned(),
        }
    }
}
