#![cfg_attr(test, allow(dead_code))]

use std::time::Duration;

use http::StatusCode;
use log::trace;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    config::Ttl,
    provider::{ProviderError, RecordId},
};

/// A record as exchanged with the Simply.com API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub host: String,
    pub data: String,
    #[serde(default)]
    pub ttl: Ttl,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiDomain {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ListDomainsResponse {
    #[serde(default)]
    domains: Vec<ApiDomain>,
}

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    #[serde(default)]
    records: Vec<ApiRecord>,
}

#[derive(Debug, Serialize)]
struct DeleteRecordRequest<'a> {
    id: RecordId,
    domain: &'a str,
}

/// Internal wrapper around the Simply.com REST API. Takes care of authentication and error mapping
pub struct SimplyApi {
    client: Client,
    base_url: String,
    account_name: String,
    api_key: String,
}

impl SimplyApi {
    pub fn try_new(
        base_url: &str,
        account_name: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<SimplyApi, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Internal(e.to_string()))?;
        Ok(SimplyApi {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            account_name: account_name.to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.account_name, Some(&self.api_key))
    }

    // Send a request and map any non-2xx answer to the matching ProviderError
    fn send(&self, req: RequestBuilder) -> Result<Response, ProviderError> {
        let resp = req.send()?;
        let status = resp.status();
        trace!("Simply API responded with {}", status);
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().unwrap_or_default();
        let msg = format!("[{}] {}", status, body.trim());
        Err(match status {
            StatusCode::NOT_FOUND => ProviderError::NotFound(msg),
            s if s.is_client_error() => ProviderError::Rejected(msg),
            _ => ProviderError::Unavailable(msg),
        })
    }

    fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ProviderError> {
        Ok(self.send(req)?.json::<T>()?)
    }

    pub fn list_domains(&self) -> Result<Vec<ApiDomain>, ProviderError> {
        let resp: ListDomainsResponse = self.send_json(self.get("/2/domains"))?;
        Ok(resp.domains)
    }

    pub fn list_records(&self, domain: &str) -> Result<Vec<ApiRecord>, ProviderError> {
        let resp: ListRecordsResponse =
            self.send_json(self.get("/2/records").query(&[("domain", domain)]))?;
        Ok(resp.records)
    }

    pub fn add_record(&self, record: &ApiRecord) -> Result<(), ProviderError> {
        self.send(self.post("/2/record_add").json(record))?;
        Ok(())
    }

    pub fn update_record(&self, record: &ApiRecord) -> Result<(), ProviderError> {
        self.send(self.post("/2/record_update").json(record))?;
        Ok(())
    }

    pub fn delete_record(&self, domain: &str, id: RecordId) -> Result<(), ProviderError> {
        self.send(
            self.post("/2/record_delete")
                .json(&DeleteRecordRequest { id, domain }),
        )?;
        Ok(())
    }
}

#[cfg(test)]
use mockall::mock;

#[cfg(test)]
mock! {
    pub SimplyApi {
        pub fn try_new(
            base_url: &str,
            account_name: &str,
            api_key: &str,
            timeout: Duration,
        ) -> Result<Self, ProviderError>;
        pub fn list_domains(&self) -> Result<Vec<ApiDomain>, ProviderError>;
        pub fn list_records(&self, domain: &str) -> Result<Vec<ApiRecord>, ProviderError>;
        pub fn add_record(&self, record: &ApiRecord) -> Result<(), ProviderError>;
        pub fn update_record(&self, record: &ApiRecord) -> Result<(), ProviderError>;
        pub fn delete_record(&self, domain: &str, id: RecordId) -> Result<(), ProviderError>;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{basic_auth, body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    // The blocking client must not be created or used on an async worker thread
    async fn blocking<F, T>(f: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f).await.unwrap()
    }

    fn api(uri: &str) -> SimplyApi {
        SimplyApi::try_new(uri, "S123456", "secret", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_list_domains_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/domains"))
            .and(basic_auth("S123456", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "domains": [{"name": "example.com"}, {"name": "example.org", "extra": true}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let domains = blocking(move || api(&uri).list_domains()).await.unwrap();
        assert_eq!(
            domains,
            vec![
                ApiDomain {
                    name: "example.com".to_owned()
                },
                ApiDomain {
                    name: "example.org".to_owned()
                }
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_list_records_of_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/records"))
            .and(query_param("domain", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    {"id": 1, "type": "A", "host": "@", "data": "1.2.3.4", "ttl": 3600},
                    {"id": 2, "type": "MX", "host": "", "data": "mail.example.com", "ttl": 300, "priority": 10}
                ]
            })))
            .mount(&server)
            .await;

        let uri = server.uri();
        let records = blocking(move || api(&uri).list_records("example.com"))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, Some(1));
        assert_eq!(records[1].record_type, "MX");
        assert_eq!(records[1].host, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_post_record_changes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/record_add"))
            .and(body_json(json!({
                "type": "A", "host": "www", "data": "1.2.3.4", "ttl": 300, "domain": "example.com"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/record_update"))
            .and(body_json(json!({
                "id": 7, "type": "A", "host": "www", "data": "4.3.2.1", "ttl": 300, "domain": "example.com"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/record_delete"))
            .and(body_json(json!({"id": 7, "domain": "example.com"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        blocking(move || {
            let api = api(&uri);
            let mut rec = ApiRecord {
                id: None,
                record_type: "A".to_owned(),
                host: "www".to_owned(),
                data: "1.2.3.4".to_owned(),
                ttl: 300,
                domain: "example.com".to_owned(),
            };
            api.add_record(&rec)?;
            rec.id = Some(7);
            rec.data = "4.3.2.1".to_owned();
            api.update_record(&rec)?;
            api.delete_record("example.com", 7)
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_map_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(path("/2/record_delete"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such record"))
            .mount(&server)
            .await;
        Mock::given(path("/2/record_add"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid data"))
            .mount(&server)
            .await;
        Mock::given(path("/2/domains"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/2/records"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let uri = server.uri();
        let (delete, add, domains, records) = blocking(move || {
            let api = api(&uri);
            let rec = ApiRecord {
                id: None,
                record_type: "A".to_owned(),
                host: "@".to_owned(),
                data: "bogus".to_owned(),
                ttl: 0,
                domain: "example.com".to_owned(),
            };
            (
                api.delete_record("example.com", 1),
                api.add_record(&rec),
                api.list_domains(),
                api.list_records("example.com"),
            )
        })
        .await;

        assert_eq!(
            delete,
            Err(ProviderError::NotFound(
                "[404 Not Found] no such record".to_owned()
            ))
        );
        assert_eq!(
            add,
            Err(ProviderError::Rejected(
                "[400 Bad Request] invalid data".to_owned()
            ))
        );
        assert!(matches!(domains, Err(ProviderError::Unavailable(_))));
        assert!(matches!(records, Err(ProviderError::Internal(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn should_report_unreachable_api_as_unavailable() {
        let res = blocking(|| api("http://127.0.0.1:1").list_domains()).await;
        assert!(matches!(res, Err(ProviderError::Unavailable(_))));
    }
}
