use anyhow::{Context, Result};
use serde::Deserialize;

use super::{NewRecord, Record, RecordStore};
use crate::http::{describe_http_error, http_agent};

pub struct HttpRecordStore {
    agent: ureq::Agent,
    base_url: String,
}

#[derive(Deserialize)]
struct Documents {
    documents: Vec<Record>,
}

impl HttpRecordStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            agent: http_agent(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }
}

impl RecordStore for HttpRecordStore {
    fn all_records(&self) -> Result<Vec<Record>> {
        let mut response = self
            .agent
            .get(&self.url("select-all-system"))
            .call()
            .map_err(|e| describe_http_error(e, "record store"))?;

        let docs: Documents = response
            .body_mut()
            .read_json()
            .context("parsing record store documents")?;
        log::debug!("fetched {} records", docs.documents.len());
        Ok(docs.documents)
    }

    fn register(&self, record: &NewRecord) -> Result<Record> {
        let mut response = self
            .agent
            .post(&self.url("register-system"))
            .send_json(record)
            .map_err(|e| describe_http_error(e, "record store"))?;

        let stored: Record = response
            .body_mut()
            .read_json()
            .context("parsing registered record")?;
        log::info!("registered {} as {}", stored.system_name, stored.id);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let store = HttpRecordStore::new("https://records.example.net/api/", 5);
        assert_eq!(
            store.url("select-all-system"),
            "https://records.example.net/api/select-all-system"
        );
    }

    #[test]
    fn documents_envelope_parses() {
        let docs: Documents = serde_json::from_str(
            r#"{"documents":[{"id":"1","system_name":"x","description":"y","cloud_provider":"Azure",
                "cloud_services":["AKS"],"team":{"primary":"t"},"repository":{"application":"r"},
                "created_at":"2024-05-01T10:00:00Z","updated_at":"2024-06-01T10:00:00Z",
                "type":"system_architecture"}]}"#,
        )
        .unwrap();
        assert_eq!(docs.documents.len(), 1);
        assert!(docs.documents[0].updated_at.is_some());
    }
}
