use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::embed::Embedding;
use crate::error::ValidationError;

pub const RECORD_TYPE: &str = "system_architecture";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudProvider {
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "Azure")]
    Azure,
    #[serde(rename = "GCP")]
    Gcp,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 3] = [CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp];

    pub fn as_str(self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Azure => "Azure",
            CloudProvider::Gcp => "GCP",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CloudProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownProvider(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub primary: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub application: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// A registered system architecture, as returned by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub system_name: String,
    /// The field embedded for similarity search.
    pub description: String,
    pub cloud_provider: CloudProvider,
    pub cloud_services: Vec<String>,
    pub team: Team,
    pub repository: Repository,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "type", default = "default_record_type")]
    pub kind: String,
}

fn default_record_type() -> String {
    RECORD_TYPE.to_string()
}

/// A record annotated with its similarity to a query, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: Record,
    pub similarity: f64,
}

/// Registration payload sent to the record store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRecord {
    pub system_name: String,
    pub description: String,
    pub description_vector: Embedding,
    pub cloud_provider: CloudProvider,
    pub cloud_services: Vec<String>,
    pub team: Team,
    pub repository: Repository,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Unvalidated registration input, from CLI flags or a JSON file.
/// `cloud_services` accepts either a list or one comma-separated string.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RecordDraft {
    pub system_name: Option<String>,
    pub description: Option<String>,
    pub cloud_provider: Option<String>,
    #[serde(default)]
    pub cloud_services: Services,
    pub team: Option<String>,
    pub repository: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Services {
    List(Vec<String>),
    Csv(String),
}

impl Default for Services {
    fn default() -> Self {
        Services::List(Vec::new())
    }
}

impl Services {
    fn normalized(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Services::List(items) => items.iter().map(String::as_str).collect(),
            Services::Csv(csv) => csv.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A draft that passed validation; only its embedding is still missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    pub system_name: String,
    pub description: String,
    pub cloud_provider: CloudProvider,
    pub cloud_services: Vec<String>,
    pub team: String,
    pub repository: String,
}

impl RecordDraft {
    pub fn validate(&self) -> Result<ValidDraft, ValidationError> {
        let system_name = required(&self.system_name, "system_name")?;
        let description = required(&self.description, "description")?;
        let provider = required(&self.cloud_provider, "cloud_provider")?;
        let team = required(&self.team, "team")?;
        let repository = required(&self.repository, "repository")?;

        let cloud_provider = provider.parse()?;
        let cloud_services = self.cloud_services.normalized();
        if cloud_services.is_empty() {
            return Err(ValidationError::EmptyServices);
        }

        Ok(ValidDraft {
            system_name,
            description,
            cloud_provider,
            cloud_services,
            team,
            repository,
        })
    }
}

impl ValidDraft {
    pub fn into_new_record(self, description_vector: Embedding) -> NewRecord {
        NewRecord {
            system_name: self.system_name,
            description: self.description,
            description_vector,
            cloud_provider: self.cloud_provider,
            cloud_services: self.cloud_services,
            team: Team {
                primary: self.team,
                extra: BTreeMap::new(),
            },
            repository: Repository {
                application: self.repository,
                extra: BTreeMap::new(),
            },
            kind: RECORD_TYPE,
        }
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RecordDraft {
        RecordDraft {
            system_name: Some("Order Hub".into()),
            description: Some("order management system on AWS".into()),
            cloud_provider: Some("AWS".into()),
            cloud_services: Services::Csv("EC2, S3 ,, Lambda".into()),
            team: Some("platform".into()),
            repository: Some("https://github.com/org/order-hub".into()),
        }
    }

    #[test]
    fn parses_store_document() {
        let json = r#"{
            "id": "1",
            "system_name": "Order Hub",
            "description": "order management system on AWS",
            "cloud_provider": "AWS",
            "cloud_services": ["EC2", "S3"],
            "team": {"primary": "platform", "secondary": "sre"},
            "repository": {"application": "https://github.com/org/order-hub"},
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": null
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.cloud_provider, CloudProvider::Aws);
        assert_eq!(record.team.primary, "platform");
        assert_eq!(record.team.extra.get("secondary").map(String::as_str), Some("sre"));
        assert_eq!(record.kind, RECORD_TYPE);
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn unknown_provider_in_document_is_rejected() {
        let json = r#"{"id":"1","system_name":"x","description":"y","cloud_provider":"IBM",
            "cloud_services":["a"],"team":{"primary":"t"},"repository":{"application":"r"},
            "created_at":"2024-05-01T10:00:00Z"}"#;
        assert!(serde_json::from_str::<Record>(json).is_err());
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("Azure".parse::<CloudProvider>().unwrap(), CloudProvider::Azure);
        assert_eq!(
            "aws".parse::<CloudProvider>().unwrap_err(),
            ValidationError::UnknownProvider("aws".into())
        );
    }

    #[test]
    fn valid_draft_normalizes_services() {
        let valid = draft().validate().unwrap();
        assert_eq!(valid.cloud_services, vec!["EC2", "S3", "Lambda"]);
        assert_eq!(valid.cloud_provider, CloudProvider::Aws);
    }

    #[test]
    fn missing_fields_are_named() {
        let mut d = draft();
        d.description = Some("   ".into());
        assert_eq!(d.validate().unwrap_err(), ValidationError::MissingField("description"));

        let mut d = draft();
        d.team = None;
        assert_eq!(d.validate().unwrap_err(), ValidationError::MissingField("team"));
    }

    #[test]
    fn empty_services_are_rejected() {
        let mut d = draft();
        d.cloud_services = Services::Csv(" , ".into());
        assert_eq!(d.validate().unwrap_err(), ValidationError::EmptyServices);
    }

    #[test]
    fn draft_accepts_service_list_from_json() {
        let d: RecordDraft = serde_json::from_str(
            r#"{"system_name":"a","description":"b","cloud_provider":"GCP",
                "cloud_services":["GKE","Pub/Sub"],"team":"t","repository":"r"}"#,
        )
        .unwrap();
        assert_eq!(d.validate().unwrap().cloud_services, vec!["GKE", "Pub/Sub"]);
    }

    #[test]
    fn new_record_payload_shape() {
        let payload = draft().validate().unwrap().into_new_record(vec![0.25, 0.5]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["team"]["primary"], "platform");
        assert_eq!(json["repository"]["application"], "https://github.com/org/order-hub");
        assert_eq!(json["description_vector"][1], 0.5);
        assert_eq!(json["type"], RECORD_TYPE);
    }

    #[test]
    fn scored_record_flattens_into_one_object() {
        let record: Record = serde_json::from_str(
            r#"{"id":"7","system_name":"x","description":"y","cloud_provider":"GCP",
                "cloud_services":["GKE"],"team":{"primary":"t"},"repository":{"application":"r"},
                "created_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        let scored = ScoredRecord {
            record,
            similarity: 87.5,
        };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["similarity"], 87.5);
    }
}
