use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ClassRoster, Student};
use crate::repository::{RepositoryError, RosterRepository};

pub struct HttpRosterRepository {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    #[serde(rename = "sheetId")]
    sheet_id: &'a str,
    students: &'a [Student],
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SaveAck {
    status: Option<String>,
    message: Option<String>,
}

impl HttpRosterRepository {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RepositoryError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn cache_busted_url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}t={}",
            self.endpoint,
            separator,
            Utc::now().timestamp_millis()
        )
    }

    async fn try_load_all(&self) -> Result<Vec<ClassRoster>, RepositoryError> {
        let url = self.cache_busted_url();
        log::debug!("[STORE] fetching rosters from {}", self.endpoint);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepositoryError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response.text().await?;
        decode_rosters(&body)
    }

    async fn try_save_roster(
        &self,
        class_id: &str,
        students: &[Student],
    ) -> Result<(), RepositoryError> {
        let body = serde_json::to_string(&SaveRequest {
            sheet_id: class_id,
            students,
        })?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await?;

        let text = response.text().await?;
        decode_save_ack(&text)
    }
}

#[async_trait]
impl RosterRepository for HttpRosterRepository {
    async fn load_all(&self) -> Vec<ClassRoster> {
        match self.try_load_all().await {
            Ok(classes) => {
                log::info!(
                    "[STORE] received classes: {}",
                    classes
                        .iter()
                        .map(|c| c.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                classes
            }
            Err(err) => {
                log::error!("[STORE] failed to fetch rosters: {err}");
                Vec::new()
            }
        }
    }

    async fn save_roster(&self, class_id: &str, students: &[Student]) -> bool {
        match self.try_save_roster(class_id, students).await {
            Ok(()) => {
                log::info!("[STORE] saved class:{} students:{}", class_id, students.len());
                true
            }
            Err(err) => {
                log::error!("[STORE] failed to save class:{class_id}: {err}");
                false
            }
        }
    }
}

pub fn decode_rosters(body: &str) -> Result<Vec<ClassRoster>, RepositoryError> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_array() {
        return Err(RepositoryError::Payload(format!(
            "expected an array of classes, got {}",
            json_kind(&value)
        )));
    }

    let classes: Vec<ClassRoster> = serde_json::from_value(value)?;
    Ok(classes.into_iter().map(ClassRoster::sanitized).collect())
}

/// Only an explicit `"status": "success"` counts as a saved roster.
pub fn decode_save_ack(body: &str) -> Result<(), RepositoryError> {
    let ack: SaveAck = serde_json::from_str(body)?;
    match ack.status.as_deref() {
        Some("success") => Ok(()),
        other => Err(RepositoryError::Rejected(
            ack.message
                .or_else(|| other.map(str::to_string))
                .unwrap_or_else(|| "no status in response".to_string()),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
