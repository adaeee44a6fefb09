use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use research_core::{Event, JobRecord};
use research_logging::research_warn;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::transport::parse_ndjson;
use crate::{ApiError, JobTicket, TransportError};

pub type ByteStream = BoxStream<'static, Result<bytes::Bytes, TransportError>>;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applies to plain requests; the live stream only has the connect timeout.
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// REST boundary of the research backend.
#[async_trait::async_trait]
pub trait ResearchApi: Send + Sync {
    async fn create_job(&self, query: &str) -> Result<JobTicket, ApiError>;

    async fn job(&self, job_id: &str) -> Result<JobRecord, ApiError>;

    async fn list_jobs(&self) -> Result<Vec<JobRecord>, ApiError>;

    /// Full stored log of a finished job.
    async fn job_events(&self, job_id: &str) -> Result<Vec<Event>, ApiError>;

    /// Live NDJSON byte stream of a running job.
    async fn open_stream(&self, job_id: &str) -> Result<ByteStream, ApiError>;

    async fn send_remark(&self, job_id: &str, text: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    base: Url,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobList {
    Bare(Vec<JobRecord>),
    Wrapped { jobs: Vec<JobRecord> },
}

impl ReqwestApi {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.base_url.clone()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            base,
            client,
            stream_client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> Result<bytes::Bytes, ApiError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let response = check_status(response)?;
        response.bytes().await.map_err(map_reqwest_error)
    }
}

#[async_trait::async_trait]
impl ResearchApi for ReqwestApi {
    async fn create_job(&self, query: &str) -> Result<JobTicket, ApiError> {
        let url = self.endpoint(&["jobs"])?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = check_status(response)?
            .bytes()
            .await
            .map_err(map_reqwest_error)?;
        let value: Value =
            serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))?;
        ticket_from(&value).ok_or_else(|| ApiError::Decode("response has no job id".to_string()))
    }

    async fn job(&self, job_id: &str) -> Result<JobRecord, ApiError> {
        let body = self.get_bytes(self.endpoint(&["jobs", job_id])?).await?;
        serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>, ApiError> {
        let body = self.get_bytes(self.endpoint(&["jobs"])?).await?;
        match serde_json::from_slice(&body) {
            Ok(JobList::Bare(jobs)) | Ok(JobList::Wrapped { jobs }) => Ok(jobs),
            Err(err) => Err(ApiError::Decode(err.to_string())),
        }
    }

    async fn job_events(&self, job_id: &str) -> Result<Vec<Event>, ApiError> {
        let body = self
            .get_bytes(self.endpoint(&["jobs", job_id, "events"])?)
            .await?;
        decode_event_body(&body)
    }

    async fn open_stream(&self, job_id: &str) -> Result<ByteStream, ApiError> {
        let url = self.endpoint(&["jobs", job_id, "stream"])?;
        let response = self
            .stream_client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response)?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| TransportError::Io(err.to_string())))
            .boxed())
    }

    async fn send_remark(&self, job_id: &str, text: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["jobs", job_id, "remarks"])?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).map(|_| ())
    }
}

/// Stored logs come back either as NDJSON or as a JSON array of events.
pub fn decode_event_body(body: &[u8]) -> Result<Vec<Event>, ApiError> {
    let starts_with_array = body
        .iter()
        .find(|byte| !byte.is_ascii_whitespace())
        .is_some_and(|byte| *byte == b'[');
    if !starts_with_array {
        return Ok(parse_ndjson(body));
    }
    let values: Vec<Value> =
        serde_json::from_slice(body).map_err(|err| ApiError::Decode(err.to_string()))?;
    Ok(values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Event>(value) {
            Ok(event) => Some(event),
            Err(err) => {
                research_warn!("skipping stored event: {}", err);
                None
            }
        })
        .collect())
}

fn ticket_from(value: &Value) -> Option<JobTicket> {
    let id = ["id", "job_id", "jobId"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|id| match id {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })?;
    let created_at = ["created_at", "createdAt"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|created| created.as_str().map(ToOwned::to_owned));
    Some(JobTicket {
        job_id: id,
        created_at,
    })
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::HttpStatus {
            status: status.as_u16(),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_event_body, ticket_from, ApiSettings, ReqwestApi};

    #[test]
    fn endpoints_append_to_base_path() {
        let api = ReqwestApi::new(&ApiSettings {
            base_url: "http://localhost:9000/api/".to_string(),
            ..ApiSettings::default()
        })
        .unwrap();
        let url = api.endpoint(&["jobs", "a b", "stream"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/jobs/a%20b/stream");
    }

    #[test]
    fn ticket_accepts_numeric_ids() {
        let ticket = ticket_from(&json!({ "job_id": 12, "createdAt": "2024-01-01" })).unwrap();
        assert_eq!(ticket.job_id, "12");
        assert_eq!(ticket.created_at.as_deref(), Some("2024-01-01"));
        assert!(ticket_from(&json!({ "status": "ok" })).is_none());
    }

    #[test]
    fn stored_array_skips_bad_entries() {
        let body = br#" [{"type":"log","payload":"a"},{"payload":"no type"},{"type":"status"}]"#;
        let events = decode_event_body(body).unwrap();
        assert_eq!(events.len(), 2);
    }
}
