//! Authenticated client for the clinical REST backend.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::DashboardConfig;
use crate::models::{AppointmentRecord, CaseRecord, FieldErrors, RawPatient, RecordId};

const PATIENTS_PATH: &[&str] = &["dashboard", "api", "patients"];
const CASES_PATH: &[&str] = &["dashboard", "api", "cases"];
const APPOINTMENTS_PATH: &[&str] = &["dashboard", "api", "appointments"];

/// Upper bound on `next` links followed for one collection.
const MAX_PAGES: usize = 500;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("not authorized by backend")]
    Unauthorized,

    #[error("resource not found")]
    NotFound,

    #[error("backend answered {status}")]
    Status { status: u16, body: Value },

    #[error("malformed backend payload: {0}")]
    Decode(String),

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// The remote collections the dashboard reads and writes.
#[async_trait]
pub trait ClinicBackend: Send + Sync {
    async fn list_patients(&self) -> Result<Vec<RawPatient>, BackendError>;

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, BackendError>;

    async fn update_patient(
        &self,
        id: &RecordId,
        fields: &Map<String, Value>,
    ) -> Result<RawPatient, BackendError>;

    async fn delete_patient(&self, id: &RecordId) -> Result<(), BackendError>;

    async fn list_appointments(
        &self,
        patient: &RecordId,
    ) -> Result<Vec<AppointmentRecord>, BackendError>;

    async fn update_appointment(
        &self,
        id: &RecordId,
        fields: &Map<String, Value>,
    ) -> Result<AppointmentRecord, BackendError>;
}

/// `reqwest`-backed implementation that attaches the configured bearer token.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &DashboardConfig<'_>) -> Result<Self, BackendError> {
        let base_url = Url::parse(config.api_base_url.trim())
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", config.api_base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(config.api_base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: config.api_token.as_ref().map(|t| t.to_string()),
        })
    }

    /// `{base}/{collection...}/[{id}/]` with every segment percent-encoded.
    pub(crate) fn endpoint(&self, collection: &[&str], id: Option<&RecordId>) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        let id = id.map(|id| id.to_string());
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(collection);
            if let Some(id) = &id {
                segments.push(id);
            }
            segments.push("");
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Read a collection that may come back bare or as a paginated envelope.
    async fn fetch_collection<T: DeserializeOwned>(
        &self,
        first_url: Url,
    ) -> Result<Vec<T>, BackendError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(BackendError::Decode(format!(
                    "collection exceeds {} pages",
                    MAX_PAGES
                )));
            }

            let response = self.request(Method::GET, url.clone()).send().await?;
            let body: Value = checked(response).await?.json().await?;
            let (page, next_link) = split_page(body)?;
            for item in page {
                items.push(serde_json::from_value(item).map_err(|e| BackendError::Decode(e.to_string()))?);
            }
            next = next_link
                .map(|link| follow_link(&self.base_url, &url, &link))
                .transpose()?;
        }

        Ok(items)
    }
}

#[async_trait]
impl ClinicBackend for HttpBackend {
    async fn list_patients(&self) -> Result<Vec<RawPatient>, BackendError> {
        self.fetch_collection(self.endpoint(PATIENTS_PATH, None)?).await
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, BackendError> {
        self.fetch_collection(self.endpoint(CASES_PATH, None)?).await
    }

    async fn update_patient(
        &self,
        id: &RecordId,
        fields: &Map<String, Value>,
    ) -> Result<RawPatient, BackendError> {
        let url = self.endpoint(PATIENTS_PATH, Some(id))?;
        let response = self.request(Method::PATCH, url).json(fields).send().await?;
        Ok(checked(response).await?.json().await?)
    }

    async fn delete_patient(&self, id: &RecordId) -> Result<(), BackendError> {
        let url = self.endpoint(PATIENTS_PATH, Some(id))?;
        let response = self.request(Method::DELETE, url).send().await?;
        checked(response).await?;
        Ok(())
    }

    async fn list_appointments(
        &self,
        patient: &RecordId,
    ) -> Result<Vec<AppointmentRecord>, BackendError> {
        let mut url = self.endpoint(APPOINTMENTS_PATH, None)?;
        url.query_pairs_mut()
            .append_pair("patient", &patient.to_string());
        self.fetch_collection(url).await
    }

    async fn update_appointment(
        &self,
        id: &RecordId,
        fields: &Map<String, Value>,
    ) -> Result<AppointmentRecord, BackendError> {
        let url = self.endpoint(APPOINTMENTS_PATH, Some(id))?;
        let response = self.request(Method::PATCH, url).json(fields).send().await?;
        Ok(checked(response).await?.json().await?)
    }
}

/// Resolve a `next` link against the page it came from. Links leaving the
/// backend's origin are refused so the bearer token never travels elsewhere.
pub(crate) fn follow_link(base: &Url, current: &Url, link: &str) -> Result<Url, BackendError> {
    let next = current
        .join(link)
        .map_err(|e| BackendError::Decode(format!("bad next link '{}': {}", link, e)))?;
    if next.origin() != base.origin() {
        return Err(BackendError::Decode(format!(
            "next link '{}' leaves the backend origin",
            link
        )));
    }
    Ok(next)
}

/// Pass 2xx responses through, classify everything else.
async fn checked(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    Err(classify(status, body))
}

pub(crate) fn classify(status: StatusCode, body: Value) -> BackendError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => match field_errors(&body) {
            Some(fields) => BackendError::Validation(fields),
            None => BackendError::Status {
                status: status.as_u16(),
                body,
            },
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound,
        _ => BackendError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

/// Read a `{field: [messages]}` or `{field: message}` body.
pub(crate) fn field_errors(body: &Value) -> Option<FieldErrors> {
    let object = body.as_object()?;
    let mut fields = FieldErrors::new();
    for (field, messages) in object {
        let messages = match messages {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            other => vec![other.to_string()],
        };
        fields.insert(field.clone(), messages);
    }
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

/// Split a list response into its items and the next page URL, if any.
pub(crate) fn split_page(body: Value) -> Result<(Vec<Value>, Option<String>), BackendError> {
    match body {
        Value::Array(items) => Ok((items, None)),
        Value::Object(mut envelope) => {
            let next = envelope
                .remove("next")
                .and_then(|v| v.as_str().map(str::to_string));
            match envelope.remove("results") {
                Some(Value::Array(items)) => Ok((items, next)),
                _ => Err(BackendError::Decode(
                    "expected an array or an object with `results`".to_string(),
                )),
            }
        }
        _ => Err(BackendError::Decode(
            "expected an array or an object with `results`".to_string(),
        )),
    }
}
