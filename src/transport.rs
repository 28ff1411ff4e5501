//! Prediction service client.
//!
//! `PredictionService` is the seam between the controller runtime and the
//! network; `HttpPredictionService` is the real implementation.

use anyhow::{anyhow, Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::Read;
use std::time::Duration;
use url::Url;

use crate::intake::SelectedFile;
use crate::response::{DetectionResult, ServiceGreeting};
use crate::threshold::Threshold;

pub const PREDICT_PATH: &str = "predict/json/";
pub const THRESHOLD_PARAM: &str = "score_threshold";

/// How one prediction call ended.
#[derive(Clone, Debug, PartialEq)]
pub enum PredictionOutcome {
    /// 2xx with a parseable body.
    Completed(DetectionResult),
    /// Non-2xx response.
    ServerError {
        status: u16,
        status_text: String,
        body: Vec<u8>,
    },
    /// No usable response: connection failure, or an unreadable 2xx body.
    NetworkError(String),
}

pub trait PredictionService: Send + Sync {
    /// Sends one file. Never retries.
    fn predict(&self, file: &SelectedFile, threshold: Threshold) -> PredictionOutcome;
}

pub struct HttpPredictionService {
    agent: ureq::Agent,
    base: Url,
}

impl HttpPredictionService {
    /// `timeout` of `None` leaves the transport defaults in place.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base = Url::parse(endpoint).context("parse prediction endpoint")?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported endpoint scheme '{}'; expected http(s)",
                base.scheme()
            ));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            agent: builder.build(),
            base,
        })
    }

    /// Full request URL for a threshold.
    pub fn predict_url(&self, threshold: Threshold) -> Result<Url> {
        let mut url = self.base.join(PREDICT_PATH).context("build predict url")?;
        url.query_pairs_mut()
            .append_pair(THRESHOLD_PARAM, &threshold.formatted());
        Ok(url)
    }

    /// Calls `GET /` and returns the service greeting.
    pub fn greeting(&self) -> Result<ServiceGreeting> {
        let response = self
            .agent
            .get(self.base.as_str())
            .call()
            .with_context(|| format!("reach prediction service at {}", self.base))?;
        let body = read_body(response)?;
        serde_json::from_slice(&body).context("parse service greeting")
    }
}

impl PredictionService for HttpPredictionService {
    fn predict(&self, file: &SelectedFile, threshold: Threshold) -> PredictionOutcome {
        let url = match self.predict_url(threshold) {
            Ok(url) => url,
            Err(err) => return PredictionOutcome::NetworkError(format!("{:#}", err)),
        };
        let form = MultipartForm::with_file("file", file);
        log::info!(
            "POST {} ({} bytes, {})",
            url,
            file.size(),
            file.media_type()
        );

        let result = self
            .agent
            .post(url.as_str())
            .set("Content-Type", &form.content_type())
            .send_bytes(&form.body);

        match result {
            Ok(response) => {
                let status = response.status();
                match read_body(response).and_then(|body| DetectionResult::from_slice(&body)) {
                    Ok(result) => {
                        log::info!(
                            "prediction {} with {} detections",
                            status,
                            result.detections().len()
                        );
                        PredictionOutcome::Completed(result)
                    }
                    Err(err) => {
                        log::warn!("unreadable prediction response: {:#}", err);
                        PredictionOutcome::NetworkError(format!("{:#}", err))
                    }
                }
            }
            Err(ureq::Error::Status(status, response)) => {
                let status_text = response.status_text().to_string();
                let body = read_body(response).unwrap_or_default();
                log::warn!("prediction rejected: {} {}", status, status_text);
                PredictionOutcome::ServerError {
                    status,
                    status_text,
                    body,
                }
            }
            Err(ureq::Error::Transport(transport)) => {
                log::error!("prediction request failed: {}", transport);
                PredictionOutcome::NetworkError(transport.to_string())
            }
        }
    }
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read response body")?;
    Ok(bytes)
}

/// A `multipart/form-data` body with a single file part.
pub struct MultipartForm {
    boundary: String,
    pub body: Vec<u8>,
}

impl MultipartForm {
    pub fn with_file(field: &str, file: &SelectedFile) -> Self {
        let boundary = format!(
            "----detection-console-{}",
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(24)
                .map(char::from)
                .collect::<String>()
        );
        let mut body = Vec::with_capacity(file.bytes().len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field,
                escape_quoted(file.name())
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.media_type()).as_bytes());
        body.extend_from_slice(file.bytes());
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Self { boundary, body }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' => "%22".to_string(),
            '\r' | '\n' => " ".to_string(),
            c => c.to_string(),
        })
        .collect()
}
