use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use shared::{
    ErrorDetail, ErrorEnvelope, HEALTH_PATH, HealthStatus, MODEL_INFO_PATH, ModelInfo,
    PREDICT_PATH, PredictionResult, UPLOAD_FIELD,
};
use std::future::Future;
use url::Url;

use crate::config::{Config, ConfigError};
use crate::validator::UploadCandidate;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {message}")]
    Network { message: String },
    #[error("Server error {status}: {detail}")]
    ServerStructured { status: u16, detail: ErrorDetail },
    #[error("Server error {status}")]
    ServerUnstructured { status: u16 },
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },
}

impl TransportError {
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            TransportError::ServerStructured { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::MalformedResponse {
                reason: err.to_string(),
            }
        } else {
            TransportError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Single-shot submission of a candidate to the prediction service.
pub trait Transport: Send + Sync {
    fn submit_for_prediction(
        &self,
        candidate: UploadCandidate,
    ) -> impl Future<Output = Result<PredictionResult, TransportError>> + Send;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    predict_url: Url,
    model_info_url: Url,
    health_url: Url,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            predict_url: config.endpoint(PREDICT_PATH)?,
            model_info_url: config.endpoint(MODEL_INFO_PATH)?,
            health_url: config.endpoint(HEALTH_PATH)?,
        })
    }

    pub async fn model_info(&self) -> Result<ModelInfo, TransportError> {
        let response = self.client.get(self.model_info_url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode_body(status, &body)
    }

    /// The service answers 503 with a status body when the model is not
    /// loaded, so any status that carries a health body is returned as-is.
    pub async fn health(&self) -> Result<HealthStatus, TransportError> {
        let response = self.client.get(self.health_url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        match serde_json::from_slice::<HealthStatus>(&body) {
            Ok(health) => Ok(health),
            Err(_) => decode_body(status, &body),
        }
    }
}

impl Transport for HttpTransport {
    async fn submit_for_prediction(
        &self,
        candidate: UploadCandidate,
    ) -> Result<PredictionResult, TransportError> {
        let part = Part::bytes(candidate.bytes.to_vec())
            .file_name(candidate.file_name.clone())
            .mime_str(candidate.upload_mime_type())?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        log::debug!("POST {} ({} bytes)", self.predict_url, candidate.byte_size());
        let response = self
            .client
            .post(self.predict_url.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        log::debug!("{} answered {}", self.predict_url, status);
        decode_body(status, &body)
    }
}

/// 2xx bodies must parse as `T`; anything else is read as an error envelope.
pub fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, TransportError> {
    if status.is_success() {
        return serde_json::from_slice(body).map_err(|e| TransportError::MalformedResponse {
            reason: e.to_string(),
        });
    }

    let error = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => TransportError::ServerStructured {
            status: status.as_u16(),
            detail: envelope.into_detail(),
        },
        Err(_) => TransportError::ServerUnstructured {
            status: status.as_u16(),
        },
    };
    log::warn!("prediction service rejected the request: {}", error);
    Err(error)
}
