use derive_more::Display;
use serde::de::{Error as _, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

/// Error tag the prediction service uses when the upload is not a chest X-ray.
pub const INVALID_IMAGE_TYPE: &str = "Invalid Image Type";

/// Multipart field the prediction service reads the image from.
pub const UPLOAD_FIELD: &str = "file";

pub const PREDICT_PATH: &str = "/api/predict";
pub const MODEL_INFO_PATH: &str = "/api/model/info";
pub const HEALTH_PATH: &str = "/health";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, StrumDisplay, EnumString)]
pub enum Diagnosis {
    Normal,
    Pneumonia,
}

/// Body of a successful `POST /api/predict`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResult {
    pub prediction: Diagnosis,
    #[serde(deserialize_with = "unit_interval")]
    pub confidence: f64,
    pub raw_score: f64,
    pub disclaimer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_warning: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub validation_confidence: Option<u8>,
}

fn unit_interval<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(D::Error::custom(format!("confidence {} is outside [0, 1]", value)))
    }
}

/// Fractional percentages are rounded and non-numeric values dropped, so a
/// sloppy notice never costs the prediction itself. Numbers outside 0..=100
/// are still an error.
fn lenient_percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Other(IgnoredAny),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => {
            let rounded = value.round();
            if (0.0..=100.0).contains(&rounded) {
                Ok(Some(rounded as u8))
            } else {
                Err(D::Error::custom(format!(
                    "validation_confidence {} is outside 0..=100",
                    value
                )))
            }
        }
        Some(Raw::Other(_)) | None => Ok(None),
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display)]
#[display(fmt = "{}: {}", error, message)]
pub struct ErrorDetail {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorDetail {
    pub fn is_invalid_image_type(&self) -> bool {
        self.error == INVALID_IMAGE_TYPE
    }
}

/// Non-2xx body. The service nests the detail under `detail` for rejected
/// uploads but answers its own 404/413/500 handlers with the flat shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum ErrorEnvelope {
    Nested { detail: ErrorDetail },
    Flat(ErrorDetail),
}

impl ErrorEnvelope {
    pub fn into_detail(self) -> ErrorDetail {
        match self {
            ErrorEnvelope::Nested { detail } => detail,
            ErrorEnvelope::Flat(detail) => detail,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelInfo {
    pub model_type: String,
    pub framework: String,
    pub input_size: [u32; 2],
    pub classes: Vec<String>,
    pub accuracy: String,
    pub threshold: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_loaded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn prediction_without_validation_fields() {
        let body = r#"{"prediction":"Pneumonia","confidence":0.9312,"raw_score":0.9312,"disclaimer":"Educational use only."}"#;
        let parsed: PredictionResult = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.prediction, Diagnosis::Pneumonia);
        assert_eq!(parsed.validation_warning, None);
        assert_eq!(parsed.validation_confidence, None);
    }

    #[test]
    fn prediction_with_validation_fields() {
        let body = r#"{"prediction":"Normal","confidence":0.81,"raw_score":0.19,"disclaimer":"d",
            "validation_warning":"Image validation passed, but confidence is moderate.","validation_confidence":60}"#;
        let parsed: PredictionResult = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.prediction, Diagnosis::Normal);
        assert_eq!(parsed.validation_confidence, Some(60));
    }

    #[test]
    fn confidence_outside_unit_interval_is_rejected() {
        for confidence in ["1.7", "-0.01"] {
            let body = format!(
                r#"{{"prediction":"Normal","confidence":{},"raw_score":0.5,"disclaimer":"d"}}"#,
                confidence
            );
            assert!(serde_json::from_str::<PredictionResult>(&body).is_err(), "{}", confidence);
        }
    }

    #[test]
    fn validation_confidence_above_hundred_is_rejected() {
        let body = r#"{"prediction":"Normal","confidence":0.81,"raw_score":0.19,"disclaimer":"d","validation_confidence":101}"#;
        assert!(serde_json::from_str::<PredictionResult>(body).is_err());
    }

    #[test]
    fn sloppy_validation_confidence_keeps_the_prediction() {
        let fractional = r#"{"prediction":"Pneumonia","confidence":0.93,"raw_score":0.93,"disclaimer":"d",
            "validation_warning":"Low contrast.","validation_confidence":72.5}"#;
        let parsed: PredictionResult = serde_json::from_str(fractional).unwrap();
        assert_eq!(parsed.prediction, Diagnosis::Pneumonia);
        assert_eq!(parsed.validation_confidence, Some(73));

        let textual = r#"{"prediction":"Normal","confidence":0.8,"raw_score":0.2,"disclaimer":"d",
            "validation_warning":"Low contrast.","validation_confidence":"medium"}"#;
        let parsed: PredictionResult = serde_json::from_str(textual).unwrap();
        assert_eq!(parsed.validation_confidence, None);
        assert_eq!(parsed.validation_warning.as_deref(), Some("Low contrast."));

        let null = r#"{"prediction":"Normal","confidence":0.8,"raw_score":0.2,"disclaimer":"d","validation_confidence":null}"#;
        assert_eq!(serde_json::from_str::<PredictionResult>(null).unwrap().validation_confidence, None);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let body = r#"{"prediction":"Covid","confidence":0.5,"raw_score":0.5,"disclaimer":"d"}"#;
        assert!(serde_json::from_str::<PredictionResult>(body).is_err());
    }

    #[test]
    fn both_envelope_shapes_yield_the_same_detail() {
        let nested = r#"{"detail":{"error":"Invalid Image Type","message":"Not an X-ray.","suggestion":"Upload a chest X-ray."}}"#;
        let flat = r#"{"error":"Invalid Image Type","message":"Not an X-ray.","suggestion":"Upload a chest X-ray."}"#;
        let a = serde_json::from_str::<ErrorEnvelope>(nested).unwrap().into_detail();
        let b = serde_json::from_str::<ErrorEnvelope>(flat).unwrap().into_detail();
        assert_eq!(a, b);
        assert!(a.is_invalid_image_type());
    }

    #[test]
    fn envelope_without_message_does_not_parse() {
        assert!(serde_json::from_str::<ErrorEnvelope>(r#"{"detail":"boom"}"#).is_err());
        assert!(serde_json::from_str::<ErrorEnvelope>(r#"{"error":"Internal server error"}"#).is_err());
    }

    #[test]
    fn diagnosis_round_trips_through_strings() {
        assert_eq!(Diagnosis::from_str("Normal").unwrap(), Diagnosis::Normal);
        assert_eq!(Diagnosis::Pneumonia.to_string(), "Pneumonia");
    }

    #[test]
    fn unhealthy_body_still_decodes() {
        let body = r#"{"status":"unhealthy","error":"model file missing"}"#;
        let parsed: HealthStatus = serde_json::from_str(body).unwrap();
        assert!(!parsed.is_healthy());
        assert_eq!(parsed.error.as_deref(), Some("model file missing"));
    }
}
