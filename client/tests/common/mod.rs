#![allow(dead_code)]

use client::UploadCandidate;
use image::{GrayImage, ImageFormat, Luma};
use shared::{Diagnosis, PredictionResult};
use std::io::Cursor;

/// PNG of random gray pixels; noise keeps the encoded size close to
/// `width * height` bytes.
pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |_, _| Luma([rand::random::<u8>()]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode test png");
    buf
}

pub fn png_candidate(name: &str, width: u32, height: u32) -> UploadCandidate {
    UploadCandidate::new(name, "image/png", noise_png(width, height))
}

pub fn prediction(diagnosis: Diagnosis, confidence: f64) -> PredictionResult {
    PredictionResult {
        prediction: diagnosis,
        confidence,
        raw_score: confidence,
        disclaimer: "This prediction is for educational/research purposes only.".into(),
        validation_warning: None,
        validation_confidence: None,
    }
}
