use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::state::AppState;

/// Opaque price/yield prediction collaborator: a feature vector in, two
/// scalars out. The model behind it is not this crate's concern.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: [f64; 3]) -> (f64, f64);
}

/// Standard-scaler parameters plus two linear heads, loaded from a JSON
/// sidecar exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub mean: [f64; 3],
    pub scale: [f64; 3],
    pub price_weights: [f64; 3],
    pub price_bias: f64,
    pub yield_weights: [f64; 3],
    pub yield_bias: f64,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            mean: [0.0; 3],
            scale: [1.0; 3],
            price_weights: [0.0; 3],
            price_bias: 0.0,
            yield_weights: [0.0; 3],
            yield_bias: 0.0,
        }
    }
}

impl LinearModel {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load the sidecar, falling back to a flat model when it is missing or
    /// unreadable so the rest of the app still comes up.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(model) => model,
            Err(e) => {
                warn!(error = %e, path = %path, "model file unavailable; using flat model");
                Self::default()
            }
        }
    }

    fn scaled(&self, features: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for i in 0..3 {
            out[i] = (features[i] - self.mean[i]) / self.scale[i];
        }
        out
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: [f64; 3]) -> (f64, f64) {
        let x = self.scaled(features);
        let dot = |w: &[f64; 3], b: f64| w.iter().zip(x.iter()).map(|(w, x)| w * x).sum::<f64>() + b;
        (
            dot(&self.price_weights, self.price_bias),
            dot(&self.yield_weights, self.yield_bias),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub temperature: f64,
    pub rainfall: f64,
    #[serde(rename = "yield")]
    pub crop_yield: f64,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_price: f64,
    pub predicted_yield: f64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[instrument(skip(state, body))]
async fn predict(
    State(state): State<AppState>,
    Json(body): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, (StatusCode, String)> {
    let features = [body.temperature, body.rainfall, body.crop_yield];
    if features.iter().any(|f| !f.is_finite()) {
        return Err((StatusCode::BAD_REQUEST, "inputs must be finite".into()));
    }

    let (price, crop_yield) = state.predictor.predict(features);
    Ok(Json(PredictResponse {
        predicted_price: round2(price),
        predicted_yield: round2(crop_yield),
    }))
}
