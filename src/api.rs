//! Prediction API handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::state::AppState;
use crate::types::{InfoResponse, PredictRequest, PredictionResponse};

const USAGE_HTML: &str = r#"<!doctype html>
<html>
<head><title>Iris Model Prediction API</title></head>
<body>
  <h1>Iris Model Prediction API</h1>
  <p>Send a POST request to <code>/predict</code> with a JSON body holding the four
  Iris measurements: sepal length, sepal width, petal length, petal width.</p>
  <h2>Example</h2>
  <pre>
curl -X POST http://localhost:5000/predict \
  -H "Content-Type: application/json" \
  -d '{"features": [5.1, 3.5, 1.4, 0.2]}'
  </pre>
  <h2>Endpoints</h2>
  <ul>
    <li><code>GET /</code>: this page</li>
    <li><code>POST /predict</code>: predicted class and per-class probabilities</li>
    <li><code>GET /info</code>: model type, estimator count, feature importances, classes</li>
    <li><code>GET /health</code>: liveness and uptime</li>
  </ul>
</body>
</html>
"#;

/// Usage instructions.
pub async fn home() -> Html<&'static str> {
    Html(USAGE_HTML)
}

/// Classify one feature vector.
///
/// The body is taken raw so that unparseable JSON gets the same 400 as a
/// missing `features` field instead of the extractor's own rejection.
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ServiceError> {
    let request_id = Uuid::new_v4();
    let start = Instant::now();

    let result = PredictRequest::from_slice(&body)
        .and_then(|request| request.features())
        .and_then(|features| state.engine.predict(&features));

    match result {
        Ok(prediction) => {
            let latency = start.elapsed();
            state
                .metrics
                .record_prediction(latency, &prediction.class_name);

            debug!(
                request_id = %request_id,
                class_id = prediction.class_id,
                class_name = %prediction.class_name,
                latency_us = latency.as_micros() as u64,
                "Prediction served"
            );

            Ok(Json(prediction.to_response()))
        }
        Err(err) => {
            state.metrics.record_error(err.kind());

            if err.is_client_error() {
                warn!(request_id = %request_id, kind = err.kind(), error = %err, "Rejected prediction request");
            } else {
                error!(request_id = %request_id, kind = err.kind(), error = %err, "Prediction failed");
            }

            Err(err)
        }
    }
}

/// Model attributes and label tables.
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(state.engine.info())
}
