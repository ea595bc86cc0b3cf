//! JSON prediction endpoints.
//!
//! Every response is HTTP 200. Failures are reported in-band as
//! `{"Error": "<message>"}`.

use crate::application::serving::service::PredictionService;
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ports::Predictor;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use axum::routing::post;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct Article {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ArticleRequest {
    article: Article,
}

#[derive(Debug, Deserialize)]
struct RelevanceRequest {
    article: Article,
    topic: String,
}

/// Maps a pipeline error to the client-facing payload.
///
/// Errors caused by the request keep their message; anything else is
/// logged and reported generically.
pub fn error_payload(err: &PipelineError) -> Value {
    if err.is_client_error() {
        json!({ "Error": err.to_string() })
    } else {
        error!("Prediction failed: {}", err);
        json!({ "Error": "Internal server error" })
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> PipelineResult<T> {
    serde_json::from_slice(body).map_err(|e| PipelineError::RequestValidation(e.to_string()))
}

fn respond<T>(result: PipelineResult<T>, render: impl FnOnce(T) -> Value) -> Json<Value> {
    Json(match result {
        Ok(value) => render(value),
        Err(e) => error_payload(&e),
    })
}

async fn predict_movement<M: Predictor + 'static>(
    State(service): State<Arc<PredictionService<M>>>,
    body: Bytes,
) -> Json<Value> {
    let result = match parse_body::<ArticleRequest>(&body) {
        Ok(request) => service.predict_movement(request.article.text).await,
        Err(e) => Err(e),
    };
    respond(result, |movement| json!({ "prediction": movement.as_str() }))
}

async fn predict_sentiment<M: Predictor + 'static>(
    State(service): State<Arc<PredictionService<M>>>,
    body: Bytes,
) -> Json<Value> {
    let result = match parse_body::<ArticleRequest>(&body) {
        Ok(request) => service.predict_sentiment(request.article.text).await,
        Err(e) => Err(e),
    };
    respond(result, |sentiment| json!({ "sentiment": sentiment }))
}

async fn predict_relevance<M: Predictor + 'static>(
    State(service): State<Arc<PredictionService<M>>>,
    body: Bytes,
) -> Json<Value> {
    let result = match parse_body::<RelevanceRequest>(&body) {
        Ok(request) => {
            service
                .predict_relevance(request.article.text, &request.topic)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result, |relevance| json!({ "prediction": relevance }))
}

pub fn router<M: Predictor + 'static>(service: Arc<PredictionService<M>>) -> Router {
    Router::new()
        .route("/predict_movement", post(predict_movement::<M>))
        .route("/predict_sentiment", post(predict_sentiment::<M>))
        .route("/predict_relevance", post(predict_relevance::<M>))
        .with_state(service)
}

/// Serves the prediction endpoints on an already bound listener until
/// `shutdown` resolves.
pub async fn serve<M, S>(
    listener: TcpListener,
    service: Arc<PredictionService<M>>,
    shutdown: S,
) -> std::io::Result<()>
where
    M: Predictor + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Serving predictions on http://{}", addr);
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_message() {
        let payload = error_payload(&PipelineError::UnknownTopic("sports".to_string()));
        assert_eq!(payload, json!({ "Error": "Model for topic \"sports\" not found" }));
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let payload = error_payload(&PipelineError::Internal("lock poisoned".to_string()));
        assert_eq!(payload, json!({ "Error": "Internal server error" }));
    }

    #[test]
    fn test_missing_field_is_validation_error() {
        let body = Bytes::from_static(br#"{"article":{}}"#);
        let result: PipelineResult<ArticleRequest> = parse_body(&body);
        assert!(matches!(result, Err(PipelineError::RequestValidation(_))));

        let body = Bytes::from_static(br#"{"article":{"text":"x"}}"#);
        let result: PipelineResult<RelevanceRequest> = parse_body(&body);
        assert!(matches!(result, Err(PipelineError::RequestValidation(_))));
    }
}
