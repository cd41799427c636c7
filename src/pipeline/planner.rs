//! Content planning: drive the text model to a validated outline.
//!
//! ## Retry strategy
//!
//! Three failure classes get three different responses:
//!
//! * **Malformed output** — the model answered but the response failed the
//!   outline schema. Retry with a corrective prompt quoting the parse
//!   error, up to `max_plan_retries` extra attempts, then fail with
//!   `MalformedOutline`. No placeholder outline is ever substituted.
//! * **Transient transport** — 429, 5xx, empty response, per-call timeout.
//!   Exponential backoff (`retry_backoff_ms * 2^attempt`), a couple of
//!   tries, then advance to the next model in the fallback order.
//! * **Unavailable** — unknown model id. Advance immediately.
//!
//! The fallback order comes from the request's preference tier (or an
//! explicit config override). Exhausting it surfaces the last error.

use crate::config::{GenerationConfig, TopicRequest};
use crate::error::DeckError;
use crate::limiter::RateLimiter;
use crate::outline::{parse_outline, Outline};
use crate::prompts;
use crate::services::model::{ModelError, TextModel};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{info, warn};

/// Transient-failure tries per model before advancing in the fallback order.
const TRANSIENT_RETRIES: u32 = 2;

/// Produce a validated [`Outline`] for `request`.
///
/// Returns the outline together with every raw model response seen, so the
/// orchestrator can surface them when the debug flag is set. `deadline` is
/// the whole-run budget — blowing it here is fatal, because without an
/// outline there is nothing to degrade to.
pub async fn plan(
    request: &TopicRequest,
    model: &Arc<dyn TextModel>,
    limiter: &RateLimiter,
    config: &GenerationConfig,
    deadline: Instant,
) -> Result<(Outline, Vec<String>), DeckError> {
    let order = config.model_order(request);
    let per_call = Duration::from_secs(config.per_call_timeout_secs);
    let max_parse_attempts = 1 + config.max_plan_retries;

    let mut raw_responses: Vec<String> = Vec::new();
    let mut prompt = prompts::outline_prompt(request);
    let mut parse_attempts: u32 = 0;
    let mut last_err: Option<DeckError> = None;

    'models: for (model_idx, model_id) in order.iter().enumerate() {
        let mut transient: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                return Err(DeckError::PipelineTimeout {
                    secs: config.global_timeout_secs,
                });
            }

            limiter.acquire().await?;

            let call = model.generate(model_id, &prompt, per_call);
            let result = timeout_at(deadline, call).await.map_err(|_| {
                DeckError::PipelineTimeout {
                    secs: config.global_timeout_secs,
                }
            })?;

            match result {
                Ok(text) => {
                    parse_attempts += 1;
                    let parsed =
                        parse_outline(&text, request.slide_count, config.max_bullet_chars);
                    raw_responses.push(text);

                    match parsed {
                        Ok(outline) => {
                            info!(
                                model = model_id.as_str(),
                                attempts = parse_attempts,
                                slides = outline.slides.len(),
                                "outline validated"
                            );
                            return Ok((outline, raw_responses));
                        }
                        Err(parse_err) => {
                            warn!(
                                model = model_id.as_str(),
                                attempt = parse_attempts,
                                error = %parse_err,
                                "outline rejected, sending corrective prompt"
                            );
                            if parse_attempts >= max_parse_attempts {
                                return Err(DeckError::MalformedOutline {
                                    attempts: parse_attempts,
                                    detail: parse_err.0,
                                });
                            }
                            prompt = prompts::corrective_prompt(request, &parse_err.0);
                        }
                    }
                }

                Err(ModelError::Unavailable(_)) => {
                    warn!(model = model_id.as_str(), "model unavailable, advancing");
                    last_err = Some(DeckError::ModelUnavailable {
                        model: model_id.clone(),
                        detail: "model not found".to_string(),
                    });
                    continue 'models;
                }

                Err(ModelError::Auth(detail)) => {
                    // A rejected key fails every model in the chain the
                    // same way; advancing would only burn quota.
                    return Err(DeckError::ModelUnavailable {
                        model: model_id.clone(),
                        detail,
                    });
                }

                Err(err @ (ModelError::RateLimited
                | ModelError::Timeout { .. }
                | ModelError::EmptyResponse
                | ModelError::Transport(_))) => {
                    transient += 1;
                    if transient > TRANSIENT_RETRIES {
                        let is_last = model_idx + 1 == order.len();
                        last_err = Some(match &err {
                            ModelError::RateLimited => DeckError::RateLimited {
                                service: "model",
                                attempts: transient,
                            },
                            ModelError::Timeout { secs } => DeckError::PlanningTimeout {
                                model: model_id.clone(),
                                secs: *secs,
                            },
                            other => DeckError::ModelUnavailable {
                                model: model_id.clone(),
                                detail: other.to_string(),
                            },
                        });
                        if is_last {
                            break 'models;
                        }
                        warn!(
                            model = model_id.as_str(),
                            error = %err,
                            "persistent failure, advancing to next model"
                        );
                        continue 'models;
                    }

                    let backoff = config.retry_backoff_ms * 2u64.pow(transient - 1);
                    warn!(
                        model = model_id.as_str(),
                        retry = transient,
                        backoff_ms = backoff,
                        error = %err,
                        "transient model failure, backing off"
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        DeckError::Internal("model fallback order is empty".to_string())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted fake: pops one response per call.
    struct ScriptedModel {
        script: Mutex<Vec<Result<String, ModelError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl TextModel for ScriptedModel {
        fn generate<'a>(
            &'a self,
            _model_id: &'a str,
            _prompt: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<String, ModelError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Err(ModelError::EmptyResponse)
                } else {
                    script.remove(0)
                }
            };
            Box::pin(async move { next })
        }
    }

    fn valid_outline_json(n: usize) -> String {
        let slides: Vec<String> = (1..=n)
            .map(|i| {
                format!(
                    r#"{{"heading": "Slide {i}", "bullets": ["a", "b", "c"], "image_query": "query {i}"}}"#
                )
            })
            .collect();
        format!(r#"{{"title": "Deck", "slides": [{}]}}"#, slides.join(","))
    }

    fn test_config() -> GenerationConfig {
        GenerationConfig::builder()
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    fn limiter() -> RateLimiter {
        RateLimiter::per_minute("model", 100, 1_000)
    }

    #[tokio::test]
    async fn healthy_model_plans_in_one_call() {
        let request = TopicRequest::new("Climate Change", 5).unwrap();
        let model = ScriptedModel::new(vec![Ok(valid_outline_json(5))]);
        let config = test_config();

        let (outline, raw) = plan(
            &request,
            &(model.clone() as Arc<dyn TextModel>),
            &limiter(),
            &config,
            far_deadline(),
        )
        .await
        .expect("plan");

        assert_eq!(outline.slides.len(), 5);
        assert_eq!(raw.len(), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_then_valid_uses_corrective_retry() {
        let request = TopicRequest::new("Climate Change", 4).unwrap();
        let model = ScriptedModel::new(vec![
            Ok("not json at all".to_string()),
            Ok(valid_outline_json(4)),
        ]);
        let config = test_config();

        let (outline, raw) = plan(
            &request,
            &(model.clone() as Arc<dyn TextModel>),
            &limiter(),
            &config,
            far_deadline(),
        )
        .await
        .expect("plan");

        assert_eq!(outline.slides.len(), 4);
        assert_eq!(raw.len(), 2, "both raw responses retained");
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_malformed_output_fails_with_attempt_count() {
        let request = TopicRequest::new("Climate Change", 5).unwrap();
        // Wrong slide count every time; default allows 3 total attempts.
        let model = ScriptedModel::new(vec![
            Ok(valid_outline_json(4)),
            Ok(valid_outline_json(4)),
            Ok(valid_outline_json(4)),
        ]);
        let config = test_config();

        let err = plan(
            &request,
            &(model as Arc<dyn TextModel>),
            &limiter(),
            &config,
            far_deadline(),
        )
        .await
        .unwrap_err();

        match err {
            DeckError::MalformedOutline { attempts, detail } => {
                assert_eq!(attempts, 3);
                assert!(detail.contains("expected exactly 5 slides"), "{detail}");
            }
            other => panic!("expected MalformedOutline, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_count_never_returns_an_outline() {
        // Exact-count property: either the right count or a typed error.
        let request = TopicRequest::new("Climate Change", 6).unwrap();
        let model = ScriptedModel::new(vec![Ok(valid_outline_json(3))]);
        let config = GenerationConfig::builder()
            .max_plan_retries(0)
            .retry_backoff_ms(1)
            .build()
            .unwrap();

        let result = plan(
            &request,
            &(model as Arc<dyn TextModel>),
            &limiter(),
            &config,
            far_deadline(),
        )
        .await;
        assert!(matches!(result, Err(DeckError::MalformedOutline { .. })));
    }

    #[tokio::test]
    async fn unavailable_model_advances_through_fallback_order() {
        let request = TopicRequest::new("Climate Change", 3).unwrap();
        let model = ScriptedModel::new(vec![
            Err(ModelError::Unavailable("gemini-2.5-pro".into())),
            Ok(valid_outline_json(3)),
        ]);
        let config = test_config();

        let (outline, _) = plan(
            &request,
            &(model.clone() as Arc<dyn TextModel>),
            &limiter(),
            &config,
            far_deadline(),
        )
        .await
        .expect("fallback model should succeed");

        assert_eq!(outline.slides.len(), 3);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn every_model_unavailable_surfaces_the_last_error() {
        let request = TopicRequest::new("Climate Change", 3).unwrap();
        let model = ScriptedModel::new(vec![
            Err(ModelError::Unavailable("a".into())),
            Err(ModelError::Unavailable("b".into())),
            Err(ModelError::Unavailable("c".into())),
        ]);
        let config = test_config();

        let err = plan(
            &request,
            &(model as Arc<dyn TextModel>),
            &limiter(),
            &config,
            far_deadline(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeckError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn auth_failure_is_immediately_fatal() {
        let request = TopicRequest::new("Climate Change", 3).unwrap();
        let model = ScriptedModel::new(vec![Err(ModelError::Auth("HTTP 403".into()))]);
        let config = test_config();

        let err = plan(
            &request,
            &(model.clone() as Arc<dyn TextModel>),
            &limiter(),
            &config,
            far_deadline(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeckError::ModelUnavailable { .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1, "no fallback on auth");
    }

    #[tokio::test]
    async fn expired_deadline_fails_with_pipeline_timeout() {
        let request = TopicRequest::new("Climate Change", 3).unwrap();
        let model = ScriptedModel::new(vec![Ok(valid_outline_json(3))]);
        let config = test_config();

        let err = plan(
            &request,
            &(model as Arc<dyn TextModel>),
            &limiter(),
            &config,
            Instant::now() - Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeckError::PipelineTimeout { .. }));
    }
}
