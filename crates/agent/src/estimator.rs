use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use fixquote_core::domain::price::PriceRange;
use fixquote_core::estimate::{heuristic_estimate, range_from_prose, PriceEstimate, DEFAULT_LOCATION};

use crate::llm::{ChatMessage, ChatRequest, LlmClient};
use crate::parser::first_json_object;

const ESTIMATE_TEMPERATURE: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimateSource {
    LlmJson,
    LlmProse,
    Heuristic,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEstimate {
    price_range: String,
    #[serde(default)]
    explanation: Option<String>,
}

pub struct PriceEstimator {
    llm: Option<Arc<dyn LlmClient>>,
    model: String,
}

impl PriceEstimator {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, model: impl Into<String>) -> Self {
        Self { llm, model: model.into() }
    }

    pub fn heuristic_only() -> Self {
        Self { llm: None, model: String::new() }
    }

    /// Never fails: model answer as JSON, then a dollar range found in its prose, then the
    /// local market table.
    pub async fn estimate(&self, issue: &str, location: Option<&str>) -> (PriceEstimate, EstimateSource) {
        let location = location.map(str::trim).filter(|value| !value.is_empty()).unwrap_or(DEFAULT_LOCATION);

        if let Some(llm) = &self.llm {
            let request = ChatRequest::new(&self.model, ChatMessage::user(estimate_prompt(issue, location)))
                .with_temperature(ESTIMATE_TEMPERATURE);
            match llm.complete(request).await {
                Ok(completion) => {
                    if let Some(estimate) = from_json(&completion) {
                        info!(event_name = "intake.estimate.llm", price_range = %estimate.price_range, "estimated price with model");
                        return (estimate, EstimateSource::LlmJson);
                    }
                    if let Some(price_range) = range_from_prose(&completion) {
                        return (
                            PriceEstimate { price_range, explanation: completion.trim().to_string() },
                            EstimateSource::LlmProse,
                        );
                    }
                    warn!(event_name = "intake.estimate.fallback", "model answer had no price range");
                }
                Err(error) => {
                    warn!(event_name = "intake.estimate.fallback", error = %error, "model estimate failed");
                }
            }
        }

        (heuristic_estimate(issue), EstimateSource::Heuristic)
    }
}

fn estimate_prompt(issue: &str, location: &str) -> String {
    format!(
        "As a handyman pricing expert, provide the average price range for the following home \
         repair task in {location}: \"{issue}\"\n\
         Return a JSON object with these fields: priceRange (for example \"$80-120\"), explanation \
         (one or two sentences on what drives the cost)."
    )
}

fn from_json(completion: &str) -> Option<PriceEstimate> {
    let answer: ModelEstimate = serde_json::from_str(first_json_object(completion)?).ok()?;
    let price_range = answer
        .price_range
        .parse::<PriceRange>()
        .ok()
        .or_else(|| range_from_prose(&answer.price_range))?;
    Some(PriceEstimate { price_range, explanation: answer.explanation.unwrap_or_default() })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{EstimateSource, PriceEstimator};
    use crate::llm::tests::ScriptedLlm;
    use crate::llm::{LlmError, MessageContent};

    fn estimator(reply: Result<String, LlmError>) -> (PriceEstimator, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm::replying(vec![reply]));
        (PriceEstimator::new(Some(llm.clone()), "m"), llm)
    }

    #[tokio::test]
    async fn json_answer_wins() {
        let (estimator, llm) = estimator(Ok(
            r#"Sure! {"priceRange": "$90-140", "explanation": "Cartridge swap plus labor."}"#.to_string(),
        ));

        let (estimate, source) = estimator.estimate("Leaky faucet", Some("Plano")).await;

        assert_eq!(source, EstimateSource::LlmJson);
        assert_eq!(estimate.price_range.to_string(), "$90-140");
        assert_eq!(estimate.explanation, "Cartridge swap plus labor.");
        let seen = llm.seen.lock().expect("seen lock");
        let MessageContent::Text(prompt) = &seen[0].messages[0].content else {
            panic!("estimate prompt should be plain text");
        };
        assert!(prompt.contains("in Plano"));
        assert_eq!(seen[0].temperature, Some(0.2));
    }

    #[tokio::test]
    async fn prose_range_is_used_when_json_is_missing() {
        let (estimator, _) = estimator(Ok("Expect roughly $75 to 125 for this job.".to_string()));
        let (estimate, source) = estimator.estimate("Leaky faucet", None).await;
        assert_eq!(source, EstimateSource::LlmProse);
        assert_eq!(estimate.price_range.to_string(), "$75-125");
    }

    #[tokio::test]
    async fn failures_fall_back_to_the_market_table() {
        let (estimator, llm) = estimator(Err(LlmError::Api { status: 500, message: "down".to_string() }));
        let (estimate, source) = estimator.estimate("Broken outlet in garage", Some("  ")).await;
        assert_eq!(source, EstimateSource::Heuristic);
        assert_eq!(estimate.price_range.to_string(), "$85-150");

        let seen = llm.seen.lock().expect("seen lock");
        let MessageContent::Text(prompt) = &seen[0].messages[0].content else {
            panic!("estimate prompt should be plain text");
        };
        assert!(prompt.contains("in DFW"));
    }

    #[tokio::test]
    async fn no_model_means_market_table() {
        let (estimate, source) = PriceEstimator::heuristic_only().estimate("Sticky door", None).await;
        assert_eq!(source, EstimateSource::Heuristic);
        assert_eq!(estimate.price_range.to_string(), "$65-110");
    }
}
