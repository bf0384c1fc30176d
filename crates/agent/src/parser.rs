use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use fixquote_core::domain::price::PriceRange;
use fixquote_core::intake::{
    default_price_range, parse_text, ParsedRequest, DEFAULT_ADDRESS, DEFAULT_AVAILABILITY,
    DEFAULT_NAME,
};

use crate::llm::{ChatMessage, ChatRequest, LlmClient, LlmError};

const PARSE_TEMPERATURE: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseSource {
    Llm,
    Heuristic,
}

impl ParseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Heuristic => "heuristic",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParseOutcome {
    pub parsed: ParsedRequest,
    pub source: ParseSource,
}

/// Model answers are loose: any field may be missing, `timesAvailable` may be a string or a
/// list, and the price range may be prose.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ModelParse {
    issue: Option<String>,
    description: Option<String>,
    name: Option<String>,
    address: Option<String>,
    times_available: Option<TimesField>,
    desired_price_range: Option<String>,
    clarifying_questions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimesField {
    One(String),
    Many(Vec<String>),
}

pub struct RequestParser {
    llm: Option<Arc<dyn LlmClient>>,
    model: String,
}

impl RequestParser {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, model: impl Into<String>) -> Self {
        Self { llm, model: model.into() }
    }

    pub fn heuristic_only() -> Self {
        Self { llm: None, model: String::new() }
    }

    pub async fn parse(&self, raw: &str) -> ParseOutcome {
        let Some(llm) = &self.llm else {
            return heuristic(raw);
        };

        match self.parse_with_model(llm.as_ref(), raw).await {
            Ok(parsed) => {
                info!(event_name = "intake.parse.llm", issue = %parsed.issue, "parsed request with model");
                ParseOutcome { parsed, source: ParseSource::Llm }
            }
            Err(error) => {
                warn!(
                    event_name = "intake.parse.fallback",
                    error = %error,
                    "model parse failed; using pattern extraction"
                );
                heuristic(raw)
            }
        }
    }

    async fn parse_with_model(&self, llm: &dyn LlmClient, raw: &str) -> Result<ParsedRequest, LlmError> {
        let request = ChatRequest::new(&self.model, ChatMessage::user(parse_prompt(raw)))
            .with_temperature(PARSE_TEMPERATURE)
            .json_object();
        let completion = llm.complete(request).await?;
        let json = first_json_object(&completion)
            .ok_or_else(|| LlmError::Parse("no JSON object in completion".to_string()))?;
        let answer: ModelParse =
            serde_json::from_str(json).map_err(|error| LlmError::Parse(error.to_string()))?;
        normalize(answer, raw)
    }
}

fn heuristic(raw: &str) -> ParseOutcome {
    ParseOutcome { parsed: parse_text(raw), source: ParseSource::Heuristic }
}

fn parse_prompt(raw: &str) -> String {
    format!(
        "Extract the following fields from this home repair request and respond with a JSON \
         object only.\n\
         Fields: issue (short summary), description (full details), name (default \"{DEFAULT_NAME}\"), \
         address (default \"{DEFAULT_ADDRESS}\" for Plano, TX), timesAvailable (list of time slots), \
         desiredPriceRange (for example \"$50-100\"), clarifyingQuestions (1-3 questions about \
         anything missing).\n\
         Request: \"{raw}\""
    )
}

/// First complete JSON object in a completion; models often wrap JSON in prose or code fences.
pub(crate) fn first_json_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| {
        let rest = &text[start..];
        let mut values = serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
        match values.next() {
            Some(Ok(serde_json::Value::Object(_))) => Some(&rest[..values.byte_offset()]),
            _ => None,
        }
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn normalize(answer: ModelParse, raw: &str) -> Result<ParsedRequest, LlmError> {
    let issue = non_empty(answer.issue)
        .ok_or_else(|| LlmError::Parse("model answer has no issue".to_string()))?;

    let times_available = match answer.times_available {
        Some(TimesField::One(slot)) => vec![slot],
        Some(TimesField::Many(slots)) => slots,
        None => Vec::new(),
    };
    let mut times_available: Vec<String> = times_available
        .into_iter()
        .map(|slot| slot.trim().to_string())
        .filter(|slot| !slot.is_empty())
        .collect();
    if times_available.is_empty() {
        times_available.push(DEFAULT_AVAILABILITY.to_string());
    }

    let desired_price_range = non_empty(answer.desired_price_range)
        .and_then(|text| text.parse::<PriceRange>().ok())
        .unwrap_or_else(default_price_range);

    let clarifying_questions = answer
        .clarifying_questions
        .unwrap_or_default()
        .into_iter()
        .filter(|question| !question.trim().is_empty())
        .take(3)
        .collect();

    Ok(ParsedRequest {
        description: non_empty(answer.description).unwrap_or_else(|| raw.trim().to_string()),
        issue,
        name: non_empty(answer.name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
        address: non_empty(answer.address).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
        times_available,
        desired_price_range,
        clarifying_questions,
    })
}
