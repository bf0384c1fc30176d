use std::sync::Arc;

use tracing::info;

use crate::llm::{ChatMessage, ChatRequest, LlmClient, LlmError};

const DESCRIBE_PROMPT: &str = "Describe this image in 1 sentence.";
pub const NO_DESCRIPTION: &str = "No description returned.";

pub struct ImageDescriber {
    llm: Option<Arc<dyn LlmClient>>,
    model: String,
}

impl ImageDescriber {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, model: impl Into<String>) -> Self {
        Self { llm, model: model.into() }
    }

    pub async fn describe(&self, image_url: &str) -> Result<String, LlmError> {
        let llm = self.llm.as_ref().ok_or(LlmError::NotConfigured)?;
        let request = ChatRequest::new(&self.model, ChatMessage::user_with_image(DESCRIBE_PROMPT, image_url));

        let description = match llm.complete(request).await {
            Ok(text) => text.trim().to_string(),
            Err(LlmError::EmptyCompletion) => NO_DESCRIPTION.to_string(),
            Err(error) => return Err(error),
        };
        info!(event_name = "intake.describe_image", "described uploaded image");
        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ImageDescriber, NO_DESCRIPTION};
    use crate::llm::tests::ScriptedLlm;
    use crate::llm::{ContentPart, LlmError, MessageContent};

    #[tokio::test]
    async fn sends_image_as_a_vision_part() {
        let llm = Arc::new(ScriptedLlm::replying(vec![Ok(" A dripping chrome faucet. ".to_string())]));
        let describer = ImageDescriber::new(Some(llm.clone()), "llama-3.2-11b-vision-preview");

        let description = describer.describe("https://img.example/faucet.jpg").await.expect("describe");

        assert_eq!(description, "A dripping chrome faucet.");
        let seen = llm.seen.lock().expect("seen lock");
        assert_eq!(seen[0].model, "llama-3.2-11b-vision-preview");
        let MessageContent::Parts(parts) = &seen[0].messages[0].content else {
            panic!("vision prompt should carry parts");
        };
        assert!(matches!(&parts[1], ContentPart::ImageUrl { image_url } if image_url.url == "https://img.example/faucet.jpg"));
    }

    #[tokio::test]
    async fn empty_answer_becomes_placeholder_and_errors_surface() {
        let describer = ImageDescriber::new(Some(Arc::new(ScriptedLlm::replying(vec![Err(LlmError::EmptyCompletion)]))), "v");
        assert_eq!(describer.describe("https://x").await.expect("describe"), NO_DESCRIPTION);

        let describer = ImageDescriber::new(
            Some(Arc::new(ScriptedLlm::replying(vec![Err(LlmError::Authentication { message: "bad key".into() })]))),
            "v",
        );
        assert!(matches!(describer.describe("https://x").await, Err(LlmError::Authentication { .. })));

        let describer = ImageDescriber::new(None, "v");
        assert!(matches!(describer.describe("https://x").await, Err(LlmError::NotConfigured)));
    }
}
