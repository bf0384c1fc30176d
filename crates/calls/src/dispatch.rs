use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use fixquote_core::domain::provider::Provider;
use fixquote_core::domain::quote::Quote;
use fixquote_core::domain::request::ServiceRequest;
use fixquote_core::domain::user::User;
use fixquote_core::estimate::synthesize_quote;
use fixquote_db::repositories::QuoteRepository;

use crate::strategy::{fallback_quote, QuoteStrategy};

/// Fans a request out to every roster provider. One provider's failure never affects the
/// others and the result always holds exactly one quote per provider, in roster order.
pub struct QuoteDispatcher {
    strategy: Arc<dyn QuoteStrategy>,
    quotes: Arc<dyn QuoteRepository>,
    roster: Arc<Vec<Provider>>,
}

impl QuoteDispatcher {
    pub fn new(
        strategy: Arc<dyn QuoteStrategy>,
        quotes: Arc<dyn QuoteRepository>,
        roster: Vec<Provider>,
    ) -> Self {
        Self { strategy, quotes, roster: Arc::new(roster) }
    }

    pub fn roster(&self) -> &[Provider] {
        &self.roster
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub async fn dispatch(&self, request: &ServiceRequest, user: &User) -> Vec<Quote> {
        info!(
            event_name = "dispatch.started",
            request_id = %request.id.0,
            strategy = self.strategy.name(),
            providers = self.roster.len(),
            "dispatching quote requests"
        );

        let mut tasks = JoinSet::new();
        for (index, provider) in self.roster.iter().enumerate() {
            let strategy = Arc::clone(&self.strategy);
            let quotes = Arc::clone(&self.quotes);
            let provider = provider.clone();
            let request = request.clone();
            let user = user.clone();

            tasks.spawn(async move {
                let quote = strategy.request_quote(&provider, &request, &user).await;
                persist(quotes.as_ref(), &quote).await;
                (index, quote)
            });
        }

        let mut slots: Vec<Option<Quote>> = vec![None; self.roster.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, quote)) => slots[index] = Some(quote),
                Err(join_error) => {
                    warn!(event_name = "dispatch.task_failed", error = %join_error, "quote task aborted");
                }
            }
        }

        let mut quotes = Vec::with_capacity(slots.len());
        for (slot, provider) in slots.into_iter().zip(self.roster.iter()) {
            let quote = match slot {
                Some(quote) => quote,
                None => {
                    let details = synthesize_quote(provider, &request.issue, &mut StdRng::from_entropy());
                    let quote = fallback_quote(provider, request, details, "quote task aborted");
                    persist(self.quotes.as_ref(), &quote).await;
                    quote
                }
            };
            quotes.push(quote);
        }

        info!(
            event_name = "dispatch.completed",
            request_id = %request.id.0,
            quotes = quotes.len(),
            failed = quotes.iter().filter(|quote| quote.call.error.is_some()).count(),
            "quote dispatch finished"
        );
        quotes
    }
}

async fn persist(quotes: &dyn QuoteRepository, quote: &Quote) {
    if let Err(error) = quotes.insert(quote.clone()).await {
        error!(
            event_name = "dispatch.persist_failed",
            request_id = %quote.request_id.0,
            quote_id = %quote.id.0,
            provider_id = %quote.provider.provider_id.0,
            error = %error,
            "failed to store quote"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fixquote_core::calls::CallStatus;
    use fixquote_core::domain::provider::default_roster;
    use fixquote_db::repositories::{InMemoryQuoteRepository, QuoteRepository};

    use super::QuoteDispatcher;
    use crate::client::tests::StubVoice;
    use crate::client::VoiceError;
    use crate::strategy::tests::{request, user};
    use crate::strategy::{LiveCallStrategy, MockCallStrategy};

    #[tokio::test]
    async fn one_quote_per_provider_even_when_calls_fail() {
        let roster = default_roster();
        let voice = StubVoice::default()
            .on_create(&roster[0].phone, Err(VoiceError::Api { status: 500, message: "down".into() }))
            .on_create(&roster[2].phone, Err(VoiceError::RateLimit { message: "slow".into() }));
        let repository = Arc::new(InMemoryQuoteRepository::default());
        let dispatcher = QuoteDispatcher::new(
            Arc::new(LiveCallStrategy::new(Arc::new(voice), "+15550001111", "agent_1", None)),
            repository.clone(),
            roster.clone(),
        );

        let request = request();
        let quotes = dispatcher.dispatch(&request, &user()).await;

        assert_eq!(quotes.len(), roster.len());
        let providers: Vec<&str> = quotes.iter().map(|quote| quote.provider.provider_id.0.as_str()).collect();
        assert_eq!(providers, vec!["h1", "h2", "h3"]);
        assert_eq!(quotes[0].call.status, CallStatus::Failed);
        assert_eq!(quotes[1].call.status, CallStatus::Pending);
        assert_eq!(quotes[2].call.status, CallStatus::Failed);

        let stored = repository.list_for_request(&request.id).await.expect("list");
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn mock_dispatch_twice_keeps_call_ids_unique() {
        let repository = Arc::new(InMemoryQuoteRepository::default());
        let dispatcher =
            QuoteDispatcher::new(Arc::new(MockCallStrategy::default()), repository.clone(), default_roster());
        assert_eq!(dispatcher.strategy_name(), "mock");

        let mut second = request();
        second.id.0 = "req-2".to_string();
        let first = dispatcher.dispatch(&request(), &user()).await;
        let again = dispatcher.dispatch(&second, &user()).await;

        assert!(first.iter().chain(again.iter()).all(|quote| quote.call.status == CallStatus::Completed));
        assert_eq!(repository.list_for_request(&second.id).await.expect("list").len(), 3);
        assert_eq!(repository.list_for_request(&first[0].request_id).await.expect("list").len(), 3);
    }

    #[tokio::test]
    async fn aborted_provider_task_gets_a_stored_fallback_quote() {
        let repository = Arc::new(InMemoryQuoteRepository::default());
        let dispatcher = QuoteDispatcher::new(
            Arc::new(PanicsFor { provider_id: "h2", inner: MockCallStrategy::seeded(5) }),
            repository.clone(),
            default_roster(),
        );

        let request = request();
        let quotes = dispatcher.dispatch(&request, &user()).await;

        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[1].call.status, CallStatus::Failed);
        assert_eq!(quotes[1].call.error.as_deref(), Some("quote task aborted"));

        let stored = repository.list_for_request(&request.id).await.expect("list");
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().any(|quote| quote.id == quotes[1].id));
    }
}
