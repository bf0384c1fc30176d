use std::time::Duration;

use fixquote_core::domain::request::RequestId;

use crate::commands::refresh::{summarize, RefreshSession};
use crate::commands::{load_config, runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WatchEnd {
    Settled,
    RoundLimit,
    Interrupted,
}

impl WatchEnd {
    fn describe(self) -> &'static str {
        match self {
            Self::Settled => "all calls reached a terminal status",
            Self::RoundLimit => "round limit reached with calls still open",
            Self::Interrupted => "interrupted with calls still open",
        }
    }
}

/// Repeats the pull path every `interval_secs` until each quote's call is terminal, the
/// round limit is hit, or the operator interrupts.
pub fn run(request_id: &str, interval_secs: u64, max_rounds: Option<u32>) -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return failure.into_result("watch"),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return failure.into_result("watch"),
    };

    let request_id = RequestId(request_id.trim().to_string());
    let interval = Duration::from_secs(interval_secs);
    let result = runtime.block_on(async {
        let session = RefreshSession::open(&config).await?;
        let mut rounds = Vec::new();

        let end = loop {
            let report = match session.refresh(&request_id).await {
                Ok(report) => report,
                Err(failure) => {
                    session.close().await;
                    return Err(failure);
                }
            };
            rounds.push(format!("round {}: {}", rounds.len() + 1, summarize(&report)));

            if report.all_terminal() {
                break WatchEnd::Settled;
            }
            if max_rounds.is_some_and(|max| rounds.len() >= max as usize) {
                break WatchEnd::RoundLimit;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => break WatchEnd::Interrupted,
            }
        };

        session.close().await;
        Ok((end, rounds))
    });

    match result {
        Ok((end, rounds)) => CommandResult::success(
            "watch",
            format!("{} after {} round(s); {}", end.describe(), rounds.len(), rounds.join(" | ")),
        ),
        Err(failure) => failure.into_result("watch"),
    }
}
