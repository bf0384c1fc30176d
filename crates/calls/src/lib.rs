//! Voice-call integration for quote collection.
//!
//! - **Client** (`client`) - `VoiceProvider` trait and the Retell REST client
//! - **Events** (`events`) - webhook envelopes and provider payloads mapped to `CallUpdate`s
//! - **Strategy** (`strategy`) - live calls vs. fabricated mock quotes
//! - **Dispatch** (`dispatch`) - one quote per roster provider, fanned out concurrently
//! - **Reconciler** (`reconciler`) - the single write path for call status
//!
//! ```text
//! webhook push ─┐
//! CLI/API poll ─┼─> StatusReconciler ─> QuoteRepository (conditional write)
//! operator  ────┘
//! ```

pub mod audit;
pub mod client;
pub mod dispatch;
pub mod events;
pub mod reconciler;
pub mod strategy;

pub use audit::TracingAuditSink;
pub use client::{CallDetails, CreateCallRequest, RetellClient, VoiceError, VoiceProvider};
pub use dispatch::QuoteDispatcher;
pub use events::{WebhookDisposition, WebhookEnvelope, WebhookError};
pub use reconciler::{ReconcileError, ReconcileOutcome, RefreshReport, StatusReconciler};
pub use strategy::{LiveCallStrategy, MockCallStrategy, QuoteStrategy};
