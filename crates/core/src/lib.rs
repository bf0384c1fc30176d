pub mod audit;
pub mod calls;
pub mod config;
pub mod domain;
pub mod errors;
pub mod estimate;
pub mod intake;
pub mod retry;

pub use calls::{CallStatus, CallUpdate, UpdateOrigin, UpdatePlan, UpdateRejection};
pub use domain::price::PriceRange;
pub use domain::provider::{Provider, ProviderId, ProviderSnapshot};
pub use domain::quote::{CallId, CallTracking, Quote, QuoteDecision, QuoteId};
pub use domain::request::{RequestId, RequestSource, ServiceRequest};
pub use domain::user::{NewUser, User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use estimate::{PriceEstimate, QuoteDetails};
pub use intake::ParsedRequest;
pub use retry::RetryPolicy;
