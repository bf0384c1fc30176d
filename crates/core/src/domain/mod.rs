pub mod price;
pub mod provider;
pub mod quote;
pub mod request;
pub mod user;
