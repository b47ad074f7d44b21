pub mod conversation;
pub mod documents;
pub mod export;
pub mod generator;
pub mod services;
pub mod store;
pub mod traits;
