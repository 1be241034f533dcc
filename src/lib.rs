pub mod binder;
pub mod config;
pub mod error;
pub mod identifier;
pub mod lookup;
pub mod message;
pub mod reconcile;
pub mod record;
pub mod service;
pub mod session;
pub mod severity;
pub mod sled_store;
pub mod store;
pub mod utils;
pub mod validator;
pub mod workflow;
