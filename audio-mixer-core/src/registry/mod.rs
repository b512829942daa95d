pub mod session_registry;
pub mod subscriptions;
