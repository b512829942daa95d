pub mod input;
pub mod inspector;
pub mod mixer;
pub mod service;
