pub mod audio_models;
pub mod config;
pub mod error;
pub mod render;
pub mod settings;
pub mod state;
