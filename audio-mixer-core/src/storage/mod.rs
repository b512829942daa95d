pub mod settings_store;
pub mod settings_writer;
