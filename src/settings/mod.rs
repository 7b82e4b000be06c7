// Settings module
// Persisted tunables for opening decode sessions

pub mod settings;

pub use settings::SessionSettings;
