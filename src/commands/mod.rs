pub mod power;
pub mod processes;
pub mod settings;
