pub mod improve;
pub mod settings;
