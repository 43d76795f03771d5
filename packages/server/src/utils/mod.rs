pub mod config;
pub mod test_setup;
pub mod validation;
