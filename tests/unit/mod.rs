//! Unit tests for individual components

mod api_test;
mod builders_test;
mod config_test;
mod error_test;
mod events_test;
mod util_test;
