pub mod cache;
pub mod config;
pub mod event_bus;
pub mod poller;
pub mod runner;
pub mod services;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
