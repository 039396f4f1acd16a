pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod relay;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_support;
