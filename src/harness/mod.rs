pub mod suite;
pub mod types;

pub use suite::run_suite;
pub use types::{SCENARIO_SESSION, SuiteConfig, SuiteError};
