//! Command implementations.

pub mod analyze;
pub mod profile;
pub mod stop;

pub use self::analyze::{execute_analyze, run_analysis};
pub use self::profile::execute_profile;
pub use self::stop::execute_stop;
