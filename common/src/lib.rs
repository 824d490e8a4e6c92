pub mod chart;
pub mod config;
pub mod duration;
pub mod error;
pub mod interp;
pub mod logging;
pub mod record;
pub mod report;
pub mod stats;
pub mod util;
