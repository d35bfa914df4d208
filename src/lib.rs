pub mod error;
pub mod logging;
pub mod types;

pub mod io;
pub mod parallel;
pub mod qc;

pub mod aggregate;
pub mod annotation;
pub mod bed;
pub mod combine;
pub mod correction;
pub mod merge;
pub mod report;
