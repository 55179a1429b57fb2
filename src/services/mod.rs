pub mod aggregate;
pub mod chart;
pub mod power;
pub mod report;
pub mod storage;
pub mod timeseries;
