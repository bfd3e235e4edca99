pub mod charts;
pub mod cli;
pub mod config;
pub mod db;
pub mod derived;
pub mod measurement;
pub mod partition;
pub mod pipeline;
pub mod series;
pub mod store;
pub mod time;

#[cfg(test)]
pub mod test_support;
