pub mod config;
pub mod dataset;
pub mod io;
pub mod labels;
