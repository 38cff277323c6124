pub mod dispatcher;
pub mod engine;
pub mod normalizer;
pub mod synth;
pub mod tables;
pub mod voices;
pub mod workflow;
