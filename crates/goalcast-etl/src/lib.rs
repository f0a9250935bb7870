pub mod acquisition;
pub mod cli;
pub mod logging;
pub mod orchestrator;
pub mod store;
