pub mod audit;
pub mod cache;
pub mod client;
pub mod config;
pub mod extract;
pub mod paths;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod scheduler;
pub mod selector;
pub mod sessions;
pub mod synthesis;
pub mod transcript;
pub mod types;
pub mod util;
