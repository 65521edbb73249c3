pub mod avatar;
pub mod brief;
pub mod llm;
pub mod pages;
pub mod projects;
pub mod setup;
pub mod tts;
pub mod workflow;
