pub mod error;
pub mod storage;
pub mod utils;

pub type OpenAIClientType = async_openai::Client<async_openai::config::OpenAIConfig>;
