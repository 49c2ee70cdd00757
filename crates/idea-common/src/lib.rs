pub mod error;
pub mod gemini;
pub mod http;
pub mod ids;
pub mod kv;
pub mod openai;
pub mod redis;
