// Quillforge Infrastructure - HTTP Adapters
// Implements: GenerationClient (chat completions), ContentFetcher (web pages)

mod content_fetcher;
mod generation_client;
mod prompts;

pub use content_fetcher::{extract_readable_text, HttpContentFetcher};
pub use generation_client::{GenerationApiConfig, HttpGenerationClient};
