//! Endpoints that speak the OpenAI chat-completions dialect.

use crate::OpenAiProvider;

pub const DEEPSEEK_BASE: &str = "https://api.deepseek.com/v1";
pub const GROQ_BASE: &str = "https://api.groq.com/openai/v1";
pub const OLLAMA_BASE: &str = "http://localhost:11434/v1";
pub const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";

pub fn deepseek(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, DEEPSEEK_BASE)
}

pub fn groq(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, GROQ_BASE)
}

/// Local Ollama; the server ignores the key but the header is still sent.
pub fn ollama_with_base(base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new("ollama", base_url)
}

pub fn openrouter(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, OPENROUTER_BASE)
}

pub fn custom(api_key: impl Into<String>, base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, base_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compat_constructors_use_known_bases() {
        assert_eq!(deepseek("sk").api_base(), DEEPSEEK_BASE);
        assert_eq!(groq("gsk").api_base(), GROQ_BASE);
        assert_eq!(openrouter("or").api_base(), OPENROUTER_BASE);
        assert_eq!(ollama_with_base(OLLAMA_BASE).api_base(), OLLAMA_BASE);
    }

    #[test]
    fn custom_trims_trailing_slash() {
        let provider = custom("key", "https://my-llm.example.com/v1/");
        assert_eq!(provider.api_base(), "https://my-llm.example.com/v1");
    }
}
