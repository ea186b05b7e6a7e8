pub mod providers;

use std::sync::Arc;

use chainrun_core::config::GenerationConfig;
use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::TextGenerator;

pub use providers::echo::EchoGenerator;
pub use providers::gemini::GeminiClient;

/// Create a text generator based on the provider name.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Arc::new(GeminiClient::new(config.clone()))),
        "echo" => Ok(Arc::new(EchoGenerator)),
        other => Err(ChainError::Config(format!(
            "unsupported generation provider '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_generator_by_provider() {
        let mut config = GenerationConfig::default();
        assert_eq!(create_generator(&config).unwrap().name(), "gemini");

        config.provider = "echo".into();
        assert_eq!(create_generator(&config).unwrap().name(), "echo");

        config.provider = "openai".into();
        assert!(matches!(create_generator(&config), Err(ChainError::Config(_))));
    }
}
