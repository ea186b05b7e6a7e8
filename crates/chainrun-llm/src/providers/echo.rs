use futures::future::BoxFuture;

use chainrun_core::error::Result;
use chainrun_core::traits::TextGenerator;

/// Returns the prompt unchanged. Useful for dry runs without an API key.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoGenerator;

impl TextGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { Ok(prompt) })
    }
}
