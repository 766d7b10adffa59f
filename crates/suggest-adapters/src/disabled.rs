use async_trait::async_trait;
use domains::ReplySuggester;

/// Used when no API key is configured: never suggests anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSuggester;

#[async_trait]
impl ReplySuggester for DisabledSuggester {
    async fn generate_replies(&self, _incoming: &str, _sender: &str, _recipient: &str) -> Vec<String> {
        Vec::new()
    }
}
