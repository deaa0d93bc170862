//! Keyword Extractor — pulls an ordered keyword list out of a raw job description.

use crate::errors::PipelineError;
use crate::generation::prompts::{KEYWORDS_PROMPT_TEMPLATE, KEYWORDS_SYSTEM};
use crate::llm_client::GenerationClient;

#[derive(Clone)]
pub struct KeywordExtractor {
    client: GenerationClient,
}

impl KeywordExtractor {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    /// One generation call; the reply is read as a comma-separated list in relevance order.
    pub async fn extract(
        &self,
        job_description: &str,
        model_id: &str,
        api_key: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let prompt = KEYWORDS_PROMPT_TEMPLATE.replace("{job_description}", job_description);
        let text = self
            .client
            .generate(&prompt, KEYWORDS_SYSTEM, model_id, api_key)
            .await?;
        Ok(parse_keywords(&text))
    }
}

/// Splits on commas, trims each segment and drops the empty ones.
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{gemini_error, gemini_ok, StubTransport};

    #[test]
    fn test_parse_keywords_trims_and_keeps_order() {
        assert_eq!(parse_keywords("Python, Go, SQL"), vec!["Python", "Go", "SQL"]);
    }

    #[test]
    fn test_parse_keywords_drops_empty_segments() {
        assert_eq!(
            parse_keywords(" Rust,, ,Kubernetes ,\nCI/CD,"),
            vec!["Rust", "Kubernetes", "CI/CD"]
        );
        assert!(parse_keywords(" , ").is_empty());
    }

    #[tokio::test]
    async fn test_extract_sends_job_description() {
        let transport = Arc::new(StubTransport::new(vec![gemini_ok("Python, Go, SQL\n")]));
        let extractor = KeywordExtractor::new(GenerationClient::new(transport.clone()));

        let keywords = extractor
            .extract("Backend role using Python and Go", "m", "key")
            .await
            .unwrap();

        assert_eq!(keywords, vec!["Python", "Go", "SQL"]);
        let requests = transport.requests();
        let prompt = requests[0].body.contents[0].parts[0].text.clone().unwrap();
        assert!(prompt.ends_with("Backend role using Python and Go"));
        assert_eq!(
            requests[0].body.system_instruction.parts[0].text.as_deref(),
            Some(KEYWORDS_SYSTEM)
        );
    }

    #[tokio::test]
    async fn test_extract_propagates_remote_failure() {
        let transport = Arc::new(StubTransport::new(vec![gemini_error(429, "quota")]));
        let extractor = KeywordExtractor::new(GenerationClient::new(transport));

        let result = extractor.extract("jd", "m", "key").await;
        assert!(matches!(result, Err(PipelineError::RemoteFailure { .. })));
    }
}
