pub mod prompt;

use std::sync::Arc;

use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use tracing::{debug, info};

use common::{
    error::AppError, storage::store::IndexStore, utils::embedding::EmbeddingProvider,
    OpenAIClientType,
};

use crate::prompt::{create_user_message, ANSWER_SYSTEM_PROMPT};

/// Chunks retrieved per question. Matches the similarity-search default of
/// the stack this replaces; deliberately not configurable.
pub const RETRIEVAL_TOP_K: usize = 4;

pub struct RetrievalPipeline {
    store: Arc<dyn IndexStore>,
    embedding_provider: Arc<EmbeddingProvider>,
    openai_client: Arc<OpenAIClientType>,
    chat_model: String,
}

impl RetrievalPipeline {
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedding_provider: Arc<EmbeddingProvider>,
        openai_client: Arc<OpenAIClientType>,
        chat_model: String,
    ) -> Self {
        Self {
            store,
            embedding_provider,
            openai_client,
            chat_model,
        }
    }

    /// Answers a question against the session's index: validate, load, embed
    /// the question, retrieve the top-K chunks, and stuff them into a single
    /// chat completion request.
    pub async fn answer(
        &self,
        session_id: Option<&str>,
        prompt: &str,
    ) -> Result<String, AppError> {
        if prompt.trim().is_empty() {
            return Err(AppError::Validation("No prompt provided".into()));
        }

        let session_id =
            session_id.ok_or_else(|| AppError::Validation("Session not found".into()))?;

        let index = match self.store.get(session_id).await {
            Ok(index) => index,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::NotFound(
                    "No uploaded file for this session".into(),
                ));
            }
            Err(err) => return Err(err),
        };

        // A backend change between upload and question leaves a stale index
        // whose vectors cannot be compared against fresh query embeddings.
        if index.embedding_dimension != self.embedding_provider.dimension() {
            return Err(AppError::Processing(format!(
                "index was built with {}-dimensional embeddings but the active backend produces {}",
                index.embedding_dimension,
                self.embedding_provider.dimension()
            )));
        }

        let query_embedding = self.embedding_provider.embed(prompt).await?;
        let retrieved = index.search(&query_embedding, RETRIEVAL_TOP_K);
        debug!(
            %session_id,
            retrieved = retrieved.len(),
            top_score = retrieved.first().map_or(0.0, |chunk| chunk.score),
            "retrieved context chunks"
        );

        let request =
            create_chat_request(&self.chat_model, create_user_message(&retrieved, prompt))?;
        let response = self.openai_client.chat().create(request).await?;
        let answer = process_llm_response(response)?;

        info!(%session_id, answer_chars = answer.len(), "answered question");
        Ok(answer)
    }
}

fn create_chat_request(
    model: &str,
    user_message: String,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(ANSWER_SYSTEM_PROMPT).into(),
            ChatCompletionRequestUserMessage::from(user_message).into(),
        ])
        .build()
}

fn process_llm_response(response: CreateChatCompletionResponse) -> Result<String, AppError> {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .ok_or_else(|| AppError::LLMParsing("No content found in LLM response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::{index::VectorIndex, store::MemoryIndexStore};

    fn pipeline_with(store: Arc<dyn IndexStore>, dimension: usize) -> RetrievalPipeline {
        let provider =
            Arc::new(EmbeddingProvider::new_hashed(dimension).expect("hashed provider"));
        // Points at nothing; the tests below never reach the chat call.
        let client = Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key("test-key")
                .with_api_base("http://localhost:9"),
        ));
        RetrievalPipeline::new(store, provider, client, "test-model".to_string())
    }

    #[tokio::test]
    async fn rejects_empty_prompt() {
        let pipeline = pipeline_with(Arc::new(MemoryIndexStore::new()), 16);
        let err = pipeline
            .answer(Some("session-a"), "   ")
            .await
            .expect_err("expected rejection");
        assert!(matches!(&err, AppError::Validation(msg) if msg == "No prompt provided"));
    }

    #[tokio::test]
    async fn rejects_missing_session() {
        let pipeline = pipeline_with(Arc::new(MemoryIndexStore::new()), 16);
        let err = pipeline
            .answer(None, "a real question")
            .await
            .expect_err("expected rejection");
        assert!(matches!(&err, AppError::Validation(msg) if msg == "Session not found"));
    }

    #[tokio::test]
    async fn rejects_session_without_upload() {
        let pipeline = pipeline_with(Arc::new(MemoryIndexStore::new()), 16);
        let err = pipeline
            .answer(Some("session-a"), "a real question")
            .await
            .expect_err("expected rejection");
        assert!(
            matches!(&err, AppError::NotFound(msg) if msg == "No uploaded file for this session")
        );
    }

    #[tokio::test]
    async fn rejects_index_with_stale_dimension() {
        let store = Arc::new(MemoryIndexStore::new());
        store
            .put(
                "session-a",
                &VectorIndex::new("hashed", 8, vec![("text".into(), vec![0.0; 8])]),
            )
            .await
            .expect("put");

        let pipeline = pipeline_with(store, 16);
        let err = pipeline
            .answer(Some("session-a"), "a real question")
            .await
            .expect_err("expected rejection");
        assert!(matches!(err, AppError::Processing(_)));
    }

    #[test]
    fn chat_request_carries_model_and_messages() {
        let request =
            create_chat_request("test-model", "the user message".to_string()).expect("request");
        assert_eq!(request.model, "test-model");
        assert_eq!(request.messages.len(), 2);
    }

    #[test]
    fn llm_response_content_is_extracted() {
        let response: CreateChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "the answer" },
                "finish_reason": "stop",
                "logprobs": null
            }]
        }))
        .expect("response fixture");

        assert_eq!(
            process_llm_response(response).expect("content"),
            "the answer"
        );
    }

    #[test]
    fn llm_response_without_content_is_an_error() {
        let response: CreateChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-2",
            "object": "chat.completion",
            "created": 0,
            "model": "test-model",
            "choices": []
        }))
        .expect("response fixture");

        assert!(matches!(
            process_llm_response(response),
            Err(AppError::LLMParsing(_))
        ));
    }
}
