use std::sync::Arc;

use common::{
    storage::store::IndexStore,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
    OpenAIClientType,
};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::RetrievalPipeline;

use crate::session::{create_session_store, SessionStoreType};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub index_store: Arc<dyn IndexStore>,
    pub ingestion: Arc<IngestionPipeline>,
    pub retrieval: Arc<RetrievalPipeline>,
    pub session_store: Arc<SessionStoreType>,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        embedding_provider: Arc<EmbeddingProvider>,
        openai_client: Arc<OpenAIClientType>,
        index_store: Arc<dyn IndexStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session_store = Arc::new(create_session_store(&config.secret_key).await?);

        let ingestion = Arc::new(IngestionPipeline::new(embedding_provider.clone()));
        let retrieval = Arc::new(RetrievalPipeline::new(
            index_store.clone(),
            embedding_provider,
            openai_client,
            config.chat_model.clone(),
        ));

        Ok(Self {
            config: config.clone(),
            index_store,
            ingestion,
            retrieval,
            session_store,
        })
    }
}
