use std::sync::Arc;

use tracing::info;

use crate::{
    config::{AppConfig, OutputMode},
    error::ServiceError,
    generation::{
        normalize::{Normalizer, OutputStore},
        types::{GeneratedImage, GenerationRequest},
        upstream::{Dispatcher, HttpTransport, Transport, UpstreamRequest},
    },
};

/// Validate, dispatch and normalize one generation request.
pub struct ImageRelay {
    dispatcher: Dispatcher,
    normalizer: Normalizer,
}

impl ImageRelay {
    pub fn initialize(config: &AppConfig) -> Result<Self, ServiceError> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(config, transport.clone());
        let normalizer = Normalizer::new(
            config.output_mode,
            OutputStore::new(config.output_dir.clone()),
            transport,
        );
        Self {
            dispatcher,
            normalizer,
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        self.normalizer.mode()
    }

    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedImage, ServiceError> {
        let request = request.validate()?;
        info!(
            prompt = %request.prompt,
            has_reference = request.reference_image.is_some(),
            "generating image"
        );

        let upstream = UpstreamRequest::select(request);
        let payload = self.dispatcher.dispatch(&upstream).await?;
        let image = self.normalizer.normalize(payload).await?;

        info!(route = upstream.route().as_str(), kind = image.kind(), "image generated");
        Ok(image)
    }
}
