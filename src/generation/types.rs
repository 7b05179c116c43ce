use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Body of `POST /api/generate` as the client sent it.
#[derive(Debug, Default, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, rename = "referenceImage")]
    pub reference_image: Option<String>,
}

/// A request that passed validation: the prompt is present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub prompt: String,
    pub reference_image: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            reference_image: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference_image = Some(reference.into());
        self
    }

    pub fn validate(self) -> Result<ValidatedRequest, ServiceError> {
        let prompt = match self.prompt {
            Some(prompt) if !prompt.trim().is_empty() => prompt,
            _ => return Err(ServiceError::InvalidInput("prompt is required".into())),
        };
        let reference_image = self
            .reference_image
            .filter(|reference| !reference.trim().is_empty());

        Ok(ValidatedRequest {
            prompt,
            reference_image,
        })
    }
}

/// The image handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GeneratedImage {
    Inline {
        #[serde(rename = "imageBase64")]
        image_base64: String,
    },
    Saved {
        #[serde(rename = "fileName")]
        file_name: String,
        path: String,
        #[serde(rename = "imageBase64")]
        image_base64: String,
    },
    Remote {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
}

impl GeneratedImage {
    pub fn kind(&self) -> &'static str {
        match self {
            GeneratedImage::Inline { .. } => "inline",
            GeneratedImage::Saved { .. } => "saved",
            GeneratedImage::Remote { .. } => "remote",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(flatten)]
    pub image: GeneratedImage,
}

impl GenerationResponse {
    pub fn success(image: GeneratedImage) -> Self {
        Self {
            success: true,
            image,
        }
    }
}
