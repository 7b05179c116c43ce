use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    config::{ApiToken, AppConfig, GenerationParams},
    error::ServiceError,
    generation::types::ValidatedRequest,
};

pub(crate) const FALLBACK_MIME: &str = "image/png";

/// Raw outcome of one outbound HTTP call.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn looks_like_json(&self) -> bool {
        match self.content_type.as_deref() {
            Some(content_type) => content_type.to_ascii_lowercase().contains("json"),
            None => self
                .body
                .iter()
                .find(|byte| !byte.is_ascii_whitespace())
                .is_some_and(|byte| *byte == b'{'),
        }
    }

    pub(crate) fn image_mime(&self) -> Option<String> {
        let content_type = self.content_type.as_deref()?;
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        mime.starts_with("image/").then_some(mime)
    }
}

/// Outbound HTTP used by the dispatcher and by the normalizer when it has to
/// download a remote result.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        endpoint: &str,
        token: &ApiToken,
        body: &Value,
    ) -> Result<UpstreamReply, ServiceError>;

    async fn get(&self, url: &str) -> Result<UpstreamReply, ServiceError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    async fn read_reply(response: reqwest::Response) -> Result<UpstreamReply, ServiceError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        endpoint: &str,
        token: &ApiToken,
        body: &Value,
    ) -> Result<UpstreamReply, ServiceError> {
        let mut request = self.client.post(endpoint).json(body);
        if !token.is_empty() {
            request = request.header(AUTHORIZATION, token.bearer());
        }
        let response = request.send().await?;
        Self::read_reply(response).await
    }

    async fn get(&self, url: &str) -> Result<UpstreamReply, ServiceError> {
        let response = self.client.get(url).send().await?;
        Self::read_reply(response).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Text,
    Reference,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Text => "text-to-image",
            Route::Reference => "image-to-image",
        }
    }
}

/// The outbound request shape chosen for a validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamRequest {
    TextToImage { prompt: String },
    ImageToImage { prompt: String, reference: String },
}

impl UpstreamRequest {
    pub fn select(request: ValidatedRequest) -> Self {
        match request.reference_image {
            Some(reference) => UpstreamRequest::ImageToImage {
                prompt: request.prompt,
                reference: normalize_reference(&reference),
            },
            None => UpstreamRequest::TextToImage {
                prompt: request.prompt,
            },
        }
    }

    pub fn route(&self) -> Route {
        match self {
            UpstreamRequest::TextToImage { .. } => Route::Text,
            UpstreamRequest::ImageToImage { .. } => Route::Reference,
        }
    }

    pub fn body(&self, params: &GenerationParams) -> Value {
        match self {
            UpstreamRequest::TextToImage { prompt } => json!({
                "inputs": prompt,
                "parameters": {
                    "guidance_scale": params.guidance_scale,
                    "num_inference_steps": params.num_inference_steps,
                }
            }),
            UpstreamRequest::ImageToImage { prompt, reference } => json!({
                "inputs": reference,
                "parameters": {
                    "prompt": prompt,
                    "strength": params.strength,
                }
            }),
        }
    }
}

/// Data URIs and remote URLs go upstream as-is; bare base64 is wrapped as PNG.
pub fn normalize_reference(raw: &str) -> String {
    let value = raw.trim();
    let lowered = value.to_ascii_lowercase();
    if lowered.starts_with("data:image/")
        || lowered.starts_with("http://")
        || lowered.starts_with("https://")
    {
        return value.to_string();
    }
    format!("data:{FALLBACK_MIME};base64,{value}")
}

/// What the upstream produced once its reply has been interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamPayload {
    Binary { bytes: Vec<u8>, mime: String },
    RemoteUrl(String),
}

pub fn interpret_reply(reply: UpstreamReply) -> Result<UpstreamPayload, ServiceError> {
    if !reply.is_success() {
        return Err(ServiceError::UpstreamStatus {
            status: reply.status,
            body: String::from_utf8_lossy(&reply.body).trim().to_string(),
        });
    }
    if reply.body.is_empty() {
        return Err(ServiceError::UpstreamFailure(
            "upstream returned an empty body".into(),
        ));
    }

    if reply.looks_like_json() {
        let value: Value = serde_json::from_slice(&reply.body).map_err(|err| {
            ServiceError::UpstreamFailure(format!("invalid upstream json: {err}"))
        })?;
        return extract_image_url(&value)
            .map(UpstreamPayload::RemoteUrl)
            .ok_or_else(|| ServiceError::UpstreamFailure("no image in upstream response".into()));
    }

    let mime = reply
        .image_mime()
        .unwrap_or_else(|| FALLBACK_MIME.to_string());
    Ok(UpstreamPayload::Binary {
        bytes: reply.body,
        mime,
    })
}

fn extract_image_url(value: &Value) -> Option<String> {
    value
        .pointer("/image/url")
        .or_else(|| value.pointer("/images/0/url"))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    token: ApiToken,
    text_endpoint: String,
    reference_endpoint: String,
    params: GenerationParams,
}

impl Dispatcher {
    pub fn new(config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            token: config.api_token.clone(),
            text_endpoint: config.text_endpoint.clone(),
            reference_endpoint: config.reference_endpoint.clone(),
            params: config.params.clone(),
        }
    }

    pub fn endpoint(&self, route: Route) -> &str {
        match route {
            Route::Text => &self.text_endpoint,
            Route::Reference => &self.reference_endpoint,
        }
    }

    pub async fn dispatch(
        &self,
        request: &UpstreamRequest,
    ) -> Result<UpstreamPayload, ServiceError> {
        let route = request.route();
        let endpoint = self.endpoint(route);
        info!(route = route.as_str(), %endpoint, "calling upstream");

        let reply = self
            .transport
            .post_json(endpoint, &self.token, &request.body(&self.params))
            .await?;
        debug!(status = reply.status, bytes = reply.body.len(), "upstream replied");

        interpret_reply(reply)
    }
}
