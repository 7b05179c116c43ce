use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};
use tracing::{info, warn};

use crate::{
    config::OutputMode,
    error::ServiceError,
    generation::{
        types::GeneratedImage,
        upstream::{FALLBACK_MIME, Transport, UpstreamPayload},
    },
};

/// URL prefix under which saved images are served.
pub const OUTPUTS_ROUTE: &str = "/outputs";

const FILE_PREFIX: &str = "flux_output_";
const MAX_NAME_ATTEMPTS: u32 = 16;

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Splits a `data:<mime>;base64,<payload>` URI back into mime and bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Directory that receives persisted images. Created on first write.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `bytes` under a timestamped name and returns the file name.
    /// Existing files are never overwritten; a numeric suffix is tried instead.
    pub async fn save(&self, bytes: &[u8], mime: &str) -> Result<String, ServiceError> {
        fs::create_dir_all(&self.dir).await?;

        let stamp = Utc::now().timestamp_millis();
        let ext = extension_for(mime);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                format!("{FILE_PREFIX}{stamp}.{ext}")
            } else {
                format!("{FILE_PREFIX}{stamp}_{attempt}.{ext}")
            };
            let path = self.dir.join(&file_name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    write_or_discard(file, &path, bytes).await?;
                    info!(path = %path.display(), bytes = bytes.len(), "saved generated image");
                    return Ok(file_name);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::Io(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free output file name for timestamp {stamp}"),
        )))
    }
}

/// Writes all of `bytes`; on failure the partially written file at `path` is removed.
async fn write_or_discard<W>(mut writer: W, path: &Path, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %cleanup, "failed to remove partial output");
        }
        return Err(err);
    }
    Ok(())
}

/// Turns an upstream payload into the shape returned to the caller.
pub struct Normalizer {
    mode: OutputMode,
    store: OutputStore,
    transport: Arc<dyn Transport>,
}

impl Normalizer {
    pub fn new(mode: OutputMode, store: OutputStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            mode,
            store,
            transport,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub async fn normalize(
        &self,
        payload: UpstreamPayload,
    ) -> Result<GeneratedImage, ServiceError> {
        match payload {
            UpstreamPayload::Binary { bytes, mime } => self.deliver(&bytes, &mime).await,
            UpstreamPayload::RemoteUrl(url) if self.mode == OutputMode::Inline => {
                Ok(GeneratedImage::Remote { image_url: url })
            }
            UpstreamPayload::RemoteUrl(url) => {
                let (bytes, mime) = self.download(&url).await?;
                self.deliver(&bytes, &mime).await
            }
        }
    }

    async fn deliver(&self, bytes: &[u8], mime: &str) -> Result<GeneratedImage, ServiceError> {
        let image_base64 = encode_data_uri(mime, bytes);
        if self.mode != OutputMode::Persist {
            return Ok(GeneratedImage::Inline { image_base64 });
        }

        let file_name = self.store.save(bytes, mime).await?;
        Ok(GeneratedImage::Saved {
            path: format!("{OUTPUTS_ROUTE}/{file_name}"),
            file_name,
            image_base64,
        })
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), ServiceError> {
        info!(%url, "downloading remote image");
        let reply = self.transport.get(url).await?;
        if !reply.is_success() {
            return Err(ServiceError::UpstreamStatus {
                status: reply.status,
                body: String::from_utf8_lossy(&reply.body).trim().to_string(),
            });
        }
        if reply.body.is_empty() {
            return Err(ServiceError::UpstreamFailure(
                "remote image download returned no data".into(),
            ));
        }
        let mime = reply
            .image_mime()
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        Ok((reply.body, mime))
    }
}
