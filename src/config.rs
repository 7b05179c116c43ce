use std::{
    env, fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
};

pub const DEFAULT_TEXT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-dev";
pub const DEFAULT_REFERENCE_ENDPOINT: &str =
    "https://router.huggingface.co/fal-ai/fal-ai/flux-kontext/dev?_subdomain=queue";

const DEFAULT_BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Static bearer credential sent with every upstream call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("ApiToken(<unset>)")
        } else {
            f.write_str("ApiToken(<redacted>)")
        }
    }
}

/// How generated images are handed back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Binary results become a data URI; remote URLs are passed through.
    #[default]
    Inline,
    /// Remote URLs are fetched once and re-encoded as a data URI.
    Embed,
    /// Every result is written to the output directory and also returned inline.
    Persist,
}

impl FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(OutputMode::Inline),
            "embed" => Ok(OutputMode::Embed),
            "persist" | "save" => Ok(OutputMode::Persist),
            other => anyhow::bail!("unknown OUTPUT_MODE '{other}' (expected inline, embed or persist)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
    pub strength: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            guidance_scale: 3.5,
            num_inference_steps: 28,
            strength: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub api_token: ApiToken,
    pub text_endpoint: String,
    pub reference_endpoint: String,
    pub output_mode: OutputMode,
    pub output_dir: PathBuf,
    pub index_path: PathBuf,
    pub params: GenerationParams,
    pub body_limit_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            api_token: ApiToken::default(),
            text_endpoint: DEFAULT_TEXT_ENDPOINT.to_string(),
            reference_endpoint: DEFAULT_REFERENCE_ENDPOINT.to_string(),
            output_mode: OutputMode::default(),
            output_dir: PathBuf::from("outputs"),
            index_path: PathBuf::from("static/index.html"),
            params: GenerationParams::default(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let listen_addr = env::var("SERVER_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.listen_addr);

        let api_token = ApiToken::new(env::var("HF_TOKEN").unwrap_or_default());

        let text_endpoint = env::var("TEXT_ENDPOINT").unwrap_or(defaults.text_endpoint);
        let reference_endpoint =
            env::var("REFERENCE_ENDPOINT").unwrap_or(defaults.reference_endpoint);

        let output_mode = match env::var("OUTPUT_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.output_mode,
        };
        let output_dir = env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);
        let index_path = env::var("INDEX_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.index_path);

        let guidance_scale = env::var("GUIDANCE_SCALE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.params.guidance_scale);
        let num_inference_steps = env::var("INFERENCE_STEPS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.params.num_inference_steps);
        let strength = env::var("REFERENCE_STRENGTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.params.strength);

        let body_limit_bytes = env::var("BODY_LIMIT_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit_bytes);

        Ok(Self {
            listen_addr,
            api_token,
            text_endpoint,
            reference_endpoint,
            output_mode,
            output_dir,
            index_path,
            params: GenerationParams {
                guidance_scale,
                num_inference_steps,
                strength,
            },
            body_limit_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_mode_parses_known_values() {
        assert_eq!("inline".parse::<OutputMode>().unwrap(), OutputMode::Inline);
        assert_eq!(" Embed ".parse::<OutputMode>().unwrap(), OutputMode::Embed);
        assert_eq!("persist".parse::<OutputMode>().unwrap(), OutputMode::Persist);
        assert_eq!("save".parse::<OutputMode>().unwrap(), OutputMode::Persist);
        assert!("disk".parse::<OutputMode>().is_err());
    }

    #[test]
    fn token_debug_never_shows_the_secret() {
        let token = ApiToken::new("hf_secret_value");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("hf_secret_value"));
        assert_eq!(token.bearer(), "Bearer hf_secret_value");
        assert!(ApiToken::new("   ").is_empty());
    }

    #[test]
    fn defaults_match_upstream_parameters() {
        let config = AppConfig::default();
        assert_eq!(config.params.guidance_scale, 3.5);
        assert_eq!(config.params.num_inference_steps, 28);
        assert_eq!(config.params.strength, 0.7);
        assert_eq!(config.output_mode, OutputMode::Inline);
        assert_eq!(config.body_limit_bytes, 52_428_800);
    }
}
