mod normalize;
mod relay;
mod types;
mod upstream;

pub use normalize::{
    Normalizer, OUTPUTS_ROUTE, OutputStore, decode_data_uri, encode_data_uri, extension_for,
};
pub use relay::ImageRelay;
pub use types::{GeneratedImage, GenerationRequest, GenerationResponse, ValidatedRequest};
pub use upstream::{
    Dispatcher, HttpTransport, Route, Transport, UpstreamPayload, UpstreamReply, UpstreamRequest,
    interpret_reply, normalize_reference,
};
