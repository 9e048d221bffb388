use serde::{Deserialize, Serialize};

use crate::compressor::{CompressionConfig, EncoderConfig};
use crate::publish::PublishPolicy;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub publish: PublishPolicy,
}
