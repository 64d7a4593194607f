//! Repeated XOR-then-base64 wrapping of a whole source text, with a Python
//! loader that peels the rounds off again at run time.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

mod loader;

pub use loader::{decode_loader, parse_loader, render_loader};

pub const DEFAULT_LAYERS: usize = 3;
pub const DEFAULT_KEY_POOL: [&str; 3] = ["secret", "password", "key123"];

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("layer count must be at least 1")]
    NoLayers,
    #[error("key pool is empty")]
    EmptyKeyPool,
    #[error("keys must not be empty")]
    EmptyKey,
    #[error("key {key:?} must be printable ASCII without quotes or backslashes")]
    InvalidKey { key: String },
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded payload is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("malformed loader: {0}")]
    MalformedLoader(String),
}

/// Result of one encode call. `keys` lists the key used in each round, in
/// round order; the loader embeds them reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiLayerOutput {
    pub loader: String,
    pub payload: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLayerEncoder {
    layers: usize,
    key_pool: Vec<String>,
}

impl Default for MultiLayerEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_LAYERS)
    }
}

impl MultiLayerEncoder {
    pub fn new(layers: usize) -> Self {
        Self {
            layers,
            key_pool: DEFAULT_KEY_POOL.iter().map(|key| key.to_string()).collect(),
        }
    }

    pub fn with_key_pool<I, S>(mut self, pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_pool = pool.into_iter().map(Into::into).collect();
        self
    }

    pub fn encode(&self, source: &str) -> Result<MultiLayerOutput, LayerError> {
        self.encode_with_rng(source, &mut rand::thread_rng())
    }

    /// Same as [`encode`](Self::encode) with a caller-supplied random source,
    /// so tests can replay key choices.
    pub fn encode_with_rng<R: Rng + ?Sized>(
        &self,
        source: &str,
        rng: &mut R,
    ) -> Result<MultiLayerOutput, LayerError> {
        self.validate()?;
        let mut current = source.as_bytes().to_vec();
        let mut keys = Vec::with_capacity(self.layers);
        for _ in 0..self.layers {
            let key = self
                .key_pool
                .choose(rng)
                .ok_or(LayerError::EmptyKeyPool)?;
            current = STANDARD
                .encode(xor_with_key(&current, key.as_bytes()))
                .into_bytes();
            keys.push(key.clone());
        }
        let payload = String::from_utf8(current)?;
        debug!(
            layers = self.layers,
            payload_len = payload.len(),
            "encoded multi-layer payload"
        );
        Ok(MultiLayerOutput {
            loader: render_loader(&payload, &keys),
            payload,
            keys,
        })
    }

    fn validate(&self) -> Result<(), LayerError> {
        if self.layers == 0 {
            return Err(LayerError::NoLayers);
        }
        if self.key_pool.is_empty() {
            return Err(LayerError::EmptyKeyPool);
        }
        self.key_pool.iter().try_for_each(|key| validate_key(key))
    }
}

/// Keys end up inside a single-quoted Python literal in the loader.
pub fn validate_key(key: &str) -> Result<(), LayerError> {
    if key.is_empty() {
        return Err(LayerError::EmptyKey);
    }
    let printable = key
        .bytes()
        .all(|b| (0x20..=0x7e).contains(&b) && b != b'\'' && b != b'\\');
    if !printable {
        return Err(LayerError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// `data[i] ^ key[i % key.len()]`. An empty key leaves the data unchanged.
pub fn xor_with_key(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

/// Reverses [`MultiLayerEncoder::encode`]; `keys` are in round order.
pub fn decode_layers(payload: &str, keys: &[String]) -> Result<String, LayerError> {
    let mut current = payload.as_bytes().to_vec();
    for key in keys.iter().rev() {
        validate_key(key)?;
        current = xor_with_key(&STANDARD.decode(&current)?, key.as_bytes());
    }
    Ok(String::from_utf8(current)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn two_layers_round_trip() {
        let encoder = MultiLayerEncoder::new(2);
        let mut rng = StdRng::seed_from_u64(7);
        let output = encoder.encode_with_rng("print('hi')", &mut rng).unwrap();
        assert_eq!(output.keys.len(), 2);
        assert!(output
            .keys
            .iter()
            .all(|key| DEFAULT_KEY_POOL.contains(&key.as_str())));
        assert_eq!(decode_layers(&output.payload, &output.keys).unwrap(), "print('hi')");
    }

    #[test]
    fn seeded_encoding_is_reproducible() {
        let encoder = MultiLayerEncoder::default();
        let first = encoder
            .encode_with_rng("x = 1\n", &mut StdRng::seed_from_u64(42))
            .unwrap();
        let second = encoder
            .encode_with_rng("x = 1\n", &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_ascii_source_survives() {
        let encoder = MultiLayerEncoder::new(3).with_key_pool(["k"]);
        let output = encoder.encode("print('héllo ✓')\n").unwrap();
        assert_eq!(output.keys, vec!["k", "k", "k"]);
        assert_eq!(
            decode_layers(&output.payload, &output.keys).unwrap(),
            "print('héllo ✓')\n"
        );
    }

    #[test]
    fn single_round_matches_manual_xor() {
        let encoder = MultiLayerEncoder::new(1).with_key_pool(["ab"]);
        let output = encoder.encode("abc").unwrap();
        // 'a'^'a', 'b'^'b', 'c'^'a'
        assert_eq!(output.payload, STANDARD.encode([0u8, 0, 2]));
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            MultiLayerEncoder::new(0).encode("x"),
            Err(LayerError::NoLayers)
        ));
        assert!(matches!(
            MultiLayerEncoder::new(1)
                .with_key_pool(Vec::<String>::new())
                .encode("x"),
            Err(LayerError::EmptyKeyPool)
        ));
        assert!(matches!(
            MultiLayerEncoder::new(1).with_key_pool([""]).encode("x"),
            Err(LayerError::EmptyKey)
        ));
        assert!(matches!(
            MultiLayerEncoder::new(1).with_key_pool(["it's"]).encode("x"),
            Err(LayerError::InvalidKey { .. })
        ));
    }

    #[test]
    fn decoding_garbage_fails_explicitly() {
        let keys = vec!["secret".to_string()];
        assert!(matches!(
            decode_layers("not base64!", &keys),
            Err(LayerError::Base64(_))
        ));
    }
}
