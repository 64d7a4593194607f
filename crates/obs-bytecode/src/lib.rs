use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

mod loader;

pub use loader::{extract_unit, render_loader, LOADER_FILENAME};

pub const UNIT_MAGIC: [u8; 4] = *b"OBPY";
pub const UNIT_VERSION: u32 = 1;
/// Magic plus little-endian version; the loader slices this many bytes off.
pub const UNIT_HEADER_LEN: usize = 8;
pub const CPYTHON_RUNTIME: &str = "cpython";

/// Precompiled program ready to be embedded in a loader. The payload is the
/// zlib-compressed program text the target runtime compiles on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadableUnit {
    pub runtime: String,
    pub version: u32,
    pub payload: Vec<u8>,
}

impl LoadableUnit {
    pub fn from_source(runtime: impl Into<String>, source: &str) -> Result<Self, BytecodeError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(source.as_bytes())?;
        let payload = encoder.finish()?;
        debug!(
            source_len = source.len(),
            payload_len = payload.len(),
            "compressed loadable unit"
        );
        Ok(Self {
            runtime: runtime.into(),
            version: UNIT_VERSION,
            payload,
        })
    }

    pub fn source(&self) -> Result<String, BytecodeError> {
        let mut decoder = ZlibDecoder::new(self.payload.as_slice());
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes)?;
        String::from_utf8(bytes).map_err(|err| BytecodeError::Format {
            message: format!("unit payload is not utf-8: {}", err),
        })
    }
}

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("compile failed: {message}")]
    Compile { message: String },
    #[error("compression failed: {0}")]
    Compress(#[from] std::io::Error),
    #[error("bytecode format error: {message}")]
    Format { message: String },
    #[error("loader decode failed: {message}")]
    Decode { message: String },
}

impl BytecodeError {
    pub fn compile(message: impl Into<String>) -> Self {
        BytecodeError::Compile {
            message: message.into(),
        }
    }
}

/// Compiles program text for one target runtime.
pub trait CompileToLoadableUnit: Send + Sync {
    fn runtime(&self) -> &'static str;

    fn compile(&self, source: &str) -> Result<LoadableUnit, BytecodeError>;
}

pub fn encode_unit(unit: &LoadableUnit) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(UNIT_HEADER_LEN + unit.payload.len());
    encoded.extend_from_slice(&UNIT_MAGIC);
    encoded.extend_from_slice(&unit.version.to_le_bytes());
    encoded.extend_from_slice(&unit.payload);
    encoded
}

pub fn decode_unit(bytes: &[u8]) -> Result<LoadableUnit, BytecodeError> {
    if bytes.len() < UNIT_HEADER_LEN {
        return Err(BytecodeError::Format {
            message: "unit header too short".to_string(),
        });
    }
    let magic = &bytes[..4];
    if magic != UNIT_MAGIC {
        return Err(BytecodeError::Format {
            message: "invalid unit magic".to_string(),
        });
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != UNIT_VERSION {
        return Err(BytecodeError::Format {
            message: format!(
                "unsupported unit version {}, expected {}",
                version, UNIT_VERSION
            ),
        });
    }
    Ok(LoadableUnit {
        runtime: CPYTHON_RUNTIME.to_string(),
        version,
        payload: bytes[UNIT_HEADER_LEN..].to_vec(),
    })
}
