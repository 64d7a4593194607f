//! The two-line Python stub that unpacks and runs an embedded unit.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::{decode_unit, encode_unit, BytecodeError, LoadableUnit};

/// Filename the loaded code reports in tracebacks.
pub const LOADER_FILENAME: &str = "<obscura>";

const PAYLOAD_START: &str = "b64decode('";
const PAYLOAD_END: &str = "')";

pub fn render_loader(unit: &LoadableUnit) -> String {
    let encoded = STANDARD.encode(encode_unit(unit));
    format!(
        "import base64, zlib\nexec(compile(zlib.decompress(base64.b64decode('{}')[8:]), '{}', 'exec'))\n",
        encoded, LOADER_FILENAME
    )
}

/// Recovers the unit embedded in a loader produced by [`render_loader`].
pub fn extract_unit(loader: &str) -> Result<LoadableUnit, BytecodeError> {
    let start = loader
        .find(PAYLOAD_START)
        .map(|idx| idx + PAYLOAD_START.len())
        .ok_or_else(|| BytecodeError::Decode {
            message: "no embedded payload found".to_string(),
        })?;
    let len = loader[start..]
        .find(PAYLOAD_END)
        .ok_or_else(|| BytecodeError::Decode {
            message: "unterminated payload literal".to_string(),
        })?;
    let bytes = STANDARD
        .decode(&loader[start..start + len])
        .map_err(|err| BytecodeError::Decode {
            message: err.to_string(),
        })?;
    decode_unit(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CPYTHON_RUNTIME;
    use pretty_assertions::assert_eq;

    #[test]
    fn loader_is_two_lines_and_round_trips() {
        let unit = LoadableUnit::from_source(CPYTHON_RUNTIME, "x = 1\nprint(x)\n").unwrap();
        let loader = render_loader(&unit);
        let lines = loader.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "import base64, zlib");
        assert!(lines[1].starts_with("exec(compile(zlib.decompress(base64.b64decode('"));
        assert!(lines[1].ends_with("')[8:]), '<obscura>', 'exec'))"));

        let extracted = extract_unit(&loader).unwrap();
        assert_eq!(extracted.source().unwrap(), "x = 1\nprint(x)\n");
    }

    #[test]
    fn plain_source_is_not_a_loader() {
        assert!(matches!(
            extract_unit("print('hi')\n"),
            Err(BytecodeError::Decode { .. })
        ));
    }
}
