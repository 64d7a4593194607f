use crate::{decode_layers, validate_key, LayerError};

const KEYS_PREFIX: &str = "    keys = [";
const EXEC_PREFIX: &str = "exec(decode('";

/// Python loader for `payload`. `keys` are in round order and are written
/// reversed so the loader undoes the last round first.
pub fn render_loader(payload: &str, keys: &[String]) -> String {
    let key_list = keys
        .iter()
        .rev()
        .map(|key| format!("'{}'", key))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "import base64\n\
         def decode(data):\n\
         {KEYS_PREFIX}{key_list}]\n\
         \x20   for key in keys:\n\
         \x20       data = base64.b64decode(data)\n\
         \x20       data = bytes(b ^ ord(key[i % len(key)]) for i, b in enumerate(data))\n\
         \x20   return data.decode()\n\
         \n\
         {EXEC_PREFIX}{payload}'))\n"
    )
}

/// Pulls the payload and the round-ordered keys back out of a loader
/// produced by [`render_loader`].
pub fn parse_loader(loader: &str) -> Result<(String, Vec<String>), LayerError> {
    let mut keys = None;
    let mut payload = None;
    for line in loader.lines() {
        if let Some(rest) = line.strip_prefix(KEYS_PREFIX) {
            let list = rest
                .strip_suffix(']')
                .ok_or_else(|| LayerError::MalformedLoader("unterminated key list".into()))?;
            let parsed = list
                .split(", ")
                .map(|item| {
                    item.strip_prefix('\'')
                        .and_then(|item| item.strip_suffix('\''))
                        .map(str::to_string)
                        .ok_or_else(|| {
                            LayerError::MalformedLoader(format!("bad key literal {item}"))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            keys = Some(parsed);
        } else if let Some(rest) = line.strip_prefix(EXEC_PREFIX) {
            let encoded = rest
                .strip_suffix("'))")
                .ok_or_else(|| LayerError::MalformedLoader("unterminated payload".into()))?;
            payload = Some(encoded.to_string());
        }
    }
    let mut keys = keys.ok_or_else(|| LayerError::MalformedLoader("no key list".into()))?;
    let payload = payload.ok_or_else(|| LayerError::MalformedLoader("no payload".into()))?;
    for key in &keys {
        validate_key(key)?;
    }
    keys.reverse();
    Ok((payload, keys))
}

/// Recovers the original text from a multi-layer loader.
pub fn decode_loader(loader: &str) -> Result<String, LayerError> {
    let (payload, keys) = parse_loader(loader)?;
    decode_layers(&payload, &keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MultiLayerEncoder;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn loader_lists_keys_in_reverse_round_order() {
        let keys = vec!["secret".to_string(), "key123".to_string()];
        let loader = render_loader("QUJD", &keys);
        let expected = "\
import base64
def decode(data):
    keys = ['key123', 'secret']
    for key in keys:
        data = base64.b64decode(data)
        data = bytes(b ^ ord(key[i % len(key)]) for i, b in enumerate(data))
    return data.decode()

exec(decode('QUJD'))
";
        assert_eq!(loader, expected);
    }

    #[test]
    fn loader_decodes_back_to_source() {
        let encoder = MultiLayerEncoder::new(4);
        let output = encoder
            .encode_with_rng("for i in range(3):\n    print(i)\n", &mut StdRng::seed_from_u64(3))
            .unwrap();
        let (payload, keys) = parse_loader(&output.loader).unwrap();
        assert_eq!(payload, output.payload);
        assert_eq!(keys, output.keys);
        assert_eq!(
            decode_loader(&output.loader).unwrap(),
            "for i in range(3):\n    print(i)\n"
        );
    }

    #[test]
    fn rejects_text_that_is_not_a_loader() {
        assert!(matches!(
            decode_loader("print('hi')\n"),
            Err(LayerError::MalformedLoader(_))
        ));
    }
}
