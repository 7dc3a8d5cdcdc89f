use serde_json::Value;

/// Renders the raw bytes of a temporal cell that could not be decoded into a date or time.
///
/// MySQL zero dates such as `0000-00-00 00:00:00` have no calendar representation. Over the
/// text protocol they arrive as readable text, which is kept verbatim. Over the binary
/// protocol they arrive as an empty value, which becomes `null`, as does anything that is not
/// printable text.
pub fn raw_temporal_value(raw: Option<&[u8]>) -> Value {
    let Some(bytes) = raw.filter(|bytes| !bytes.is_empty()) else {
        return Value::Null;
    };

    match std::str::from_utf8(bytes) {
        Ok(text) if text.chars().all(|c| c.is_ascii_graphic() || c == ' ') => {
            Value::String(text.to_string())
        }
        _ => Value::Null,
    }
}
