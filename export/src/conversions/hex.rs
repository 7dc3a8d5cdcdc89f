/// Renders a binary column as a `\x`-prefixed lowercase hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(2 + bytes.len() * 2);
    result.push_str("\\x");

    for byte in bytes {
        result.push(nibble_to_char(byte >> 4));
        result.push(nibble_to_char(byte & 0x0f));
    }

    result
}

fn nibble_to_char(nibble: u8) -> char {
    char::from_digit(u32::from(nibble), 16).unwrap_or('0')
}
