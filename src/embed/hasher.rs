/// Content address for a piece of text: BLAKE3 over its exact UTF-8 bytes.
pub fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}
