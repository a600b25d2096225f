/// Percent-encodes a document key so it can be used as a uri path.
///
/// `/` separators survive untouched; every other byte outside the RFC 3986
/// unreserved set is escaped. Empty keys have no uri.
pub fn encode_uri(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let encoded = key
        .split('/')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    Some(encoded)
}
