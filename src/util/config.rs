use std::env;
use std::sync::RwLock;

pub const CHUNK_SIZE_VAR: &str = "MYSQLSNIFF_CHUNK_SIZE";
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

static CHUNK_SIZE: RwLock<Option<usize>> = RwLock::new(None);

/// Bytes handed to the decoder per call when replaying a capture.
///
/// Read from `MYSQLSNIFF_CHUNK_SIZE` on first use; unset, zero or garbage
/// falls back to [`DEFAULT_CHUNK_SIZE`].
pub fn get_chunk_size() -> usize {
    if let Some(chunk_size) = CHUNK_SIZE.read().map(|cached| *cached).unwrap_or(None) {
        return chunk_size;
    }

    let chunk_size = parse_chunk_size(env::var(CHUNK_SIZE_VAR).ok().as_deref());
    if let Ok(mut cached) = CHUNK_SIZE.write() {
        cached.replace(chunk_size);
    }
    chunk_size
}

fn parse_chunk_size(value: Option<&str>) -> usize {
    match value.and_then(|value| value.trim().parse().ok()) {
        Some(0) | None => DEFAULT_CHUNK_SIZE,
        Some(chunk_size) => chunk_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunk_size() {
        assert_eq!(DEFAULT_CHUNK_SIZE, parse_chunk_size(None));
        assert_eq!(DEFAULT_CHUNK_SIZE, parse_chunk_size(Some("0")));
        assert_eq!(DEFAULT_CHUNK_SIZE, parse_chunk_size(Some("lots")));
        assert_eq!(7, parse_chunk_size(Some(" 7 ")));
    }
}
