use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Content identity of a file: BLAKE3 over at most `window` bytes read from
/// the start of the file, hex encoded.
///
/// Only the leading window is read, so the identity is cheap for large videos
/// and survives renames and moves as long as those bytes are unchanged.
pub fn partial_hash(file: &Path, window: usize) -> io::Result<String> {
    let data = read_portion(file, window)?;
    Ok(hash_data(&data))
}

fn read_portion(file: &Path, window: usize) -> io::Result<Vec<u8>> {
    let f = File::open(file)?;
    let mut buffer = Vec::with_capacity(window.min(64 * 1024));
    f.take(window as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

pub fn hash_data(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
