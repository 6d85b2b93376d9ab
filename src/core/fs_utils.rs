//! File system utility helpers (BOM-aware readers)
use std::fs;
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Read a source file as raw bytes, stripping a leading UTF-8 BOM.
///
/// The bytes are not validated: malformed sequences are reported by the
/// scanner as lexical errors.
pub fn read_source_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut content = fs::read(path)?;
    if content.starts_with(UTF8_BOM) {
        content.drain(..UTF8_BOM.len());
    }
    Ok(content)
}
