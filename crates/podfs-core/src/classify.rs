//! Text vs binary decision for remote files.

/// Extensions treated as binary without looking at the content.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tif", "tiff", "psd", "heic",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "zst", "7z", "rar", "jar", "war", "ear", "deb", "rpm",
    // executables and objects
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "class", "pyc", "wasm", "elf",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    // media
    "mp3", "mp4", "avi", "mov", "mkv", "wav", "flac", "ogg", "webm", "m4a", "aac",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // databases
    "db", "sqlite", "sqlite3", "mdb",
];

/// Lowercased extension of the last path component, if any.
pub fn extension(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// True when the extension alone says the file is binary.
pub fn has_binary_extension(path: &str) -> bool {
    extension(path)
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// True when a content sample contains a NUL byte.
pub fn sample_is_binary(sample: &str) -> bool {
    sample.as_bytes().contains(&0)
}

/// `raw` without a trailing multi-byte UTF-8 sequence that was cut short.
pub fn without_partial_char(raw: &[u8]) -> &[u8] {
    let tail_start = raw.len().saturating_sub(3);
    for i in (tail_start..raw.len()).rev() {
        let byte = raw[i];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if i + width > raw.len() { &raw[..i] } else { raw };
    }
    raw
}

/// Remote argv reading the first `n` bytes of `path`.
pub fn head_command(path: &str, n: u64) -> Vec<String> {
    vec![
        "head".to_string(),
        "-c".to_string(),
        n.to_string(),
        "--".to_string(),
        path.to_string(),
    ]
}
