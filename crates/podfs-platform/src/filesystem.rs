use serde::{Deserialize, Serialize};

/// One entry of a remote directory listing.
///
/// `path` is always the listed directory (ending in `/`) followed by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_symlink: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

impl FileEntry {
    /// Entry with only the fields a plain `ls -1ap` listing can provide.
    pub fn bare(dir: &str, name: &str, is_directory: bool) -> Self {
        Self {
            name: name.to_string(),
            path: format!("{}{}", dir, name),
            is_directory,
            permissions: None,
            size: None,
            is_symlink: None,
            symlink_target: None,
        }
    }
}

/// Text content of a remote file, possibly cut at the read cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub content: String,
    pub truncated: bool,
    /// Full remote size in bytes, not the length of `content`.
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_binary: Option<bool>,
}

impl FileContent {
    /// Placeholder returned for binary files: no content is transferred.
    pub fn binary(size: u64) -> Self {
        Self {
            content: String::new(),
            truncated: false,
            size,
            is_binary: Some(true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Other,
}

impl FileType {
    /// Map the `%F` output of coreutils/busybox `stat` onto a file type.
    pub fn from_stat_text(text: &str) -> Self {
        match text.trim() {
            "regular file" | "regular empty file" => FileType::File,
            "directory" => FileType::Directory,
            "symbolic link" => FileType::Symlink,
            _ => FileType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size: u64,
    pub permissions: String,
    pub modified: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_type_mapping() {
        assert_eq!(FileType::from_stat_text("regular file"), FileType::File);
        assert_eq!(FileType::from_stat_text("regular empty file"), FileType::File);
        assert_eq!(FileType::from_stat_text("directory"), FileType::Directory);
        assert_eq!(FileType::from_stat_text("symbolic link"), FileType::Symlink);
        assert_eq!(FileType::from_stat_text("fifo"), FileType::Other);
        assert_eq!(FileType::from_stat_text("character special file"), FileType::Other);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let mut entry = FileEntry::bare("/etc/", "hosts", false);
        entry.size = Some(42);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["isDirectory"], false);
        assert_eq!(json["path"], "/etc/hosts");
        assert_eq!(json["size"], 42);
        assert!(json.get("symlinkTarget").is_none());
    }

    #[test]
    fn test_binary_content_is_empty() {
        let content = FileContent::binary(1024);
        assert!(content.content.is_empty());
        assert!(!content.truncated);
        assert_eq!(content.size, 1024);

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["isBinary"], true);
    }

    #[test]
    fn test_stat_serializes_type_field() {
        let stat = FileStat {
            file_type: FileType::Directory,
            size: 4096,
            permissions: "755".to_string(),
            modified: "2024-01-01 00:00:00.000000000 +0000".to_string(),
        };
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["type"], "directory");
    }
}
