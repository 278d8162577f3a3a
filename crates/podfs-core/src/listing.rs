//! Parsing of remote `ls` output.
//!
//! The detailed parser understands `ls -la` long format; anything that does
//! not look like a long-format line is dropped rather than failing the whole
//! listing, since busybox, coreutils and odd locales all differ slightly.

use once_cell::sync::Lazy;
use regex::Regex;

use podfs_platform::filesystem::FileEntry;

/// perms, links, owner, group, size, month, day, time-or-year, name
static LONG_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([\-a-zA-Z][\-rwxsStTl]{9}[.+@]?)\s+(\d+)\s+(\S+)\s+(\S+)\s+(\d+)\s+(\S+)\s+(\d{1,2})\s+(\d{1,2}:\d{2}|\d{4})\s+(.+)$",
    )
    .expect("long-format listing regex is valid")
});

const SYMLINK_MARKER: &str = " -> ";

/// Remote argv for the detailed listing.
pub fn detailed_command(dir: &str) -> Vec<String> {
    vec![
        "ls".to_string(),
        "-la".to_string(),
        "--color=never".to_string(),
        "--".to_string(),
        dir.to_string(),
    ]
}

/// Remote argv for the fallback listing (one name per line, `/` after dirs).
pub fn simple_command(dir: &str) -> Vec<String> {
    vec![
        "ls".to_string(),
        "-1ap".to_string(),
        "--".to_string(),
        dir.to_string(),
    ]
}

/// Ensure a directory path ends in exactly one trailing `/`.
pub fn normalize_dir(dir: &str) -> String {
    if dir.is_empty() {
        return "/".to_string();
    }
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{}/", dir)
    }
}

fn is_dot_entry(name: &str) -> bool {
    name == "." || name == ".."
}

fn lines(output: &str) -> impl Iterator<Item = &str> {
    output
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
}

/// Parse `ls -la` output for `dir` (which must end in `/`).
pub fn parse_long_listing(output: &str, dir: &str) -> Vec<FileEntry> {
    let mut entries = Vec::new();

    for line in lines(output) {
        if line.starts_with("total ") {
            continue;
        }
        let Some(caps) = LONG_FORMAT.captures(line) else {
            continue;
        };

        let permissions = &caps[1];
        let size = caps[5].parse::<u64>().ok();
        let name_field = &caps[9];

        let is_directory = permissions.starts_with('d');
        let is_symlink = permissions.starts_with('l');

        let (name, symlink_target) = if is_symlink {
            match name_field.split_once(SYMLINK_MARKER) {
                Some((name, target)) => (name, Some(target.to_string())),
                None => (name_field, None),
            }
        } else {
            (name_field, None)
        };

        if is_dot_entry(name) {
            continue;
        }

        entries.push(FileEntry {
            name: name.to_string(),
            path: format!("{}{}", dir, name),
            is_directory,
            permissions: Some(permissions.to_string()),
            size,
            is_symlink: Some(is_symlink),
            symlink_target,
        });
    }

    entries
}

/// Parse `ls -1ap` output for `dir`. Only names and the directory flag survive.
pub fn parse_simple_listing(output: &str, dir: &str) -> Vec<FileEntry> {
    lines(output)
        .filter_map(|line| {
            let (name, is_directory) = match line.strip_suffix('/') {
                Some(name) => (name, true),
                None => (line, false),
            };
            if name.is_empty() || is_dot_entry(name) {
                None
            } else {
                Some(FileEntry::bare(dir, name, is_directory))
            }
        })
        .collect()
}

/// Directories first, then by case-insensitive name.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const COREUTILS: &str = "total 48\n\
drwxr-xr-x  5 root root 4096 Mar  3 10:21 .\n\
drwxr-xr-x 19 root root 4096 Jan 12  2024 ..\n\
-rw-r--r--  1 root root  220 Mar  3 10:21 .bashrc\n\
drwxr-xr-x  2 app  app  4096 Mar  3 10:22 config\n\
lrwxrwxrwx  1 root root   11 Mar  3 10:21 current -> releases/v2\n\
-rw-r--r--. 1 app  app  1536 Dec 31  2023 my notes.txt\n\
-rwsr-xr-x  1 root root 8192 Feb  1 09:00 su-helper\n";

    #[test]
    fn test_parse_coreutils_listing() {
        let entries = parse_long_listing(COREUTILS, "/srv/");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".bashrc", "config", "current", "my notes.txt", "su-helper"]);

        let config = &entries[1];
        assert!(config.is_directory);
        assert_eq!(config.permissions.as_deref(), Some("drwxr-xr-x"));
        assert_eq!(config.size, Some(4096));

        let notes = &entries[3];
        assert_eq!(notes.path, "/srv/my notes.txt");
        assert_eq!(notes.permissions.as_deref(), Some("-rw-r--r--."));
        assert_eq!(notes.size, Some(1536));
        assert_eq!(notes.is_symlink, Some(false));
    }

    #[test]
    fn test_paths_are_dir_plus_name_and_no_dot_entries() {
        let entries = parse_long_listing(COREUTILS, "/srv/");
        for entry in &entries {
            assert_eq!(entry.path, format!("/srv/{}", entry.name));
            assert_ne!(entry.name, ".");
            assert_ne!(entry.name, "..");
        }
    }

    #[test]
    fn test_symlink_with_target() {
        let entries =
            parse_long_listing("lrwxrwxrwx 1 root root 7 Jan 1 00:00 link -> target", "/");
        assert_eq!(entries.len(), 1);
        let link = &entries[0];
        assert_eq!(link.is_symlink, Some(true));
        assert!(!link.is_directory);
        assert_eq!(link.name, "link");
        assert_eq!(link.path, "/link");
        assert_eq!(link.symlink_target.as_deref(), Some("target"));
    }

    #[test]
    fn test_symlink_without_marker() {
        let entries = parse_long_listing("lrwxrwxrwx 1 root root 7 Jan 1 00:00 dangling", "/tmp/");
        assert_eq!(entries[0].name, "dangling");
        assert_eq!(entries[0].is_symlink, Some(true));
        assert!(entries[0].symlink_target.is_none());
    }

    #[test]
    fn test_arrow_in_regular_file_name_is_kept() {
        let entries = parse_long_listing("-rw-r--r-- 1 root root 3 Jan 1 00:00 a -> b", "/");
        assert_eq!(entries[0].name, "a -> b");
        assert!(entries[0].symlink_target.is_none());
    }

    #[test]
    fn test_total_line_never_produces_entry() {
        assert!(parse_long_listing("total 0\n", "/").is_empty());
        assert!(parse_long_listing("total 123456\r\n", "/").is_empty());
    }

    #[test]
    fn test_crlf_and_garbage_lines() {
        let output = "total 8\r\n\
ls: /proc/1/fd: Permission denied\r\n\
-rw-r--r-- 1 root root 12 Jan 1 00:00 a.txt\r\n\
\r\n\
crw-rw-rw- 1 root root 1, 3 Jan 1 00:00 null\r\n";
        let entries = parse_long_listing(output, "/dev/");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].path, "/dev/a.txt");
    }

    #[test]
    fn test_busybox_listing() {
        let output = "drwxr-xr-x    2 root     root          4096 Jun  1 12:00 bin\n\
-rw-r--r--    1 root     root            18 Jun  1 12:00 motd\n";
        let entries = parse_long_listing(output, "/etc/");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].size, Some(18));
    }

    #[test]
    fn test_simple_listing() {
        let output = "./\n../\nbin/\nmotd\n.profile\r\n";
        let entries = parse_simple_listing(output, "/etc/");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], FileEntry::bare("/etc/", "bin", true));
        assert_eq!(entries[1].name, "motd");
        assert!(!entries[1].is_directory);
        assert!(entries[1].permissions.is_none());
        assert!(entries[1].size.is_none());
        assert!(entries[1].is_symlink.is_none());
        assert_eq!(entries[2].path, "/etc/.profile");
    }

    #[test]
    fn test_normalize_dir() {
        assert_eq!(normalize_dir("/var/log"), "/var/log/");
        assert_eq!(normalize_dir("/var/log/"), "/var/log/");
        assert_eq!(normalize_dir("/"), "/");
        assert_eq!(normalize_dir(""), "/");
    }

    #[test]
    fn test_sort_dirs_first_case_insensitive() {
        let mut entries = vec![
            FileEntry::bare("/", "b.txt", false),
            FileEntry::bare("/", "Zeta", true),
            FileEntry::bare("/", "A.txt", false),
            FileEntry::bare("/", "alpha", true),
        ];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Zeta", "A.txt", "b.txt"]);
    }
}
