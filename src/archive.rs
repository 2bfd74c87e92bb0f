// src/archive.rs

//! Archive naming and size formatting.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

/// Timestamp layout embedded in archive names, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A single-file export of one image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// `{name}_{tag}_{timestamp}`, without extension.
    pub id: String,
    pub path: PathBuf,
    pub size: Option<u64>,
}

impl Archive {
    /// Plan an archive for `name:tag` inside `dir` (empty = current dir).
    pub fn planned<Tz: TimeZone>(
        dir: &Path,
        name: &str,
        tag: &str,
        extension: &str,
        at: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let id = archive_id(name, tag, at);
        let file_name = format!("{id}{extension}");
        let path = if dir.as_os_str().is_empty() {
            PathBuf::from(file_name)
        } else {
            dir.join(file_name)
        };
        Self {
            id,
            path,
            size: None,
        }
    }

    /// Plan an archive stamped with the local time now.
    pub fn planned_now(dir: &Path, name: &str, tag: &str, extension: &str) -> Self {
        Self::planned(dir, name, tag, extension, &Local::now())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Size for log lines, or `"unknown size"`.
    pub fn display_size(&self) -> String {
        self.size
            .map(format_bytes)
            .unwrap_or_else(|| "unknown size".to_string())
    }
}

/// `{name}_{tag}_{YYYYMMDD-HHMMSS}`.
pub fn archive_id<Tz: TimeZone>(name: &str, tag: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    // Registry paths (`org/app`) would otherwise create directories.
    let name = name.replace('/', "-");
    format!("{}_{}_{}", name, tag, at.format(TIMESTAMP_FORMAT))
}

/// Format a byte count with binary units: `512 B`, `1.5 KB`, `2.0 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = b"KMGTPE"[exp] as char;
    format!("{:.1} {}B", bytes as f64 / div as f64, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn planned_name_embeds_name_tag_and_second_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 14, 5, 9).unwrap();
        let archive = Archive::planned(Path::new("/tmp/out"), "myapp", "v2", ".tar", &at);

        assert_eq!(archive.id, "myapp_v2_20260307-140509");
        assert_eq!(archive.path, PathBuf::from("/tmp/out/myapp_v2_20260307-140509.tar"));
        assert_eq!(archive.file_name(), "myapp_v2_20260307-140509.tar");
    }

    #[test]
    fn empty_dir_means_relative_file_name() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let archive = Archive::planned(Path::new(""), "org/app", "latest", ".tar", &at);
        assert_eq!(archive.path, PathBuf::from("org-app_latest_20260101-000000.tar"));
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
