use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const LINKS_PATH: &str = "links.json";
pub const PROJECTS_PATH: &str = "projects.json";
pub const DETAILS_PATH: &str = "project_details.json";
pub const CONTENT_PATH: &str = "projects_data.json";
pub const TRACKS_PATH: &str = "tracks.json";
pub const PRIZES_PATH: &str = "prizes.json";
pub const TRACK_MATCHES_PATH: &str = "track_matches.json";
pub const PARSED_PATH: &str = "parsed_projects.json";

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `value` as indented UTF-8 JSON. The file is replaced via rename so a
/// crash mid-write never leaves a truncated snapshot behind.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let body = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        f.write_all(body.as_bytes())?;
        f.write_all(b"\n")?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
