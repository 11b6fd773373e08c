//! Script-visible I/O: `read(path)` and the Advent-of-Code input provider.

use std::env;
use std::fs;
use std::path::PathBuf;

/// Pluggable source behind `read`. Returning `None` surfaces as `Nil`.
pub trait ScriptIo {
    fn read(&self, path: &str) -> Option<String>;
}

/// Filesystem reads, with `aoc://YEAR/DAY` delegated to the puzzle-input
/// provider.
pub struct DefaultIo;

impl ScriptIo for DefaultIo {
    fn read(&self, path: &str) -> Option<String> {
        if let Some(spec) = path.strip_prefix("aoc://") {
            return fetch_aoc_input(spec);
        }
        fs::read_to_string(path).ok()
    }
}

fn cache_path(year: u16, day: u8) -> Option<PathBuf> {
    Some(
        dirs::cache_dir()?
            .join("santa-lang")
            .join("aoc")
            .join(year.to_string())
            .join(format!("day{day}.txt")),
    )
}

fn session_cookie() -> Option<String> {
    let session = env::var("AOC_SESSION").ok().or_else(|| {
        let path = dirs::home_dir()?.join(".aoc_session");
        fs::read_to_string(path).ok()
    })?;
    let session = session.trim();
    (!session.is_empty()).then(|| session.to_string())
}

/// Cache-first puzzle input fetch; any failure yields `None`.
fn fetch_aoc_input(spec: &str) -> Option<String> {
    let (year, day) = spec.split_once('/')?;
    let year: u16 = year.parse().ok()?;
    let day: u8 = day.trim_start_matches("day").parse().ok()?;

    let cache = cache_path(year, day)?;
    if let Ok(cached) = fs::read_to_string(&cache) {
        return Some(cached);
    }

    let session = session_cookie()?;
    let url = format!("https://adventofcode.com/{year}/day/{day}/input");
    let body = ureq::get(&url)
        .set("Cookie", &format!("session={session}"))
        .call()
        .ok()?
        .into_string()
        .ok()?;

    if let Some(parent) = cache.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = fs::write(&cache, &body);
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_read_as_none() {
        assert_eq!(DefaultIo.read("/definitely/not/a/file.txt"), None);
    }

    #[test]
    fn cache_path_shape() {
        let path = cache_path(2022, 3).unwrap();
        let rendered = path.to_string_lossy();
        assert!(rendered.ends_with("santa-lang/aoc/2022/day3.txt"));
    }
}
