use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::git::slash_path;

/// Copy the contents of `publish_dir` into `dest`, overwriting what is there.
///
/// A missing `publish_dir` is created (an empty site is still a site), and a
/// `.git` directory inside it is removed first so the source's own history
/// never lands in the publish branch.
pub fn copy_assets(publish_dir: &Path, dest: &Path) -> Result<()> {
    info!("prepare publishing assets");
    if !publish_dir.exists() {
        info!("create {}", publish_dir.display());
        fs::create_dir_all(publish_dir)
            .with_context(|| format!("create {}", publish_dir.display()))?;
    }

    let nested_git = publish_dir.join(".git");
    if fs::symlink_metadata(&nested_git).is_ok() {
        info!("remove {}", nested_git.display());
        remove_path(&nested_git)?;
    }

    info!("copy {} to {}", publish_dir.display(), dest.display());
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;

    for entry in WalkDir::new(publish_dir).follow_links(false) {
        let entry = entry.with_context(|| format!("walk {}", publish_dir.display()))?;
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(publish_dir) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        let ft = entry.file_type();

        if ft.is_dir() {
            if fs::symlink_metadata(&target).is_ok_and(|m| !m.is_dir()) {
                remove_path(&target)?;
            }
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else {
            if fs::symlink_metadata(&target).is_ok() {
                remove_path(&target)?;
            }
            if ft.is_symlink() {
                copy_symlink(path, &target)?;
            } else {
                fs::copy(path, &target).with_context(|| {
                    format!("copy {} -> {}", path.display(), target.display())
                })?;
            }
            debug!("copied {}", rel.display());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).with_context(|| format!("readlink {}", src.display()))?;
    std::os::unix::fs::symlink(&link, dst)
        .with_context(|| format!("symlink {} -> {}", dst.display(), link.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst).with_context(|| format!("copy {} -> {}", src.display(), dst.display()))?;
    Ok(())
}

/// Remove a file, symlink or directory tree. Already gone is fine.
fn remove_path(path: &Path) -> Result<()> {
    let res = match fs::symlink_metadata(path) {
        Ok(m) if m.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match res {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

/// Delete everything under `dest` matching one of `patterns`.
///
/// Patterns are relative to `dest`. A matched directory goes with its
/// contents. The repository's `.git` is never visited.
///
/// # Returns
/// The number of paths removed.
pub fn delete_excluded(dest: &Path, patterns: &[String]) -> Result<usize> {
    if patterns.is_empty() {
        return Ok(0);
    }
    info!("delete excluded assets");
    let matchers = patterns
        .iter()
        .map(|p| glob_to_regex(p))
        .collect::<Result<Vec<_>>>()?;

    let mut doomed: Vec<PathBuf> = Vec::new();
    let mut it = WalkDir::new(dest)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    while let Some(entry) = it.next() {
        let entry = entry.with_context(|| format!("walk {}", dest.display()))?;
        let Ok(rel) = entry.path().strip_prefix(dest) else {
            continue;
        };
        let rel = slash_path(rel);
        if matchers.iter().any(|re| re.is_match(&rel)) {
            if entry.file_type().is_dir() {
                it.skip_current_dir();
            }
            doomed.push(entry.into_path());
        }
    }

    for path in &doomed {
        info!("delete {}", path.display());
        remove_path(path)?;
    }
    Ok(doomed.len())
}

/// Convert a glob into a regular expression over `/`-separated paths.
///
/// Supported:
/// - `*` matches within one path segment
/// - `?` matches one character other than `/`
/// - `**` matches across segments; `**/` also matches no directory at all
/// - `[...]` character classes, `[!...]` negated
///
/// A trailing `/**` matches the directory itself too, and a leading `./` or
/// trailing `/` is ignored. Everything else is literal.
fn glob_to_regex(pat: &str) -> Result<Regex> {
    let mut p = pat.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    let p = p.trim_start_matches('/').trim_end_matches('/');

    let (body, any_suffix) = match p.strip_suffix("/**") {
        Some(b) => (b, true),
        None => (p, false),
    };

    let chars: Vec<char> = body.chars().collect();
    let mut s = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    s.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    s.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => s.push_str("[^/]*"),
            '?' => s.push_str("[^/]"),
            '[' => match bracket_class(&chars[i + 1..]) {
                Some((class, used)) => {
                    s.push_str(&class);
                    i += used + 1;
                    continue;
                }
                None => s.push_str("\\["),
            },
            c => s.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    if any_suffix {
        s.push_str("(?:/.*)?");
    }
    s.push('$');
    Regex::new(&s).with_context(|| format!("invalid exclude pattern: {}", pat))
}

/// Translate the body of a `[...]` glob class (everything after the `[`).
///
/// Returns the regex class and how many chars it consumed, or `None` when
/// the class is never closed. A `]` right after `[` or `[!` is a member.
/// Members are escaped one by one so regex class syntax (`[`, `&&`, `~~`)
/// stays literal.
fn bracket_class(rest: &[char]) -> Option<(String, usize)> {
    let mut j = 0;
    let negate = rest.first() == Some(&'!');
    if negate {
        j += 1;
    }
    let start = j;
    if rest.get(j) == Some(&']') {
        j += 1;
    }
    let end = j + rest[j..].iter().position(|&c| c == ']')?;
    let members = &rest[start..end];

    let mut class = String::from(if negate { "[^" } else { "[" });
    let mut k = 0;
    while k < members.len() {
        class.push_str(&regex::escape(&members[k].to_string()));
        if members.get(k + 1) == Some(&'-') && k + 2 < members.len() {
            class.push('-');
            class.push_str(&regex::escape(&members[k + 2].to_string()));
            k += 3;
        } else {
            k += 1;
        }
    }
    class.push(']');
    Some((class, end + 1))
}
