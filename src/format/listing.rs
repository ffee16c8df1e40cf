//! Local resource resolution: literal files, directories and per-component globs.

use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::types::FileStatus;

/// Scheme of `scheme://rest`, if any.
pub fn scheme_of(resource: &str) -> Option<&str> {
    let (scheme, _) = resource.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// True for resources on a remote store (`gs://`, `s3://`, `hdfs://`, ...): anything with a
/// scheme other than `file`.
pub fn is_remote_resource(resource: &str) -> bool {
    scheme_of(resource).is_some_and(|scheme| !scheme.eq_ignore_ascii_case("file"))
}

/// Names the listing never returns: `_` or `.` prefixed entries (job markers, dotfiles) and
/// OS metadata files.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('_')
        || name.starts_with('.')
        || matches!(name, "Thumbs.db" | "ehthumbs.db" | "Desktop.ini")
}

pub fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Match one path component against a glob: `*`, `?`, `[abc]`, `[a-z]`, `[!x]`, `\` escape.
/// Wildcards never cross a `/`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

fn match_from(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => {
            let rest = &p[1..];
            if rest.is_empty() {
                return !t.contains(&'/');
            }
            (0..=t.len())
                .take_while(|&i| i == 0 || t[i - 1] != '/')
                .any(|i| match_from(rest, &t[i..]))
        }
        Some('?') => t.first().is_some_and(|&c| c != '/') && match_from(&p[1..], &t[1..]),
        Some('[') => match class_end(p) {
            Some(end) => {
                t.first().is_some_and(|&c| class_matches(&p[1..end], c))
                    && match_from(&p[end + 1..], &t[1..])
            }
            None => t.first() == Some(&'[') && match_from(&p[1..], &t[1..]),
        },
        Some('\\') if p.len() > 1 => t.first() == Some(&p[1]) && match_from(&p[2..], &t[1..]),
        Some(c) => t.first() == Some(c) && match_from(&p[1..], &t[1..]),
    }
}

/// Index of the `]` closing the class that starts at `p[0] == '['`.
fn class_end(p: &[char]) -> Option<usize> {
    let mut i = 1;
    if matches!(p.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    // A leading `]` is a literal member.
    if p.get(i) == Some(&']') {
        i += 1;
    }
    p.iter().skip(i).position(|&c| c == ']').map(|pos| pos + i)
}

fn class_matches(class: &[char], c: char) -> bool {
    let (negate, members) = match class.first() {
        Some('!') | Some('^') => (true, &class[1..]),
        _ => (false, class),
    };
    let mut hit = false;
    let mut i = 0;
    while i < members.len() {
        if i + 2 < members.len() && members[i + 1] == '-' {
            if members[i] <= c && c <= members[i + 2] {
                hit = true;
            }
            i += 3;
        } else {
            if members[i] == c {
                hit = true;
            }
            i += 1;
        }
    }
    hit != negate
}

/// Resolve `resource` to its files, sorted by path.
///
/// A missing literal path is `NotFound`; a glob matching nothing resolves to an empty list.
pub fn resolve_listing(resource: &str, recursive: bool) -> io::Result<Vec<FileStatus>> {
    if is_remote_resource(resource) {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("remote resource cannot be listed locally: {resource}"),
        ));
    }
    let local = resource.strip_prefix("file://").unwrap_or(resource);
    if local.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty resource identifier",
        ));
    }

    let mut statuses = if has_glob_meta(local) {
        expand_glob(local, recursive)?
    } else {
        let path = Path::new(local);
        let meta = fs::metadata(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("input path does not exist: {}: {e}", path.display()),
            )
        })?;
        if meta.is_dir() {
            list_dir(path, recursive)?
        } else {
            vec![FileStatus {
                path: path.to_path_buf(),
                len: meta.len(),
            }]
        }
    };

    statuses.sort_by(|a, b| a.path.cmp(&b.path));
    statuses.dedup_by(|a, b| a.path == b.path);
    Ok(statuses)
}

fn expand_glob(pattern: &str, recursive: bool) -> io::Result<Vec<FileStatus>> {
    let parts: Vec<&str> = pattern.split('/').collect();
    let first_glob = parts
        .iter()
        .position(|part| has_glob_meta(part))
        .unwrap_or(parts.len());
    let base = match parts[..first_glob].join("/") {
        b if b.is_empty() && pattern.starts_with('/') => PathBuf::from("/"),
        b if b.is_empty() => PathBuf::from("."),
        b => PathBuf::from(b),
    };
    let component_globs: Vec<&str> = parts[first_glob..]
        .iter()
        .copied()
        .filter(|part| !part.is_empty())
        .collect();

    if !base.is_dir() {
        debug!("Glob base {} does not exist, no matches", base.display());
        return Ok(Vec::new());
    }

    let depth = component_globs.len();
    let mut statuses = Vec::new();
    let walker = WalkDir::new(&base)
        .follow_links(true)
        .min_depth(depth)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_name(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let rel = match entry.path().strip_prefix(&base) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let matched = rel
            .components()
            .zip(component_globs.iter())
            .all(|(component, glob)| {
                let name = component.as_os_str().to_string_lossy();
                !is_hidden_name(&name) && glob_match(glob, &name)
            });
        if !matched {
            continue;
        }
        if entry.file_type().is_dir() {
            statuses.extend(list_dir(entry.path(), recursive)?);
        } else {
            statuses.push(FileStatus {
                path: entry.path().to_path_buf(),
                len: entry.metadata().map_err(io::Error::from)?.len(),
            });
        }
    }
    Ok(statuses)
}

/// Non-hidden files of `dir`; descends into subdirectories only when `recursive`.
fn list_dir(dir: &Path, recursive: bool) -> io::Result<Vec<FileStatus>> {
    let mut statuses = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden_name(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            if !recursive {
                debug!("Skipping subdirectory {} (not recursive)", entry.path().display());
            }
            continue;
        }
        statuses.push(FileStatus {
            path: entry.path().to_path_buf(),
            len: entry.metadata().map_err(io::Error::from)?.len(),
        });
    }
    Ok(statuses)
}
