//! Path normalization for index keys.
//!
//! Every path that goes in or out of the index passes through [`normalize`]
//! so that `chapters/../chapters/one.md`, `./chapters/one.md` and the
//! absolute form all land on the same key.

use std::path::{Component, Path, PathBuf};

/// Normalize a path into its index key form.
///
/// - relative paths are joined onto the current directory
/// - `.` and `..` are resolved lexically (symlinks are left alone, and the
///   file does not have to exist)
/// - on Windows the result is lower-cased with `\` separators
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root leaves the root in place
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    fold_case(out)
}

#[cfg(windows)]
fn fold_case(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase().replace('/', "\\"))
}

#[cfg(not(windows))]
fn fold_case(path: PathBuf) -> PathBuf {
    path
}

/// Append a suffix to the full file name: `one.md` + `.txt` → `one.md.txt`.
pub fn with_appended_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn removes_cur_dir() {
        assert_eq!(normalize(Path::new("/a/./b/./c.md")), PathBuf::from("/a/b/c.md"));
    }

    #[test]
    fn resolves_parent_dir() {
        assert_eq!(
            normalize(Path::new("/book/chapters/../notes/x.md")),
            PathBuf::from("/book/notes/x.md")
        );
    }

    #[test]
    fn parent_past_root_stays_at_root() {
        assert_eq!(normalize(Path::new("/../../x.md")), PathBuf::from("/x.md"));
    }

    #[test]
    fn relative_becomes_absolute() {
        let normalized = normalize(Path::new("draft.md"));
        assert!(normalized.is_absolute(), "Got: {}", normalized.display());
        assert!(normalized.ends_with("draft.md"));
    }

    #[test]
    fn appended_extension() {
        assert_eq!(
            with_appended_extension(Path::new("/b/one.md"), ".txt"),
            PathBuf::from("/b/one.md.txt")
        );
    }
}
