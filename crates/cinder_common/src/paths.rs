//! Lexical path normalization.

use std::path::{Component, Path, PathBuf};

/// Removes `.` components and folds `..` into the preceding normal component.
///
/// This is purely lexical: the filesystem is never consulted and symlinks are
/// not followed. A `..` that cannot be folded (at the start of a relative path)
/// is kept. `..` directly under a root or prefix is dropped, matching how the
/// operating system treats `/..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_cur_dir() {
        assert_eq!(
            normalize_path(Path::new("/src/./include/./a.h")),
            PathBuf::from("/src/include/a.h")
        );
    }

    #[test]
    fn folds_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/src/lib/../include/a.h")),
            PathBuf::from("/src/include/a.h")
        );
    }

    #[test]
    fn parent_at_root_is_dropped() {
        assert_eq!(normalize_path(Path::new("/../a.h")), PathBuf::from("/a.h"));
    }

    #[test]
    fn leading_parent_in_relative_path_kept() {
        assert_eq!(
            normalize_path(Path::new("../../a.h")),
            PathBuf::from("../../a.h")
        );
    }

    #[test]
    fn empty_result_is_cur_dir() {
        assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
    }
}
