use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` lexically, without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Where an archive entry should be written under `root`, or `None` if the
/// entry name would escape it. `root` must already be absolute and normalized.
///
/// Backslashes in the entry name are treated as separators.
pub fn safe_destination(root: &Path, entry_name: &str) -> Option<PathBuf> {
    let entry = entry_name.replace('\\', "/");
    let dest = normalize(&root.join(entry));

    if dest != root && dest.starts_with(root) {
        Some(dest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/project/locales")
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(
            normalize(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn plain_entry_lands_under_root() {
        assert_eq!(
            safe_destination(&root(), "en/main.yml"),
            Some(PathBuf::from("/project/locales/en/main.yml"))
        );
    }

    #[test]
    fn backslashes_become_separators() {
        assert_eq!(
            safe_destination(&root(), "fr\\nested\\main.yml"),
            Some(PathBuf::from("/project/locales/fr/nested/main.yml"))
        );
    }

    #[test]
    fn inner_parent_segments_are_allowed_when_they_stay_inside() {
        assert_eq!(
            safe_destination(&root(), "en/../de.yml"),
            Some(PathBuf::from("/project/locales/de.yml"))
        );
    }

    #[test]
    fn parent_traversal_is_rejected() {
        assert_eq!(safe_destination(&root(), "../../etc/passwd"), None);
        assert_eq!(safe_destination(&root(), "..\\..\\etc\\passwd"), None);
        assert_eq!(safe_destination(&root(), "en/../../secrets.yml"), None);
    }

    #[test]
    fn sibling_with_common_prefix_is_rejected() {
        assert_eq!(safe_destination(&root(), "../locales-evil/en.yml"), None);
    }

    #[test]
    fn absolute_entry_is_rejected() {
        assert_eq!(safe_destination(&root(), "/etc/passwd"), None);
    }

    #[test]
    fn root_itself_is_rejected() {
        assert_eq!(safe_destination(&root(), "."), None);
        assert_eq!(safe_destination(&root(), ""), None);
    }
}
