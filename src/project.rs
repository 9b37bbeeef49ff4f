/// Collapse a free-form project hint into a stable display name.
///
/// Windows drive-rooted paths shorten to drive, profile folder and user
/// (`C:\Users\me`). When the next path component is a throwaway default name
/// like "New folder", two more components are kept so distinct throwaway
/// folders stay distinguishable. Hints without path separators (short names,
/// opaque ids) pass through unchanged.
pub fn resolve_project(hint: &str) -> String {
    let cleaned = hint.trim().trim_matches(|c| c == '\'' || c == '"');

    if !cleaned.contains('\\') && !cleaned.contains('/') {
        return cleaned.to_string();
    }

    let normalized = cleaned.replace('/', "\\");
    let parts: Vec<&str> = normalized.split('\\').filter(|p| !p.is_empty()).collect();

    if parts.len() >= 3 && parts[0].ends_with(':') {
        let keep = if parts.len() >= 4 && is_placeholder(parts[3]) {
            parts.len().min(5)
        } else {
            3
        };
        return parts[..keep].join("\\");
    }

    cleaned.to_string()
}

fn is_placeholder(component: &str) -> bool {
    component.to_ascii_lowercase().contains("new folder")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_paths_shorten_to_three_components() {
        assert_eq!(resolve_project(r"C:\Users\me\proj\src"), r"C:\Users\me");
        assert_eq!(resolve_project(r"D:\work\deep\nested\tree"), r"D:\work\deep");
    }

    #[test]
    fn placeholder_folder_keeps_distinguishing_child() {
        assert_eq!(
            resolve_project(r"C:\Users\me\New folder\proj"),
            r"C:\Users\me\New folder\proj"
        );
        assert_eq!(
            resolve_project(r"C:\Users\me\New folder (2)\proj\sub"),
            r"C:\Users\me\New folder (2)\proj"
        );
    }

    #[test]
    fn forward_slashes_and_quotes_are_tolerated() {
        assert_eq!(resolve_project("\"C:/Users/me/proj/src\""), r"C:\Users\me");
    }

    #[test]
    fn short_names_pass_through() {
        assert_eq!(resolve_project("my-repo"), "my-repo");
        assert_eq!(resolve_project("Project a1b2c3d4"), "Project a1b2c3d4");
    }

    #[test]
    fn resolve_is_idempotent() {
        for hint in [
            r"C:\Users\me\proj\src",
            r"C:\Users\me\New folder\proj",
            "/home/me/code/thing",
            "my-repo",
        ] {
            let once = resolve_project(hint);
            assert_eq!(resolve_project(&once), once);
        }
    }
}
