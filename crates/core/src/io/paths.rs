use std::io;
use std::path::{Path, PathBuf};

const AVATARS_DIR: &str = "avatars";
const SHARED_TOOLS_DIR: &str = "shared/tools";

/// On-disk layout of one avatar instance under a vessel root:
///
/// ```text
/// <root>/shared/tools/            shared tool tier
/// <root>/avatars/<name>/inbox     pending command
/// <root>/avatars/<name>/tools/    avatar tool tier
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarPaths {
    root: PathBuf,
    name: String,
    dir: PathBuf,
}

impl AvatarPaths {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        let root = root.into();
        let name = name.into();
        let dir = root.join(AVATARS_DIR).join(&name);
        Self { root, name, dir }
    }

    /// Create the avatar directory and both tool tiers if missing.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.tools_dir())?;
        std::fs::create_dir_all(self.shared_tools_dir())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inbox(&self) -> PathBuf {
        self.dir.join("inbox")
    }

    pub fn last_action(&self) -> PathBuf {
        self.dir.join("last-action")
    }

    pub fn outbox(&self) -> PathBuf {
        self.dir.join("outbox.json")
    }

    pub fn status(&self) -> PathBuf {
        self.dir.join("status.json")
    }

    pub fn events(&self) -> PathBuf {
        self.dir.join("events.json")
    }

    pub fn chat(&self) -> PathBuf {
        self.dir.join("chat.json")
    }

    pub fn config(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.dir.join("tools")
    }

    pub fn shared_tools_dir(&self) -> PathBuf {
        self.root.join(SHARED_TOOLS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_nests_avatar_under_root() {
        let paths = AvatarPaths::new("/srv/vessel", "bob");
        assert_eq!(paths.inbox(), PathBuf::from("/srv/vessel/avatars/bob/inbox"));
        assert_eq!(paths.tools_dir(), PathBuf::from("/srv/vessel/avatars/bob/tools"));
        assert_eq!(paths.shared_tools_dir(), PathBuf::from("/srv/vessel/shared/tools"));
    }

    #[test]
    fn ensure_creates_tool_tiers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = AvatarPaths::new(tmp.path(), "bob");
        paths.ensure().unwrap();
        assert!(paths.tools_dir().is_dir());
        assert!(paths.shared_tools_dir().is_dir());
    }
}
