use serde::{Deserialize, Serialize};

pub const DEFAULT_LIB_PREFIX: &str = "lib/";
pub const MAIN_PREFIX: &str = "main/";

/// Where sub-archives live inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLayout {
    pub lib_prefix: String,
    pub main_prefix: String,
    /// When set, only sub-archives under this prefix are ingested.
    pub wrap_prefix: Option<String>,
}

impl Default for BundleLayout {
    fn default() -> Self {
        Self {
            lib_prefix: DEFAULT_LIB_PREFIX.to_string(),
            main_prefix: MAIN_PREFIX.to_string(),
            wrap_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A nested archive to stream; `is_main` marks the main prefix.
    SubArchive { is_main: bool },
    /// A class or resource rooted at the top of the container.
    Loose,
    /// A sub-archive outside the wrap prefix.
    Skip,
}

impl BundleLayout {
    pub fn classify(&self, entry_name: &str) -> EntryKind {
        let is_main = entry_name.starts_with(&self.main_prefix);
        let is_library = entry_name.starts_with(&self.lib_prefix);

        match &self.wrap_prefix {
            Some(wrap) if entry_name.starts_with(wrap.as_str()) => EntryKind::SubArchive { is_main },
            Some(_) if is_main || is_library => EntryKind::Skip,
            _ if is_main || is_library => EntryKind::SubArchive { is_main },
            _ => EntryKind::Loose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_recognises_lib_and_main() {
        let layout = BundleLayout::default();
        assert_eq!(
            layout.classify("lib/util.jar"),
            EntryKind::SubArchive { is_main: false }
        );
        assert_eq!(
            layout.classify("main/app.jar"),
            EntryKind::SubArchive { is_main: true }
        );
        assert_eq!(layout.classify("com/x/Boot.class"), EntryKind::Loose);
        assert_eq!(layout.classify("README.txt"), EntryKind::Loose);
    }

    #[test]
    fn wrap_prefix_restricts_sub_archives() {
        let layout = BundleLayout {
            wrap_prefix: Some("wrap/".into()),
            ..BundleLayout::default()
        };
        assert_eq!(
            layout.classify("wrap/loader.jar"),
            EntryKind::SubArchive { is_main: false }
        );
        assert_eq!(layout.classify("lib/util.jar"), EntryKind::Skip);
        assert_eq!(layout.classify("main/app.jar"), EntryKind::Skip);
        assert_eq!(layout.classify("top.txt"), EntryKind::Loose);
    }
}
