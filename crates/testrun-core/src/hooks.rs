//! Optional setup/teardown modules looked up under the hook root.
//!
//! A hook module exports a single default zero-argument function, which may
//! return a promise. A missing module is not an error. Both hooks are handed
//! to the engine, which awaits them in the process that runs the tests.

use std::path::{Path, PathBuf};

use strum::Display;
use tracing::debug;

const HOOK_EXTENSIONS: [&str; 3] = ["js", "mjs", "cjs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum HookKind {
    Setup,
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookModule {
    pub kind: HookKind,
    pub path: PathBuf,
}

impl HookModule {
    /// Finds `<root>/<kind>.{js,mjs,cjs}`, in that order of preference.
    #[must_use]
    pub fn locate(root: &Path, kind: HookKind) -> Option<Self> {
        HOOK_EXTENSIONS
            .iter()
            .map(|ext| root.join(format!("{kind}.{ext}")))
            .find(|path| path.is_file())
            .map(|path| Self { kind, path })
    }
}

/// The hooks present for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookSet {
    pub setup: Option<HookModule>,
    pub teardown: Option<HookModule>,
}

impl HookSet {
    #[must_use]
    pub fn locate(root: &Path) -> Self {
        let set = Self {
            setup: HookModule::locate(root, HookKind::Setup),
            teardown: HookModule::locate(root, HookKind::Teardown),
        };
        debug!(
            root = %root.display(),
            setup = ?set.setup.as_ref().map(|hook| hook.path.display().to_string()),
            teardown = ?set.teardown.as_ref().map(|hook| hook.path.display().to_string()),
            "located hook modules"
        );
        set
    }

    #[must_use]
    pub fn get(&self, kind: HookKind) -> Option<&HookModule> {
        match kind {
            HookKind::Setup => self.setup.as_ref(),
            HookKind::Teardown => self.teardown.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_hooks_are_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(HookModule::locate(dir.path(), HookKind::Setup), None);
        assert_eq!(
            HookModule::locate(&dir.path().join("nope"), HookKind::Teardown),
            None
        );
    }

    #[test]
    fn locate_prefers_plain_js() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("setup.mjs"), "export default () => {}").expect("write");
        fs::write(dir.path().join("setup.js"), "export default () => {}").expect("write");
        fs::write(dir.path().join("teardown.cjs"), "module.exports = () => {}").expect("write");

        let setup = HookModule::locate(dir.path(), HookKind::Setup).expect("setup");
        assert_eq!(setup.path, dir.path().join("setup.js"));
        let teardown = HookModule::locate(dir.path(), HookKind::Teardown).expect("teardown");
        assert_eq!(teardown.kind, HookKind::Teardown);
        assert_eq!(teardown.path, dir.path().join("teardown.cjs"));
    }

    #[test]
    fn directories_are_not_hooks() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("setup.js")).expect("mkdir");
        assert_eq!(HookModule::locate(dir.path(), HookKind::Setup), None);
    }

    #[test]
    fn hook_set_collects_both_kinds() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("teardown.mjs"), "export default () => {}").expect("write");

        let set = HookSet::locate(dir.path());
        assert_eq!(set.setup, None);
        assert_eq!(set.get(HookKind::Setup), None);
        let teardown = set.get(HookKind::Teardown).expect("teardown");
        assert_eq!(teardown.path, dir.path().join("teardown.mjs"));
    }
}
