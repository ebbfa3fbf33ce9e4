//! Bootstrap script loading

use crate::error::{ProvisionError, Result};
use serde::Serialize;
use std::path::Path;

pub const DEFAULT_SHEBANG: &str = "#!/bin/bash";

/// User data handed to every instance at launch: an interpreter directive
/// line followed by the script, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BootstrapPayload {
    content: String,
}

impl BootstrapPayload {
    pub fn new(shebang: &str, script: &str) -> Result<Self> {
        if !shebang.starts_with("#!") || shebang.contains('\n') {
            return Err(ProvisionError::Validation(format!(
                "interpreter directive must be a single line starting with #!, got {:?}",
                shebang
            )));
        }
        Ok(Self {
            content: format!("{}\n{}", shebang, script),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn shebang(&self) -> &str {
        self.content
            .split_once('\n')
            .map(|(first, _)| first)
            .unwrap_or(&self.content)
    }

    /// The script without the directive line
    pub fn script(&self) -> &str {
        self.content
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Read a bootstrap script and prefix it with `#!/bin/bash`
pub fn load_bootstrap(script_path: impl AsRef<Path>) -> Result<BootstrapPayload> {
    load_bootstrap_with(script_path, DEFAULT_SHEBANG)
}

/// Read a bootstrap script and prefix it with the given directive.
///
/// A missing or unreadable file is fatal. There is no empty fallback.
pub fn load_bootstrap_with(
    script_path: impl AsRef<Path>,
    shebang: &str,
) -> Result<BootstrapPayload> {
    let path = script_path.as_ref();
    let script = std::fs::read_to_string(path).map_err(|e| ProvisionError::io(path, e))?;
    tracing::debug!("Loaded bootstrap script {} ({} bytes)", path.display(), script.len());
    BootstrapPayload::new(shebang, &script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SCRIPT: &str = "dnf install -y nginx\nsystemctl enable --now nginx\n";

    #[test]
    fn test_prefixes_directive_and_keeps_script_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-data.sh");
        fs::write(&path, SCRIPT).unwrap();

        let payload = load_bootstrap(&path).unwrap();
        assert_eq!(payload.as_str(), format!("#!/bin/bash\n{}", SCRIPT));
        assert_eq!(payload.shebang(), "#!/bin/bash");
        assert_eq!(payload.script(), SCRIPT);
    }

    #[test]
    fn test_no_template_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-data.sh");
        fs::write(&path, "echo ${HOME} {{ name }} $1").unwrap();

        let payload = load_bootstrap(&path).unwrap();
        assert_eq!(payload.script(), "echo ${HOME} {{ name }} $1");
    }

    #[test]
    fn test_loading_twice_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-data.sh");
        fs::write(&path, SCRIPT).unwrap();

        let first = load_bootstrap(&path).unwrap();
        let second = load_bootstrap(&path).unwrap();
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sh");

        match load_bootstrap(&path) {
            Err(ProvisionError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.sh");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(
            load_bootstrap(&path),
            Err(ProvisionError::Io { .. })
        ));
    }

    #[test]
    fn test_custom_directive() {
        let payload = BootstrapPayload::new("#!/usr/bin/env sh", "echo hi").unwrap();
        assert_eq!(payload.as_str(), "#!/usr/bin/env sh\necho hi");
        assert!(BootstrapPayload::new("/bin/bash", "echo hi").is_err());
    }
}
