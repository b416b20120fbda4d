//! Work directory and artifact path resolution.
//!
//! Priority for the work directory:
//! 1. `--work-dir` (explicit flag)
//! 2. `NONOPAINT_WORK_DIR` (environment override)
//! 3. `XDG_DATA_HOME/nonopaint` (Linux standard)
//! 4. `dirs::data_local_dir()/nonopaint` (platform data dir)
//! 5. System temp dir (last resort)
//!
//! Every file the CLI reads or writes lives directly in the work directory.

use std::env;
use std::path::{Path, PathBuf};

use nonopaint_core::error::Stage;

/// Resolve the work directory with priority fallback.
///
/// Empty environment values are ignored.
pub fn get_work_dir(explicit: Option<&Path>) -> PathBuf {
    // 1. Explicit flag
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    // 2. Environment override (ignore empty)
    if let Ok(dir) = env::var("NONOPAINT_WORK_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    // 3. XDG_DATA_HOME (ignore empty)
    if let Ok(data_home) = env::var("XDG_DATA_HOME") {
        if !data_home.is_empty() {
            return PathBuf::from(data_home).join("nonopaint");
        }
    }

    // 4. Platform data dir
    if let Some(data) = dirs::data_local_dir() {
        return data.join("nonopaint");
    }

    // 5. Last resort: temp dir
    env::temp_dir().join("nonopaint")
}

/// File names of the artifacts produced by a run.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve from the `--work-dir` flag and the environment.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        Self::new(get_work_dir(explicit))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last screenshot taken.
    pub fn screenshot(&self) -> PathBuf {
        self.root.join("screenshot.png")
    }

    /// Captured answer, one pixel per cell.
    pub fn bitmap(&self) -> PathBuf {
        self.root.join("bitmap.png")
    }

    /// Clues plus grid, cropped from the puzzle screen.
    pub fn nonogram(&self) -> PathBuf {
        self.root.join("nonogram.png")
    }

    /// Planned taps drawn over the puzzle screenshot.
    pub fn paint_debug(&self) -> PathBuf {
        self.root.join("paint-debug.png")
    }

    /// Mask persisted when a pipeline step finds nothing.
    pub fn diagnostic_mask(&self, stage: Stage) -> PathBuf {
        self.root.join(format!("{}-mask.png", stage.file_stem()))
    }

    /// Create the work directory if it does not exist.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;

    // Serializes tests that touch the process environment.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    // Restores env vars on drop while holding ENV_MUTEX.
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
        _lock: std::sync::MutexGuard<'static, ()>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), std::env::var(name).ok()))
                .collect();
            Self { vars, _lock: lock }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                // SAFETY: We hold ENV_MUTEX, so no other test thread is modifying env vars
                unsafe {
                    match value {
                        Some(v) => std::env::set_var(name, v),
                        None => std::env::remove_var(name),
                    }
                }
            }
        }
    }

    const VARS: &[&str] = &["NONOPAINT_WORK_DIR", "XDG_DATA_HOME"];

    #[test]
    fn test_explicit_flag_wins() {
        let _guard = EnvGuard::new(VARS);
        // SAFETY: We hold ENV_MUTEX via _guard
        unsafe {
            std::env::set_var("NONOPAINT_WORK_DIR", "/from/env");
            std::env::set_var("XDG_DATA_HOME", "/xdg");
        }

        assert_eq!(
            get_work_dir(Some(Path::new("/from/flag"))),
            PathBuf::from("/from/flag")
        );
    }

    #[test]
    fn test_env_override() {
        let _guard = EnvGuard::new(VARS);
        // SAFETY: We hold ENV_MUTEX via _guard
        unsafe {
            std::env::set_var("NONOPAINT_WORK_DIR", "/from/env");
            std::env::set_var("XDG_DATA_HOME", "/xdg");
        }

        assert_eq!(get_work_dir(None), PathBuf::from("/from/env"));
    }

    #[test]
    fn test_empty_env_falls_through_to_xdg() {
        let _guard = EnvGuard::new(VARS);
        // SAFETY: We hold ENV_MUTEX via _guard
        unsafe {
            std::env::set_var("NONOPAINT_WORK_DIR", "");
            std::env::set_var("XDG_DATA_HOME", "/xdg");
        }

        assert_eq!(get_work_dir(None), PathBuf::from("/xdg/nonopaint"));
    }

    #[test]
    fn test_platform_fallback() {
        let _guard = EnvGuard::new(VARS);
        // SAFETY: We hold ENV_MUTEX via _guard
        unsafe {
            std::env::remove_var("NONOPAINT_WORK_DIR");
            std::env::remove_var("XDG_DATA_HOME");
        }

        assert!(get_work_dir(None).ends_with("nonopaint"));
    }

    #[test]
    fn test_artifact_names() {
        let paths = ArtifactPaths::new("/work");
        assert_eq!(paths.bitmap(), PathBuf::from("/work/bitmap.png"));
        assert_eq!(paths.screenshot(), PathBuf::from("/work/screenshot.png"));
        assert_eq!(
            paths.diagnostic_mask(Stage::PaletteStrip),
            PathBuf::from("/work/palette-strip-mask.png")
        );
    }
}
