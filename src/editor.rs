use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Opens files for the user and blocks until they are done.
pub trait Editor {
    fn edit(&self, workdir: &Path, paths: &[String]) -> Result<()>;
}

/// The configured editor, `$VISUAL`, `$EDITOR`, then `vi`.
pub struct SystemEditor {
    command: String,
}

impl SystemEditor {
    pub fn new(configured: Option<&str>) -> Self {
        Self {
            command: resolve_editor(
                configured,
                std::env::var("VISUAL").ok().as_deref(),
                std::env::var("EDITOR").ok().as_deref(),
            ),
        }
    }
}

impl Editor for SystemEditor {
    fn edit(&self, workdir: &Path, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        // "code --wait" style commands carry their own arguments
        let mut parts = self.command.split_whitespace();
        let program = parts.next().unwrap_or("vi");
        debug!(editor = self.command.as_str(), ?paths, "opening editor");

        let status = Command::new(program)
            .args(parts)
            .args(paths)
            .current_dir(workdir)
            .status()
            .with_context(|| format!("Failed to start editor '{}'", self.command))?;

        if !status.success() {
            bail!("Editor '{}' exited with {status}", self.command);
        }
        Ok(())
    }
}

fn resolve_editor(configured: Option<&str>, visual: Option<&str>, editor: Option<&str>) -> String {
    [configured, visual, editor]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|e| !e.is_empty())
        .unwrap_or("vi")
        .to_string()
}
