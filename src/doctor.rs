use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::cache::store::StateStore;
use crate::config::{Config, ConfigService};
use crate::engine::parser;
use crate::language::LangId;
use crate::vcs::{GitCli, Vcs};

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub version: String,
    /// `git --version`, absent when git cannot be run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub state_dir_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    pub languages: Vec<LanguageStatus>,
}

#[derive(Debug, Serialize)]
pub struct LanguageStatus {
    pub language: LangId,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_version: Option<String>,
}

/// Check git, the repository around `start`, and every symbol grammar.
pub fn run_doctor(start: &Path) -> DoctorReport {
    let git = Command::new("git")
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    let vcs = GitCli::discover(start, &Config::default()).ok();
    let repository = vcs.as_ref().map(|vcs| vcs.workdir().to_path_buf());
    let store = vcs.as_ref().map(|vcs| StateStore::in_git_dir(vcs.git_dir()));
    let state_dir = store.as_ref().map(|s| s.dir().to_path_buf());
    let config_path = store
        .as_ref()
        .map(|s| ConfigService::resolve_path(s.dir(), None));

    let languages = LangId::ALL
        .iter()
        .map(|&lang| {
            let available = parser::grammar_available(lang);
            LanguageStatus {
                language: lang,
                available,
                parser_version: available.then(|| lang.ts_language().abi_version().to_string()),
            }
        })
        .collect();

    DoctorReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git,
        state_dir_exists: state_dir.as_deref().is_some_and(Path::is_dir),
        repository,
        state_dir,
        config_path,
        languages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_a_repository_reports_no_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = run_doctor(dir.path());
        assert!(report.repository.is_none());
        assert!(!report.state_dir_exists);
        assert_eq!(report.languages.len(), LangId::ALL.len());
    }

    #[test]
    fn every_grammar_loads() {
        let report = run_doctor(Path::new("."));
        assert!(report.languages.iter().all(|l| l.available));
    }
}
