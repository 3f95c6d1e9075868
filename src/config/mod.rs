pub mod job;
pub mod merged;
pub mod settings;

use std::path::{Path, PathBuf};

use job::JobFile;
use settings::Settings;

use crate::error::{MrcError, Result};

/// ジョブファイルのパスからsettings.yamlを自動検出して読み込む。
///
/// ジョブファイルと同じディレクトリに `settings.yaml` があればそれを、
/// なければデフォルト設定を使う。
pub fn load_settings_for_job(job_file_path: &Path) -> Result<Settings> {
    let settings_path = job_dir(job_file_path)?.join("settings.yaml");
    if settings_path.exists() {
        Settings::from_file(&settings_path)
    } else {
        Ok(Settings::default())
    }
}

/// ジョブファイルを読み込んでパースする。
pub fn load_job_file(job_file_path: &Path) -> Result<JobFile> {
    let content = std::fs::read_to_string(job_file_path).map_err(|e| {
        MrcError::config(format!(
            "Failed to read job file {}: {e}",
            job_file_path.display()
        ))
    })?;
    serde_yml::from_str(&content).map_err(|e| {
        MrcError::config(format!(
            "Failed to parse job file {}: {e}",
            job_file_path.display()
        ))
    })
}

/// ジョブファイル内の相対パスはジョブファイルのディレクトリ基準で解決する。
pub fn resolve_path(job_file_path: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match job_file_path.parent() {
        Some(dir) => dir.join(p),
        None => p.to_path_buf(),
    }
}

fn job_dir(job_file_path: &Path) -> Result<&Path> {
    job_file_path
        .parent()
        .ok_or_else(|| MrcError::config("Cannot determine job file directory"))
}
