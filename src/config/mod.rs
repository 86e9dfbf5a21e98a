pub mod job;
pub mod merged;
pub mod settings;

use std::path::Path;

use settings::Settings;

/// Auto-discover `settings.yaml` next to a job file.
///
/// If the job file's directory contains `settings.yaml` it is loaded;
/// otherwise the built-in defaults are returned.
pub fn load_settings_for_job(job_file_path: &Path) -> crate::error::Result<Settings> {
    let dir = job_file_path
        .parent()
        .ok_or_else(|| crate::error::TileError::policy("Cannot determine job file directory"))?;

    let settings_path = dir.join("settings.yaml");

    if settings_path.exists() {
        Settings::from_file(&settings_path)
    } else {
        Ok(Settings::default())
    }
}
