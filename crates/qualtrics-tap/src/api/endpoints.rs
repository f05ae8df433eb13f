//! Export API URL builders
//!
//! All three request shapes hang off one per-survey export root,
//! e.g. `https://iad1.qualtrics.com/API/v3/surveys/SV_123/export-responses/`.

/// Join the base URL and a survey's export path
pub fn export_root(base_url: &str, export_path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = export_path.trim_start_matches('/');
    let mut root = format!("{}/{}", base, path);
    if !root.ends_with('/') {
        root.push('/');
    }
    root
}

/// `POST` target that starts an export
pub fn start_export_url(root: &str) -> String {
    root.to_string()
}

/// `GET` target reporting an export's progress
pub fn export_progress_url(root: &str, progress_id: &str) -> String {
    format!("{}{}", root, progress_id)
}

/// `GET` target streaming a completed export archive
pub fn export_file_url(root: &str, file_id: &str) -> String {
    format!("{}{}/file", root, file_id)
}
