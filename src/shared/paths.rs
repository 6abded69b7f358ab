/// The review API reports paths with forward slashes while editors on Windows
/// hand us backslashes. All lookups happen on the normalized form.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}
