use std::path::PathBuf;

/// Load `.env` for the CLI. Order: `$LAST_INSERT_ENV_FILE`, the working
/// directory (searching upward), then the crate root. Returns the file used.
pub fn ensure_dotenv() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("LAST_INSERT_ENV_FILE") {
        let path = PathBuf::from(explicit);
        if dotenv::from_path(&path).is_ok() {
            return Some(path);
        }
    }
    if let Ok(path) = dotenv::dotenv() {
        return Some(path);
    }
    let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env");
    dotenv::from_path(&candidate).ok().map(|_| candidate)
}
