use crate::config::EngineConfig;
use crate::digits::{Constant, DigitStore};
use crate::error::Result;

/// Open the digit files of the data directory and check their known prefixes.
/// Returns the report and whether every source passed.
pub fn check_digits(config: &EngineConfig) -> Result<(String, bool)> {
    let store = DigitStore::open_dir(&config.data_dir, config.alphabet)?;
    Ok(describe_store(&store, config))
}

fn describe_store(store: &DigitStore, config: &EngineConfig) -> (String, bool) {
    let mut output = String::new();
    output.push_str(&format!("Data directory: {}\n", config.data_dir.display()));
    output.push_str(&format!("Alphabet: {:?}\n\n", config.alphabet));

    let checks = store.verify();
    for &(constant, ok) in &checks {
        let len = store.source(constant).map(|s| s.len()).unwrap_or(0);
        let file = config.alphabet.file_name(constant);
        let status = if ok { "ok" } else { "MISMATCH" };
        output.push_str(&format!(
            "  {:<3} {:<12} {:>12} symbols  {}\n",
            constant.to_string(),
            file,
            len,
            status
        ));
    }
    let all_ok = checks.iter().all(|&(_, ok)| ok) && checks.len() == Constant::ALL.len();
    (output, all_ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn fixtures() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
    }

    #[test]
    fn test_check_digits() {
        let dir = tempdir().unwrap();
        std::fs::copy(fixtures().join("pi_4k.txt"), dir.path().join("pi_1m.txt")).unwrap();
        std::fs::copy(fixtures().join("e_4k.txt"), dir.path().join("e_1m.txt")).unwrap();

        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let (report, ok) = check_digits(&config).unwrap();
        assert!(ok, "{}", report);
        assert!(report.contains("pi_1m.txt"));
        assert!(report.contains("4097 symbols"));
    }

    #[test]
    fn test_swapped_files_fail_prefix_check() {
        let dir = tempdir().unwrap();
        std::fs::copy(fixtures().join("e_4k.txt"), dir.path().join("pi_1m.txt")).unwrap();
        std::fs::copy(fixtures().join("pi_4k.txt"), dir.path().join("e_1m.txt")).unwrap();

        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let (report, ok) = check_digits(&config).unwrap();
        assert!(!ok);
        assert!(report.contains("MISMATCH"));
    }

    #[test]
    fn test_missing_files() {
        let dir = tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(check_digits(&config).is_err());
    }
}
