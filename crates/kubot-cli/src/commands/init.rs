use std::path::Path;

use anyhow::bail;
use kubot_core::config::CONFIG_FILE_NAME;
use kubot_core::KubotConfig;

const HEADER: &str = "\
# kubot configuration. Every value can be overridden with a flag of `kubot exec`.
# Set [volume] bind_timeout_secs to stop waiting for an unbound claim.
";

pub fn init(path: &Path, namespace: &str, image: &str, force: bool) -> anyhow::Result<()> {
    let output = path.join(CONFIG_FILE_NAME);
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = KubotConfig::scaffold(namespace, image);
    std::fs::write(&output, format!("{HEADER}\n{}", config.to_toml_string()?))?;
    println!("✓ Generated {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_round_trips_through_the_loader() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path(), "qa", "robot:7", false).unwrap();

        let loaded = KubotConfig::from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(loaded, KubotConfig::scaffold("qa", "robot:7"));
    }

    #[test]
    fn existing_file_is_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "# mine\n").unwrap();

        assert!(init(dir.path(), "qa", "robot:7", false).is_err());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap(),
            "# mine\n"
        );
        init(dir.path(), "qa", "robot:7", true).unwrap();
    }
}
