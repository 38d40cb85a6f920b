//! Seed the in-memory profile store

use std::path::Path;
use tracing::{info, warn};

use crate::{
    config::ProfilesConfig, models::Profile, service::InMemoryProfileStore, Error, Result,
};

/// Build the profile store, loading `seed_file` when configured
///
/// A missing seed file is not fatal: the store starts empty and every
/// handshake is rejected until profiles are inserted.
pub fn bootstrap_profiles(config: &ProfilesConfig) -> Result<InMemoryProfileStore> {
    let Some(path) = &config.seed_file else {
        info!("No profile seed file configured, starting with an empty profile store");
        return Ok(InMemoryProfileStore::new());
    };

    if !Path::new(path).exists() {
        warn!(path = %path, "Profile seed file not found, starting with an empty profile store");
        return Ok(InMemoryProfileStore::new());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Internal(format!("Failed to read {path}: {e}")))?;
    let profiles = parse_profiles(&raw)?;

    let store: InMemoryProfileStore = profiles.into_iter().collect();
    info!(path = %path, count = store.len(), "Profile store seeded");
    Ok(store)
}

fn parse_profiles(raw: &str) -> Result<Vec<Profile>> {
    serde_yaml::from_str(raw)
        .map_err(|e| Error::InvalidInput(format!("Invalid profile seed file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use std::io::Write;

    const SEED: &str = r#"
- _id: u1
  name: alice
  email: alice@example.com
  roles: [admin]
- _id: u2
  name: bob
  roles: [user]
"#;

    #[test]
    fn test_parse_profiles() {
        let profiles = parse_profiles(SEED).unwrap();

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].id, UserId::from("u1"));
        assert!(profiles[1].email.is_empty());
    }

    #[test]
    fn test_parse_profiles_rejects_garbage() {
        assert!(parse_profiles("- name: [").is_err());
    }

    #[test]
    fn test_bootstrap_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let config = ProfilesConfig {
            seed_file: Some(file.path().to_str().unwrap().to_string()),
        };
        let store = bootstrap_profiles(&config).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&UserId::from("u2")).unwrap().name, "bob");
    }

    #[test]
    fn test_bootstrap_without_file() {
        let store = bootstrap_profiles(&ProfilesConfig::default()).unwrap();
        assert!(store.is_empty());

        let config = ProfilesConfig {
            seed_file: Some("/nonexistent/profiles.yaml".to_string()),
        };
        assert!(bootstrap_profiles(&config).unwrap().is_empty());
    }
}
