use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::credentials::{Credentials, CredentialsProvider};
use crate::error::{Result, SignError};

pub const PROFILE_VAR: &str = "AWS_PROFILE";
pub const SHARED_CREDENTIALS_FILE_VAR: &str = "AWS_SHARED_CREDENTIALS_FILE";
pub const CONFIG_FILE_VAR: &str = "AWS_CONFIG_FILE";
pub const DEFAULT_PROFILE: &str = "default";

const ACCESS_KEY_ID_KEY: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN_KEY: &str = "aws_session_token";

type Section = HashMap<String, String>;

/// Static keys from the shared credentials and config files.
///
/// The profile is `AWS_PROFILE` or `default`. The credentials file
/// (`AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/credentials`) is consulted
/// before the config file (`AWS_CONFIG_FILE`, else `~/.aws/config`), where
/// non-default profiles live under `[profile <name>]`. Role assumption and
/// credential processes are not resolved.
#[derive(Debug, Clone, Default)]
pub struct ProfileCredentials {
    profile: Option<String>,
    credentials_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl ProfileCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Resolve through an arbitrary variable lookup and home directory.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Credentials> {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let profile = self
            .profile
            .clone()
            .or_else(|| read(PROFILE_VAR))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let in_home = |file: &str| home.as_ref().map(|dir| dir.join(".aws").join(file));

        let credentials_file = self
            .credentials_file
            .clone()
            .or_else(|| read(SHARED_CREDENTIALS_FILE_VAR).map(PathBuf::from))
            .or_else(|| in_home("credentials"));
        let config_file = self
            .config_file
            .clone()
            .or_else(|| read(CONFIG_FILE_VAR).map(PathBuf::from))
            .or_else(|| in_home("config"));

        if let Some(path) = &credentials_file {
            if let Some(found) = lookup_profile(path, &profile, &profile)? {
                debug!(path = %path.display(), %profile, "credentials from shared credentials file");
                return Ok(found);
            }
        }
        if let Some(path) = &config_file {
            let section = if profile == DEFAULT_PROFILE {
                DEFAULT_PROFILE.to_string()
            } else {
                format!("profile {profile}")
            };
            if let Some(found) = lookup_profile(path, &section, &profile)? {
                debug!(path = %path.display(), %profile, "credentials from config file");
                return Ok(found);
            }
        }

        Err(SignError::MissingCredentials(format!(
            "profile '{profile}' has no static keys in the shared credentials or config file"
        )))
    }
}

impl CredentialsProvider for ProfileCredentials {
    fn credentials(&self) -> Result<Credentials> {
        self.resolve_with(|name| std::env::var(name).ok(), dirs::home_dir())
    }

    fn name(&self) -> &'static str {
        "profile"
    }
}

/// `Ok(None)` when the file is absent or the section has no key pair.
fn lookup_profile(path: &Path, section: &str, profile: &str) -> Result<Option<Credentials>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(SignError::ProfileFile {
                path: path.display().to_string(),
                reason: err.to_string(),
            })
        }
    };

    let sections = parse_sections(&text);
    let Some(values) = sections.get(section) else {
        return Ok(None);
    };

    let (Some(access_key_id), Some(secret_access_key)) =
        (values.get(ACCESS_KEY_ID_KEY), values.get(SECRET_ACCESS_KEY_KEY))
    else {
        if values.contains_key(ACCESS_KEY_ID_KEY) || values.contains_key(SECRET_ACCESS_KEY_KEY) {
            return Err(SignError::ProfileFile {
                path: path.display().to_string(),
                reason: format!("profile '{profile}' has an incomplete key pair"),
            });
        }
        return Ok(None);
    };

    let credentials = Credentials::new(access_key_id.clone(), secret_access_key.clone());
    Ok(Some(match values.get(SESSION_TOKEN_KEY) {
        Some(token) => credentials.with_session_token(token.clone()),
        None => credentials,
    }))
}

/// Section name → key/value pairs. Later duplicates win.
fn parse_sections(text: &str) -> HashMap<String, Section> {
    let mut sections: HashMap<String, Section> = HashMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let (Some(section), Some((key, value))) = (&current, line.split_once('=')) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.trim().to_ascii_lowercase(), value.to_string());
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "msgdispatch-sign-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(dir.join(".aws")).unwrap();
        dir
    }

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    const CREDENTIALS: &str = "\
# shared credentials
[default]
aws_access_key_id = AKIDDEFAULT
aws_secret_access_key = default-secret

[ci]
aws_access_key_id=AKIDCI
aws_secret_access_key=ci-secret
aws_session_token=ci-token
";

    #[test]
    fn default_profile_from_home_directory() {
        let home = make_temp_dir("home");
        std::fs::write(home.join(".aws/credentials"), CREDENTIALS).unwrap();

        let creds = ProfileCredentials::new()
            .resolve_with(no_vars, Some(home.clone()))
            .unwrap();
        assert_eq!(creds.access_key_id(), "AKIDDEFAULT");
        assert_eq!(creds.secret_access_key(), "default-secret");
        assert_eq!(creds.session_token(), None);

        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn aws_profile_selects_section() {
        let home = make_temp_dir("named");
        std::fs::write(home.join(".aws/credentials"), CREDENTIALS).unwrap();

        let creds = ProfileCredentials::new()
            .resolve_with(
                |name| (name == PROFILE_VAR).then(|| "ci".to_string()),
                Some(home.clone()),
            )
            .unwrap();
        assert_eq!(creds.access_key_id(), "AKIDCI");
        assert_eq!(creds.session_token(), Some("ci-token"));

        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn config_file_uses_profile_prefix() {
        let home = make_temp_dir("config");
        std::fs::write(
            home.join(".aws/config"),
            "[profile deploy]\nregion = us-east-1\naws_access_key_id = AKIDCFG\naws_secret_access_key = cfg-secret\n",
        )
        .unwrap();

        let creds = ProfileCredentials::new()
            .with_profile("deploy")
            .resolve_with(no_vars, Some(home.clone()))
            .unwrap();
        assert_eq!(creds.access_key_id(), "AKIDCFG");

        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn explicit_file_overrides_home() {
        let home = make_temp_dir("explicit");
        let file = home.join("custom-credentials");
        std::fs::write(&file, "[default]\naws_access_key_id=AKIDFILE\naws_secret_access_key=s\n")
            .unwrap();

        let creds = ProfileCredentials::new()
            .resolve_with(
                |name| {
                    (name == SHARED_CREDENTIALS_FILE_VAR).then(|| file.display().to_string())
                },
                None,
            )
            .unwrap();
        assert_eq!(creds.access_key_id(), "AKIDFILE");

        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn missing_files_or_profile_are_missing_credentials() {
        let home = make_temp_dir("missing");
        let err = ProfileCredentials::new()
            .resolve_with(no_vars, Some(home.clone()))
            .unwrap_err();
        assert!(matches!(err, SignError::MissingCredentials(_)));

        std::fs::write(home.join(".aws/credentials"), CREDENTIALS).unwrap();
        let err = ProfileCredentials::new()
            .with_profile("absent")
            .resolve_with(no_vars, Some(home.clone()))
            .unwrap_err();
        assert!(matches!(err, SignError::MissingCredentials(ref m) if m.contains("absent")));

        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn half_configured_profile_is_reported() {
        let home = make_temp_dir("partial");
        std::fs::write(home.join(".aws/credentials"), "[default]\naws_access_key_id = AKID\n")
            .unwrap();

        let err = ProfileCredentials::new()
            .resolve_with(no_vars, Some(home.clone()))
            .unwrap_err();
        assert!(matches!(err, SignError::ProfileFile { .. }), "{err:?}");

        let _ = std::fs::remove_dir_all(&home);
    }
}
