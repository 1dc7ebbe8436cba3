#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_WWW_ROOT: &str = "www";
pub const DEFAULT_TUBEGRAB_PORT: u16 = 5000;
pub const DEFAULT_TUBEGRAB_HOST: &str = "127.0.0.1";
pub const DEFAULT_YT_DLP_BIN: &str = "yt-dlp";
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";

/// Everything the backend needs to know at startup.
///
/// `download_dir` is handed explicitly to the download service; nothing
/// else in the process refers to it.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub download_dir: PathBuf,
    pub www_root: PathBuf,
    pub port: u16,
    pub host: String,
    pub yt_dlp_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
}

/// Values passed on the command line. They win over the environment, which
/// in turn wins over the `.env` file.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub download_dir: Option<PathBuf>,
    pub www_root: Option<PathBuf>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_runtime_config(&file_vars, env_var_string, overrides))
}

fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> RuntimeConfig {
    let lookup_path = |key: &str, default: &str| {
        lookup_value(key, file_vars, &env_lookup)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(default))
    };

    let download_dir = overrides
        .download_dir
        .unwrap_or_else(|| lookup_path("DOWNLOAD_DIR", DEFAULT_DOWNLOAD_DIR));
    let www_root = overrides
        .www_root
        .unwrap_or_else(|| lookup_path("WWW_ROOT", DEFAULT_WWW_ROOT));
    let port = overrides
        .port
        .or_else(|| {
            lookup_value("TUBEGRAB_PORT", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_TUBEGRAB_PORT);
    let host = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup_value("TUBEGRAB_HOST", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_TUBEGRAB_HOST.to_string());

    RuntimeConfig {
        download_dir,
        www_root,
        port,
        host,
        yt_dlp_bin: lookup_path("YT_DLP_BIN", DEFAULT_YT_DLP_BIN),
        ffmpeg_bin: lookup_path("FFMPEG_BIN", DEFAULT_FFMPEG_BIN),
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| non_blank(&value))
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).and_then(|value| non_blank(value)))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a dotenv-style file. A missing file is not an error.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> RuntimeConfig {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_runtime_config(&vars, |_| None, RuntimeOverrides::default())
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = config_from("");
        assert_eq!(config.download_dir, PathBuf::from(DEFAULT_DOWNLOAD_DIR));
        assert_eq!(config.www_root, PathBuf::from(DEFAULT_WWW_ROOT));
        assert_eq!(config.port, DEFAULT_TUBEGRAB_PORT);
        assert_eq!(config.host, DEFAULT_TUBEGRAB_HOST);
        assert_eq!(config.yt_dlp_bin, PathBuf::from(DEFAULT_YT_DLP_BIN));
        assert_eq!(config.ffmpeg_bin, PathBuf::from(DEFAULT_FFMPEG_BIN));
    }

    #[test]
    fn file_values_are_read() {
        let config = config_from(
            "DOWNLOAD_DIR=\"/srv/grab\"\nWWW_ROOT=\"/srv/www\"\nTUBEGRAB_PORT=\"4242\"\nTUBEGRAB_HOST=\"0.0.0.0\"\nYT_DLP_BIN=/opt/yt-dlp\n",
        );
        assert_eq!(config.download_dir, PathBuf::from("/srv/grab"));
        assert_eq!(config.www_root, PathBuf::from("/srv/www"));
        assert_eq!(config.port, 4242);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.yt_dlp_bin, PathBuf::from("/opt/yt-dlp"));
    }

    #[test]
    fn invalid_port_defaults() {
        let config = config_from("TUBEGRAB_PORT=\"nope\"\n");
        assert_eq!(config.port, DEFAULT_TUBEGRAB_PORT);
    }

    #[test]
    fn env_wins_over_file() {
        let vars = read_env_file(make_config("DOWNLOAD_DIR=\"/file\"\n").path()).unwrap();
        let config = build_runtime_config(
            &vars,
            |key| (key == "DOWNLOAD_DIR").then(|| "/env".to_string()),
            RuntimeOverrides::default(),
        );
        assert_eq!(config.download_dir, PathBuf::from("/env"));
    }

    #[test]
    fn overrides_win_over_everything() {
        let mut vars = HashMap::new();
        vars.insert("DOWNLOAD_DIR".to_string(), "/file-downloads".to_string());
        vars.insert("WWW_ROOT".to_string(), "/file-www".to_string());
        vars.insert("TUBEGRAB_HOST".to_string(), "file-host".to_string());
        vars.insert("TUBEGRAB_PORT".to_string(), "7000".to_string());

        let overrides = RuntimeOverrides {
            download_dir: Some(PathBuf::from("/override-downloads")),
            www_root: None,
            port: Some(9000),
            host: Some("override-host".into()),
            env_path: None,
        };

        let config = build_runtime_config(
            &vars,
            |key| match key {
                "WWW_ROOT" => Some("/env-www".to_string()),
                "TUBEGRAB_PORT" => Some("8000".to_string()),
                _ => None,
            },
            overrides,
        );

        assert_eq!(config.download_dir, PathBuf::from("/override-downloads"));
        assert_eq!(config.www_root, PathBuf::from("/env-www"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "override-host");
    }

    #[test]
    fn blank_values_are_ignored() {
        let vars =
            read_env_file(make_config("TUBEGRAB_HOST=\"  \"\nDOWNLOAD_DIR=\"\"\n").path()).unwrap();
        let config = build_runtime_config(
            &vars,
            |_| None,
            RuntimeOverrides {
                host: Some("   ".into()),
                ..RuntimeOverrides::default()
            },
        );
        assert_eq!(config.host, DEFAULT_TUBEGRAB_HOST);
        assert_eq!(config.download_dir, PathBuf::from(DEFAULT_DOWNLOAD_DIR));
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export DOWNLOAD_DIR="/media"
            WWW_ROOT='/www'
            TUBEGRAB_HOST =  "0.0.0.0"
            TUBEGRAB_PORT=9090
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("DOWNLOAD_DIR").unwrap(), "/media");
        assert_eq!(vars.get("WWW_ROOT").unwrap(), "/www");
        assert_eq!(vars.get("TUBEGRAB_HOST").unwrap(), "0.0.0.0");
        assert_eq!(vars.get("TUBEGRAB_PORT").unwrap(), "9090");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn resolve_reads_explicit_env_path() {
        let cfg = make_config("TUBEGRAB_PORT=\"6123\"\n");
        let config = resolve_runtime_config(RuntimeOverrides {
            env_path: Some(cfg.path().to_path_buf()),
            ..RuntimeOverrides::default()
        })
        .unwrap();
        if env::var("TUBEGRAB_PORT").is_err() {
            assert_eq!(config.port, 6123);
        }
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }
}
