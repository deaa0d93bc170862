use std::path::PathBuf;

use anyhow::{ensure, Context, Result};

use crate::llm_client::DEFAULT_API_BASE;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Loopback unless `HOST` says otherwise.
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    pub rust_log: String,
    /// Holds `settings.json` and the `debug/` directory.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub latex_program: String,
    pub latex_passes: u32,
    pub generation_api_base: String,
    /// Seeds the stored API key when the store has none.
    pub generation_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "./data".to_string()));
        let output_dir = var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("documents"));

        let port = var("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;
        let cors_origins = match var("CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![
                format!("http://localhost:{port}"),
                format!("http://127.0.0.1:{port}"),
            ],
        };

        let latex_passes = var("LATEX_PASSES")
            .unwrap_or_else(|| "1".to_string())
            .parse::<u32>()
            .context("LATEX_PASSES must be a positive integer")?;
        ensure!(latex_passes > 0, "LATEX_PASSES must be a positive integer");

        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            cors_origins,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            output_dir,
            latex_program: var("LATEX_PROGRAM").unwrap_or_else(|| "pdflatex".to_string()),
            latex_passes,
            generation_api_base: var("GENERATION_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            generation_api_key: var("GENERATION_API_KEY"),
            data_dir,
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.data_dir.join("debug")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:8080", "http://127.0.0.1:8080"]
        );
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.output_dir, PathBuf::from("./data/documents"));
        assert_eq!(config.settings_path(), PathBuf::from("./data/settings.json"));
        assert_eq!(config.debug_dir(), PathBuf::from("./data/debug"));
        assert_eq!(config.latex_program, "pdflatex");
        assert_eq!(config.latex_passes, 1);
        assert_eq!(config.generation_api_base, DEFAULT_API_BASE);
        assert!(config.generation_api_key.is_none());
    }

    #[test]
    fn test_output_dir_follows_data_dir() {
        let derived = config(&[("DATA_DIR", "/srv/tailor")]).unwrap();
        assert_eq!(derived.output_dir, PathBuf::from("/srv/tailor/documents"));

        let explicit = config(&[("DATA_DIR", "/srv/tailor"), ("OUTPUT_DIR", "/tmp/pdfs")]).unwrap();
        assert_eq!(explicit.output_dir, PathBuf::from("/tmp/pdfs"));
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let config = config(&[("GENERATION_API_KEY", "  ")]).unwrap();
        assert!(config.generation_api_key.is_none());
    }

    #[test]
    fn test_bad_port_is_rejected() {
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("LATEX_PASSES", "-1")]).is_err());
    }

    #[test]
    fn test_zero_latex_passes_is_rejected() {
        let err = config(&[("LATEX_PASSES", "0")]).unwrap_err();
        assert!(err.to_string().contains("LATEX_PASSES"));
        assert_eq!(config(&[("LATEX_PASSES", "3")]).unwrap().latex_passes, 3);
    }

    #[test]
    fn test_host_and_origins_are_configurable() {
        let config = config(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("CORS_ORIGINS", "https://cv.example.com, ,http://localhost:5173"),
        ])
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(
            config.cors_origins,
            vec!["https://cv.example.com", "http://localhost:5173"]
        );
    }
}
