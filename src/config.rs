use crate::types::ModelId;
use crate::util::{env_secs, env_string, is_http_url, is_local_endpoint_url};
use anyhow::{bail, Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub gpt: ProviderSettings,
    pub deepseek: ProviderSettings,
    pub gemini: ProviderSettings,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
}

impl RelayConfig {
    pub fn load() -> Result<Self> {
        let port = match env_string("PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT '{port}'"))?,
            None => DEFAULT_PORT,
        };
        let bind_ip = match env_string("RELAY_BIND") {
            Some(ip) => ip
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid RELAY_BIND '{ip}'"))?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let gpt = ProviderSettings {
            api_key: env_string("OPENAI_API_KEY"),
            base_url: env_string("OPENAI_BASE_URL")
                .or_else(|| env_string("BASE_URL"))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: env_string("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        };
        let deepseek = ProviderSettings {
            api_key: env_string("DEEPSEEK_API_KEY"),
            base_url: env_string("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_DEEPSEEK_BASE_URL.to_string()),
            model: env_string("DEEPSEEK_MODEL")
                .unwrap_or_else(|| DEFAULT_DEEPSEEK_MODEL.to_string()),
        };
        let gemini = ProviderSettings {
            api_key: env_string("GEMINI_API_KEY"),
            base_url: env_string("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            model: env_string("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        };

        let allowed_origins = env_string("RELAY_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty() && *origin != "*")
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: SocketAddr::new(bind_ip, port),
            gpt,
            deepseek,
            gemini,
            allowed_origins,
            static_dir: env_string("RELAY_STATIC_DIR").map(PathBuf::from),
        })
    }

    pub fn validate(&self) -> Result<()> {
        for model in ModelId::ALL {
            let settings = self.provider(model);
            if !is_http_url(&settings.base_url) {
                bail!(
                    "Invalid base URL for {model} '{}': expected http:// or https:// URL",
                    settings.base_url
                );
            }
            if settings.model.trim().is_empty() {
                bail!("Model name for {model} must not be empty");
            }
        }

        for origin in &self.allowed_origins {
            if !is_http_url(origin) {
                bail!("Invalid origin in RELAY_ALLOWED_ORIGINS: '{origin}'");
            }
        }

        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                bail!("RELAY_STATIC_DIR '{}' is not a directory", dir.display());
            }
        }

        Ok(())
    }

    pub fn provider(&self, model: ModelId) -> &ProviderSettings {
        match model {
            ModelId::Gpt => &self.gpt,
            ModelId::DeepSeek => &self.deepseek,
            ModelId::Gemini => &self.gemini,
        }
    }

    /// A provider is usable with a key, or keyless when an OpenAI-compatible
    /// base URL points at a local server.
    pub fn is_enabled(&self, model: ModelId) -> bool {
        let settings = self.provider(model);
        if settings.api_key.is_some() {
            return true;
        }
        model != ModelId::Gemini && is_local_endpoint_url(&settings.base_url)
    }

    pub fn enabled_models(&self) -> Vec<ModelId> {
        ModelId::ALL
            .into_iter()
            .filter(|model| self.is_enabled(*model))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    /// Time allowed until response headers arrive.
    pub response_timeout: Option<Duration>,
    /// Reset by every received record; keep-alive comments do not count.
    pub idle_timeout: Option<Duration>,
    /// Hard cap on a whole stream; unset by default.
    pub total_timeout: Option<Duration>,
    pub access_code: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            total_timeout: None,
            access_code: None,
        }
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            relay_url: env_string("CHAT_RELAY_URL").unwrap_or(defaults.relay_url),
            response_timeout: env_secs("CHAT_RESPONSE_TIMEOUT_SECS")
                .unwrap_or(defaults.response_timeout),
            idle_timeout: env_secs("CHAT_IDLE_TIMEOUT_SECS").unwrap_or(defaults.idle_timeout),
            total_timeout: env_secs("CHAT_TOTAL_TIMEOUT_SECS").unwrap_or(defaults.total_timeout),
            access_code: env_string("CHAT_ACCESS_CODE"),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.relay_url) {
            bail!(
                "Invalid CHAT_RELAY_URL '{}': expected http:// or https:// URL",
                self.relay_url
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: Option<&str>, base_url: &str) -> ProviderSettings {
        ProviderSettings {
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
            model: "m".to_string(),
        }
    }

    fn config() -> RelayConfig {
        RelayConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            gpt: settings(Some("sk-test"), DEFAULT_OPENAI_BASE_URL),
            deepseek: settings(None, DEFAULT_DEEPSEEK_BASE_URL),
            gemini: settings(None, DEFAULT_GEMINI_BASE_URL),
            allowed_origins: Vec::new(),
            static_dir: None,
        }
    }

    #[test]
    fn test_enabled_models_require_key_for_remote_endpoints() {
        assert_eq!(config().enabled_models(), vec![ModelId::Gpt]);
    }

    #[test]
    fn test_local_openai_compatible_endpoint_needs_no_key() {
        let mut config = config();
        config.deepseek = settings(None, "http://localhost:11434/v1");
        config.gemini = settings(None, "http://localhost:9999");
        assert_eq!(
            config.enabled_models(),
            vec![ModelId::Gpt, ModelId::DeepSeek]
        );
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let mut config = config();
        config.gemini.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
        assert!(self::config().validate().is_ok());
    }

    #[test]
    fn test_relay_load_reads_env() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var("PORT", "4100");
        std::env::set_var("DEEPSEEK_API_KEY", "  ");
        std::env::set_var("BASE_URL", "https://proxy.example/v1");
        std::env::set_var("RELAY_ALLOWED_ORIGINS", "http://localhost:3000, *");
        let config = RelayConfig::load().expect("load");
        std::env::remove_var("PORT");
        std::env::remove_var("DEEPSEEK_API_KEY");
        std::env::remove_var("BASE_URL");
        std::env::remove_var("RELAY_ALLOWED_ORIGINS");

        assert_eq!(config.bind_addr.port(), 4100);
        assert!(config.deepseek.api_key.is_none());
        assert_eq!(config.deepseek.model, DEFAULT_DEEPSEEK_MODEL);
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        if std::env::var("OPENAI_BASE_URL").is_err() {
            assert_eq!(config.gpt.base_url, "https://proxy.example/v1");
        }
    }

    #[test]
    fn test_client_config_rejects_bad_relay_url() {
        let config = ClientConfig {
            relay_url: "localhost:3000".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ClientConfig::default().validate().is_ok());
    }
}
