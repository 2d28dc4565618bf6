use crate::settings::AppSettings;

/// Where the rewrite API key comes from. The caller resolves it and hands
/// it to the pipeline, so the pipeline itself never reads the environment.
pub trait ApiKeyLookup: Send + Sync {
    fn lookup(&self) -> Option<String>;
}

/// Process environment first, then the key saved in settings. Blank values
/// count as absent.
pub struct EnvApiKeyLookup {
    env_var: String,
    persisted: Option<String>,
}

impl EnvApiKeyLookup {
    pub fn new(env_var: impl Into<String>, persisted: Option<String>) -> Self {
        Self {
            env_var: env_var.into(),
            persisted,
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(settings.api_key_env_var.clone(), settings.api_key.clone())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ApiKeyLookup for EnvApiKeyLookup {
    fn lookup(&self) -> Option<String> {
        non_blank(std::env::var(&self.env_var).ok()).or_else(|| non_blank(self.persisted.clone()))
    }
}
