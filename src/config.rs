use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const API_URL_VAR: &str = "CHAT_WIDGET_API_URL";
const API_KEY_VAR: &str = "CHAT_WIDGET_API_KEY";
const MODEL_VAR: &str = "CHAT_WIDGET_MODEL";
const UPLOAD_URL_VAR: &str = "CHAT_WIDGET_UPLOAD_URL";

fn default_model() -> String {
    "mistralai/mistral-7b-instruct".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

/// Which body shape the completion endpoint expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStyle {
    #[default]
    Chat,
    Prompt,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Full URL of the completion endpoint. Empty means "not configured".
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub request_style: RequestStyle,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            endpoint: String::new(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout_seconds(),
            request_style: RequestStyle::Chat,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Multipart upload endpoint. Attachments stay local when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub title: String,
    pub greeting: String,
    pub launcher_size: f32,
    pub initial_x: f32,
    pub initial_y: f32,
    pub panel_width: f32,
    pub panel_height: f32,
    pub bottom_threshold: f32,
    pub gap: f32,
    pub edge_inset: f32,
    pub drag_threshold: f32,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        WidgetConfig {
            title: "AI Assistant".to_string(),
            greeting: "Hello! How can I help you today?".to_string(),
            launcher_size: 56.0,
            initial_x: 20.0,
            initial_y: 20.0,
            panel_width: 350.0,
            panel_height: 500.0,
            bottom_threshold: 250.0,
            gap: 16.0,
            edge_inset: 10.0,
            drag_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 1024,
            height: 768,
        }
    }
}

impl Config {
    /// Reads the config file (defaults on any error) and applies environment overrides.
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), "error parsing config: {e}; using defaults");
                        Config::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), "error reading config: {e}; using defaults");
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok(), build_time_var);
        config
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Runtime values win over values baked in at build time, which win over the file.
    pub fn apply_overrides<R, B>(&mut self, runtime: R, build_time: B)
    where
        R: Fn(&str) -> Option<String>,
        B: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            runtime(name)
                .or_else(|| build_time(name))
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(url) = lookup(API_URL_VAR) {
            self.completion.endpoint = url;
        }
        if let Some(key) = lookup(API_KEY_VAR) {
            self.completion.api_key = Some(key);
        }
        if let Some(model) = lookup(MODEL_VAR) {
            self.completion.model = model;
        }
        if let Some(url) = lookup(UPLOAD_URL_VAR) {
            self.upload.endpoint = Some(url);
        }
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/chat-widget")
        } else {
            PathBuf::from(".")
        }
    }
}

fn build_time_var(name: &str) -> Option<String> {
    let value = match name {
        API_URL_VAR => option_env!("CHAT_WIDGET_API_URL"),
        API_KEY_VAR => option_env!("CHAT_WIDGET_API_KEY"),
        MODEL_VAR => option_env!("CHAT_WIDGET_MODEL"),
        UPLOAD_URL_VAR => option_env!("CHAT_WIDGET_UPLOAD_URL"),
        _ => None,
    };
    value.map(str::to_string)
}
