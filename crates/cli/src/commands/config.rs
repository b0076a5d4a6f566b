use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fernwood_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "FERNWOOD_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "FERNWOOD_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "FERNWOOD_DATABASE_TIMEOUT_SECS"),
    ));

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line("llm.api_key", llm_api_key, source("llm.api_key", "FERNWOOD_LLM_API_KEY")));
    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", "FERNWOOD_LLM_BASE_URL"),
    ));
    lines.push(render_line(
        "llm.chat_model",
        &config.llm.chat_model,
        source("llm.chat_model", "FERNWOOD_LLM_CHAT_MODEL"),
    ));
    lines.push(render_line(
        "llm.embedding_model",
        &config.llm.embedding_model,
        source("llm.embedding_model", "FERNWOOD_LLM_EMBEDDING_MODEL"),
    ));
    lines.push(render_line(
        "llm.max_retries",
        &config.llm.max_retries.to_string(),
        source("llm.max_retries", "FERNWOOD_LLM_MAX_RETRIES"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "FERNWOOD_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "FERNWOOD_SERVER_PORT"),
    ));

    lines.push(render_line(
        "agent.recursion_limit",
        &config.agent.recursion_limit.to_string(),
        source("agent.recursion_limit", "FERNWOOD_AGENT_RECURSION_LIMIT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "FERNWOOD_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "FERNWOOD_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("fernwood.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/fernwood.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::contains_path;

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: Value = "[llm]\nchat_model = \"gemini-1.5-flash\"".parse().unwrap();
        assert!(contains_path(&doc, "llm.chat_model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "database.url"));
    }
}
