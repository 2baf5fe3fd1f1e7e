//! Layered configuration loading: a YAML base file, an optional
//! profile-specific override file, then environment variables, each layer
//! overriding the last. `${VAR_NAME}` placeholders in string values are
//! resolved against the process environment at load time, so secrets never
//! need to be written into the YAML files themselves.

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_yaml::Value;

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Missing(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(m) => write!(f, "config io error: {m}"),
            ConfigError::Parse(m) => write!(f, "config parse error: {m}"),
            ConfigError::Missing(m) => write!(f, "missing required config key: {m}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Loads layered config into a typed struct `T: DeserializeOwned`.
///
/// Resolution order (later layers win on a per-key basis):
/// 1. `application.yaml` next to the working directory (optional)
/// 2. `application-{profile}.yaml`, where profile comes from `APP_PROFILE`
///    (optional)
/// 3. `.env` / `.env.{profile}`, loaded via `dotenvy` into the process
///    environment (does not override variables already set)
/// 4. Environment variables, matched to config keys via a `APP__SECTION__KEY`
///    double-underscore convention and merged on top of the YAML layers.
pub struct ConfigLoader {
    profile: Option<String>,
    base_dir: std::path::PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: std::env::var("APP_PROFILE").ok(),
            base_dir: std::path::PathBuf::from("."),
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn load<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        dotenvy::dotenv().ok();
        if let Some(profile) = &self.profile {
            dotenvy::from_filename(format!(".env.{profile}")).ok();
        }

        let mut merged = Value::Mapping(Default::default());
        merge_file(&mut merged, &self.base_dir.join("application.yaml"))?;
        if let Some(profile) = &self.profile {
            merge_file(
                &mut merged,
                &self.base_dir.join(format!("application-{profile}.yaml")),
            )?;
        }

        resolve_placeholders(&mut merged);
        apply_env_overrides(&mut merged);

        serde_yaml::from_value(merged).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_file(target: &mut Value, path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
    let layer: Value =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
    merge_values(target, layer);
    Ok(())
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Walks every string leaf, substituting `${VAR}` with the environment
/// variable of the same name. Leaves the placeholder untouched if the
/// variable isn't set, so misconfiguration surfaces as a parse/type error
/// downstream rather than a silently empty secret.
fn resolve_placeholders(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(resolved) = substitute(s) {
                *s = resolved;
            }
        }
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                resolve_placeholders(v);
            }
        }
        Value::Sequence(seq) => {
            for v in seq.iter_mut() {
                resolve_placeholders(v);
            }
        }
        _ => {}
    }
}

fn substitute(input: &str) -> Option<String> {
    if !input.starts_with("${") || !input.ends_with('}') {
        return None;
    }
    let var_name = &input[2..input.len() - 1];
    std::env::var(var_name).ok()
}

/// Overrides mapping keys from `APP__SECTION__KEY` style environment
/// variables (double underscore separates nesting levels), matching the
/// convention used by twelve-factor deployments.
fn apply_env_overrides(root: &mut Value) {
    let overrides: HashMap<String, String> = std::env::vars()
        .filter_map(|(k, v)| k.strip_prefix("APP__").map(|rest| (rest.to_lowercase(), v)))
        .collect();

    for (path, raw_value) in overrides {
        let segments: Vec<&str> = path.split("__").collect();
        set_nested(root, &segments, raw_value);
    }
}

fn set_nested(root: &mut Value, segments: &[&str], raw_value: String) {
    let Value::Mapping(map) = root else {
        return;
    };
    if segments.len() == 1 {
        let key = Value::String(segments[0].to_string());
        let parsed = serde_yaml::from_str(&raw_value).unwrap_or(Value::String(raw_value));
        map.insert(key, parsed);
        return;
    }
    let key = Value::String(segments[0].to_string());
    let entry = map
        .entry(key)
        .or_insert_with(|| Value::Mapping(Default::default()));
    set_nested(entry, &segments[1..], raw_value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_resolves_from_env() {
        std::env::set_var("POS_CORE_TEST_SECRET", "sk_live_abc");
        let mut value = Value::String("${POS_CORE_TEST_SECRET}".to_string());
        resolve_placeholders(&mut value);
        assert_eq!(value, Value::String("sk_live_abc".to_string()));
        std::env::remove_var("POS_CORE_TEST_SECRET");
    }

    #[test]
    fn unresolvable_placeholder_left_untouched() {
        let mut value = Value::String("${POS_CORE_TEST_DOES_NOT_EXIST}".to_string());
        resolve_placeholders(&mut value);
        assert_eq!(
            value,
            Value::String("${POS_CORE_TEST_DOES_NOT_EXIST}".to_string())
        );
    }

    #[test]
    fn env_override_sets_nested_key() {
        let mut root = Value::Mapping(Default::default());
        std::env::set_var("APP__DATABASE__MAX_CONNECTIONS", "10");
        apply_env_overrides(&mut root);
        let database = root.get("database").unwrap();
        assert_eq!(database.get("max_connections").unwrap(), &Value::from(10));
        std::env::remove_var("APP__DATABASE__MAX_CONNECTIONS");
    }

    #[test]
    fn merge_prefers_overlay_values() {
        let mut base = serde_yaml::from_str("a: 1\nb: 2").unwrap();
        let overlay = serde_yaml::from_str("b: 3\nc: 4").unwrap();
        merge_values(&mut base, overlay);
        assert_eq!(base.get("a").unwrap(), &Value::from(1));
        assert_eq!(base.get("b").unwrap(), &Value::from(3));
        assert_eq!(base.get("c").unwrap(), &Value::from(4));
    }
}
