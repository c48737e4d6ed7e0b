//! Executor configuration
//!
//! Defaults can be overridden from `KVSQL_*` environment variables or a JSON file.

use crate::error::{KvsqlError, KvsqlResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// 기본 샘플링 레코드 수 (타입 탐색용)
pub const DEFAULT_SAMPLE_LIMIT: usize = 100;

/// Key pseudo-columns a cursor exposes next to the stored bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialFields {
    /// User key under the primary-key column name
    pub pk: bool,
    /// 20-byte key digest under the digest column name
    pub pk_digest: bool,
}

impl Default for SpecialFields {
    fn default() -> Self {
        Self {
            pk: true,
            pk_digest: true,
        }
    }
}

impl SpecialFields {
    pub fn none() -> Self {
        Self {
            pk: false,
            pk_digest: false,
        }
    }

    /// `"pk,pk_digest"` 형식의 목록 파싱
    pub fn parse_list(s: &str) -> KvsqlResult<Self> {
        let mut fields = Self::none();
        for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            match item.to_ascii_lowercase().as_str() {
                "pk" => fields.pk = true,
                "pk_digest" => fields.pk_digest = true,
                other => {
                    return Err(KvsqlError::Config(format!(
                        "unknown special field '{other}'"
                    )));
                }
            }
        }
        Ok(fields)
    }
}

/// Statement execution settings shared by all executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Namespace used when a statement does not name one
    pub namespace: String,
    /// Primary-key pseudo-column name
    pub primary_key_column: String,
    /// Digest pseudo-column name
    pub digest_column: String,
    pub special_fields: SpecialFields,
    /// Upper bound of records read by type discovery
    pub sample_limit: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            namespace: "test".to_string(),
            primary_key_column: "PK".to_string(),
            digest_column: "PK_DIGEST".to_string(),
            special_fields: SpecialFields::default(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

impl ExecutorConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    pub fn with_special_fields(mut self, fields: SpecialFields) -> Self {
        self.special_fields = fields;
        self
    }

    /// 환경 변수에서 로드 (기본값 위에 덮어쓰기)
    pub fn from_env() -> KvsqlResult<Self> {
        Self::default().apply_env(|name| env::var(name).ok())
    }

    /// Overlay values produced by `lookup` for each `KVSQL_*` variable.
    pub fn apply_env<F>(mut self, lookup: F) -> KvsqlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ns) = lookup("KVSQL_NAMESPACE") {
            self.namespace = ns;
        }
        if let Some(pk) = lookup("KVSQL_PRIMARY_KEY") {
            self.primary_key_column = pk;
        }
        if let Some(limit) = lookup("KVSQL_SAMPLE_LIMIT") {
            self.sample_limit = limit.trim().parse().map_err(|_| {
                KvsqlError::Config(format!("KVSQL_SAMPLE_LIMIT is not a number: {limit}"))
            })?;
        }
        if let Some(fields) = lookup("KVSQL_SPECIAL_FIELDS") {
            self.special_fields = SpecialFields::parse_list(&fields)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// 파일에서 로드
    pub fn from_json_file(path: &Path) -> KvsqlResult<Self> {
        let json = fs::read_to_string(path)?;
        let config: ExecutorConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// 파일에 저장
    pub fn save_json(&self, path: &Path) -> KvsqlResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }

    fn validate(&self) -> KvsqlResult<()> {
        if self.primary_key_column.is_empty() {
            return Err(KvsqlError::Config(
                "primary key column name must not be empty".to_string(),
            ));
        }
        if self.sample_limit == 0 {
            return Err(KvsqlError::Config("sample limit must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.primary_key_column, "PK");
        assert_eq!(config.digest_column, "PK_DIGEST");
        assert_eq!(config.sample_limit, DEFAULT_SAMPLE_LIMIT);
        assert!(config.special_fields.pk);
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("KVSQL_NAMESPACE", "bar"),
            ("KVSQL_SAMPLE_LIMIT", "7"),
            ("KVSQL_SPECIAL_FIELDS", "pk"),
        ]
        .into_iter()
        .collect();

        let config = ExecutorConfig::default()
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.namespace, "bar");
        assert_eq!(config.sample_limit, 7);
        assert!(config.special_fields.pk);
        assert!(!config.special_fields.pk_digest);
    }

    #[test]
    fn test_apply_env_rejects_bad_limit() {
        let result = ExecutorConfig::default().apply_env(|name| {
            (name == "KVSQL_SAMPLE_LIMIT").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(KvsqlError::Config(_))));
    }

    #[test]
    fn test_unknown_special_field() {
        assert!(SpecialFields::parse_list("pk,rowid").is_err());
        assert_eq!(SpecialFields::parse_list("").unwrap(), SpecialFields::none());
    }

    #[test]
    fn test_json_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kvsql.json");
        let config = ExecutorConfig::default()
            .with_namespace("people_ns")
            .with_sample_limit(3);

        config.save_json(&path).unwrap();
        let loaded = ExecutorConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "namespace": "bar" }"#).unwrap();

        let loaded = ExecutorConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.namespace, "bar");
        assert_eq!(loaded.primary_key_column, "PK");
    }
}
