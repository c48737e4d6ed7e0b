//! Record keys — user key plus a deterministic digest.

use crate::error::{KvsqlError, KvsqlResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest length in bytes
pub const DIGEST_LEN: usize = 20;

/// Literal a record is keyed by.
///
/// 32-bit and 64-bit integers share one representation, so `1i32` and `1i64`
/// address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UserKey {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl UserKey {
    /// Accepted kinds: text, 32/64-bit integer, raw bytes. `column` only labels the error.
    pub fn from_value(column: &str, value: &Value) -> KvsqlResult<Self> {
        match value {
            Value::Int64(v) => Ok(UserKey::Int(*v)),
            Value::Int32(v) => Ok(UserKey::Int(i64::from(*v))),
            Value::Text(v) => Ok(UserKey::Text(v.clone())),
            Value::Bytes(v) => Ok(UserKey::Bytes(v.clone())),
            other => Err(KvsqlError::invalid_value(column, other)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            UserKey::Int(v) => Value::Int64(*v),
            UserKey::Text(v) => Value::Text(v.clone()),
            UserKey::Bytes(v) => Value::Bytes(v.clone()),
        }
    }

    fn type_tag(&self) -> u8 {
        match self {
            UserKey::Int(_) => 1,
            UserKey::Text(_) => 3,
            UserKey::Bytes(_) => 4,
        }
    }

    /// Order-preserving byte encoding used as the on-disk key.
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.type_tag()];
        match self {
            // flip the sign bit so negative numbers sort first
            UserKey::Int(v) => out.extend_from_slice(&((*v as u64) ^ (1 << 63)).to_be_bytes()),
            UserKey::Text(v) => out.extend_from_slice(v.as_bytes()),
            UserKey::Bytes(v) => out.extend_from_slice(v),
        }
        out
    }

    pub fn from_storage_bytes(bytes: &[u8]) -> KvsqlResult<Self> {
        let (tag, body) = bytes
            .split_first()
            .ok_or_else(|| KvsqlError::Serialization("empty key".to_string()))?;
        match tag {
            1 => {
                let raw: [u8; 8] = body.try_into().map_err(|_| {
                    KvsqlError::Serialization(format!("integer key of {} bytes", body.len()))
                })?;
                Ok(UserKey::Int((u64::from_be_bytes(raw) ^ (1 << 63)) as i64))
            }
            3 => String::from_utf8(body.to_vec())
                .map(UserKey::Text)
                .map_err(|e| KvsqlError::Serialization(e.to_string())),
            4 => Ok(UserKey::Bytes(body.to_vec())),
            other => Err(KvsqlError::Serialization(format!("unknown key tag {other}"))),
        }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::Int(v) => write!(f, "{v}"),
            UserKey::Text(v) => write!(f, "'{v}'"),
            UserKey::Bytes(v) => write!(f, "{v:?}"),
        }
    }
}

/// Address of one record: namespace, set and user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    namespace: String,
    set: String,
    user_key: UserKey,
    digest: [u8; DIGEST_LEN],
}

impl Key {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, user_key: UserKey) -> Self {
        let set = set.into();
        let digest = compute_digest(&set, &user_key);
        Self {
            namespace: namespace.into(),
            set,
            user_key,
            digest,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn set(&self) -> &str {
        &self.set
    }

    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.set, self.user_key)
    }
}

/// SHA-256 over set name, key type tag and key bytes, truncated to 20 bytes.
fn compute_digest(set: &str, user_key: &UserKey) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(set.as_bytes());
    hasher.update([user_key.type_tag()]);
    match user_key {
        UserKey::Int(v) => hasher.update(v.to_be_bytes()),
        UserKey::Text(v) => hasher.update(v.as_bytes()),
        UserKey::Bytes(v) => hasher.update(v),
    }
    let full = hasher.finalize();
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&full[..DIGEST_LEN]);
    digest
}
