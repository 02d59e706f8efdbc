use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use fleet_core::write_text_atomic;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const ACCESS_STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Persisted set of user ids allowed to issue commands.
pub struct AllowListFile {
    pub schema_version: u32,
    #[serde(default)]
    pub users: BTreeSet<i64>,
}

impl Default for AllowListFile {
    fn default() -> Self {
        Self {
            schema_version: ACCESS_STATE_SCHEMA_VERSION,
            users: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Admin-issued invites keyed by lowercase handle.
pub struct PendingAddFile {
    pub schema_version: u32,
    #[serde(default)]
    pub handles: BTreeMap<String, bool>,
}

impl Default for PendingAddFile {
    fn default() -> Self {
        Self {
            schema_version: ACCESS_STATE_SCHEMA_VERSION,
            handles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingApproval {
    pub display_name: String,
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Outstanding access requests keyed by requesting user id.
pub struct PendingApprovalFile {
    pub schema_version: u32,
    #[serde(default)]
    pub requests: BTreeMap<i64, PendingApproval>,
}

impl Default for PendingApprovalFile {
    fn default() -> Self {
        Self {
            schema_version: ACCESS_STATE_SCHEMA_VERSION,
            requests: BTreeMap::new(),
        }
    }
}

trait VersionedDocument: Default + DeserializeOwned + Serialize {
    const KIND: &'static str;
    fn schema_version(&self) -> u32;
}

impl VersionedDocument for AllowListFile {
    const KIND: &'static str = "allow-list";
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

impl VersionedDocument for PendingAddFile {
    const KIND: &'static str = "pending-add";
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

impl VersionedDocument for PendingApprovalFile {
    const KIND: &'static str = "pending-approval";
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

fn load_document<T: VersionedDocument>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {} state {}", T::KIND, path.display()))?;
    let parsed = serde_json::from_str::<T>(&raw)
        .with_context(|| format!("failed to parse {} state {}", T::KIND, path.display()))?;
    if parsed.schema_version() != ACCESS_STATE_SCHEMA_VERSION {
        bail!(
            "unsupported {} schema_version {} in {} (expected {})",
            T::KIND,
            parsed.schema_version(),
            path.display(),
            ACCESS_STATE_SCHEMA_VERSION
        );
    }
    Ok(parsed)
}

fn save_document<T: VersionedDocument>(path: &Path, document: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(document)
        .with_context(|| format!("failed to encode {} state", T::KIND))?;
    payload.push('\n');
    write_text_atomic(path, &payload)
        .with_context(|| format!("failed to write {} state {}", T::KIND, path.display()))
}

pub fn load_allow_list(path: &Path) -> Result<AllowListFile> {
    load_document(path)
}

pub fn save_allow_list(path: &Path, document: &AllowListFile) -> Result<()> {
    save_document(path, document)
}

pub fn load_pending_adds(path: &Path) -> Result<PendingAddFile> {
    load_document(path)
}

pub fn save_pending_adds(path: &Path, document: &PendingAddFile) -> Result<()> {
    save_document(path, document)
}

pub fn load_pending_approvals(path: &Path) -> Result<PendingApprovalFile> {
    load_document(path)
}

pub fn save_pending_approvals(path: &Path, document: &PendingApprovalFile) -> Result<()> {
    save_document(path, document)
}

#[cfg(test)]
mod tests {
    use super::{
        load_allow_list, load_pending_adds, load_pending_approvals, save_allow_list,
        save_pending_approvals, AllowListFile, PendingApproval, PendingApprovalFile,
    };

    #[test]
    fn unit_missing_files_load_as_empty_documents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let allow = load_allow_list(&temp.path().join("security/allowlist.json")).expect("allow");
        assert!(allow.users.is_empty());
        let adds = load_pending_adds(&temp.path().join("security/pending-add.json")).expect("adds");
        assert!(adds.handles.is_empty());
    }

    #[test]
    fn functional_pending_approvals_keep_integer_keys_across_reload() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("security/pending-approvals.json");
        let mut document = PendingApprovalFile::default();
        document.requests.insert(
            4242,
            PendingApproval {
                display_name: "Dana Q".to_string(),
                handle: Some("danaq".to_string()),
            },
        );
        save_pending_approvals(&path, &document).expect("save");

        let reloaded = load_pending_approvals(&path).expect("load");
        assert_eq!(reloaded, document);
        let raw = std::fs::read_to_string(&path).expect("raw");
        assert!(raw.contains("\"4242\""), "{raw}");
    }

    #[test]
    fn regression_schema_mismatch_is_rejected_with_path_context() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("allowlist.json");
        std::fs::write(&path, r#"{"schema_version": 7, "users": [1]}"#).expect("write");
        let error = load_allow_list(&path).expect_err("schema mismatch");
        let message = format!("{error:#}");
        assert!(message.contains("unsupported allow-list schema_version 7"), "{message}");
        assert!(message.contains("allowlist.json"), "{message}");
    }

    #[test]
    fn unit_allow_list_saves_sorted_unique_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("allowlist.json");
        let mut document = AllowListFile::default();
        for id in [30, 10, 30, 20] {
            document.users.insert(id);
        }
        save_allow_list(&path, &document).expect("save");
        let reloaded = load_allow_list(&path).expect("load");
        assert_eq!(reloaded.users.into_iter().collect::<Vec<_>>(), vec![10, 20, 30]);
    }
}
