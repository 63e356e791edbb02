//! User, group and sudo rule entities, parsed strictly from their
//! colon-separated sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `/etc/passwd` row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home_dir: String,
    pub shell: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// One `/etc/group` row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub gid: u32,
    pub members: Vec<String>,
}

/// One sudoers rule line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SudoRule {
    pub user: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runas: String,
    pub commands: String,
}

/// Users/groups category container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGroupState {
    pub users: BTreeMap<String, UserInfo>,
    pub groups: BTreeMap<String, GroupInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sudo_rules: Vec<SudoRule>,
}
