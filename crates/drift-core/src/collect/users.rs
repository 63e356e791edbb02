//! User, group and sudo rule collector.
//!
//! `/etc/passwd` and `/etc/group` parse strictly from their
//! colon-separated form; rows with too few fields or non-numeric ids are
//! skipped. Sudo rules come from `/etc/sudoers`, plus every file under
//! `/etc/sudoers.d` on macOS. Comment and blank lines are skipped.

use crate::model::{GroupInfo, SudoRule, UserGroupState, UserInfo};
use drift_common::{CollectError, Deadline};
use drift_config::UsersGroupsConfig;
use std::collections::BTreeMap;
use tracing::debug;

/// Collect the users/groups category.
pub fn collect_users_groups(
    config: &UsersGroupsConfig,
    deadline: &Deadline,
) -> (UserGroupState, Option<CollectError>) {
    let mut state = UserGroupState::default();

    if config.users {
        if let Ok(data) = std::fs::read_to_string("/etc/passwd") {
            state.users = parse_passwd(&data);
        }
    }
    if deadline.check().is_err() {
        return (state, Some(CollectError::Cancelled));
    }

    if config.groups {
        if let Ok(data) = std::fs::read_to_string("/etc/group") {
            state.groups = parse_group(&data);
        }
    }
    if deadline.check().is_err() {
        return (state, Some(CollectError::Cancelled));
    }

    if config.sudo_rules {
        if let Ok(data) = std::fs::read_to_string("/etc/sudoers") {
            state.sudo_rules = parse_sudoers(&data);
        }
        if cfg!(target_os = "macos") {
            if let Ok(entries) = std::fs::read_dir("/etc/sudoers.d") {
                for entry in entries.flatten() {
                    if deadline.check().is_err() {
                        return (state, Some(CollectError::Cancelled));
                    }
                    if entry.path().is_dir() {
                        continue;
                    }
                    if let Ok(data) = std::fs::read_to_string(entry.path()) {
                        state.sudo_rules.extend(parse_sudoers(&data));
                    }
                }
            }
        }
    }

    debug!(
        users = state.users.len(),
        groups = state.groups.len(),
        "users and groups collected"
    );
    (state, None)
}

/// Parse `/etc/passwd` rows: `name:passwd:uid:gid:comment:home:shell`.
fn parse_passwd(data: &str) -> BTreeMap<String, UserInfo> {
    let mut users = BTreeMap::new();
    for line in data.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            continue;
        }
        let (Ok(uid), Ok(gid)) = (fields[2].parse::<u32>(), fields[3].parse::<u32>()) else {
            continue;
        };
        users.insert(
            fields[0].to_string(),
            UserInfo {
                name: fields[0].to_string(),
                uid,
                gid,
                home_dir: fields[5].to_string(),
                shell: fields[6].to_string(),
                comment: fields[4].to_string(),
            },
        );
    }
    users
}

/// Parse `/etc/group` rows: `name:passwd:gid:member,member`.
fn parse_group(data: &str) -> BTreeMap<String, GroupInfo> {
    let mut groups = BTreeMap::new();
    for line in data.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 4 {
            continue;
        }
        let Ok(gid) = fields[2].parse::<u32>() else {
            continue;
        };
        let members = if fields[3].is_empty() {
            Vec::new()
        } else {
            fields[3].split(',').map(|m| m.to_string()).collect()
        };
        groups.insert(
            fields[0].to_string(),
            GroupInfo {
                name: fields[0].to_string(),
                gid,
                members,
            },
        );
    }
    groups
}

/// Parse sudoers rule lines into user/host/runas/commands records.
/// Directives (`Defaults`, aliases, `@include`) and comments are skipped.
fn parse_sudoers(data: &str) -> Vec<SudoRule> {
    let mut rules = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
            continue;
        }
        if line.starts_with("Defaults")
            || line.starts_with("Cmnd_Alias")
            || line.starts_with("User_Alias")
            || line.starts_with("Host_Alias")
            || line.starts_with("Runas_Alias")
        {
            continue;
        }

        let Some((user, spec)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }

        // host = (runas) commands
        let (host, rest) = match spec.split_once('=') {
            Some((host, rest)) => (host.trim().to_string(), rest.trim()),
            None => ("ALL".to_string(), spec),
        };

        let (runas, commands) = if let Some(rest) = rest.strip_prefix('(') {
            match rest.split_once(')') {
                Some((runas, commands)) => (runas.trim().to_string(), commands.trim()),
                None => (String::new(), rest),
            }
        } else {
            (String::new(), rest)
        };

        rules.push(SudoRule {
            user: user.to_string(),
            host,
            runas,
            commands: commands.to_string(),
        });
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_passwd() {
        let data = "\
root:x:0:0:root:/root:/bin/bash
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
badline:x:notanumber:0::/:/bin/sh
short:x:1
";
        let users = parse_passwd(data);
        assert_eq!(users.len(), 2);
        let root = &users["root"];
        assert_eq!(root.uid, 0);
        assert_eq!(root.home_dir, "/root");
        assert_eq!(root.shell, "/bin/bash");
        assert_eq!(users["daemon"].comment, "daemon");
    }

    #[test]
    fn test_parse_group() {
        let data = "\
root:x:0:
sudo:x:27:alice,bob
broken
";
        let groups = parse_group(data);
        assert_eq!(groups.len(), 2);
        assert!(groups["root"].members.is_empty());
        assert_eq!(groups["sudo"].members, vec!["alice", "bob"]);
        assert_eq!(groups["sudo"].gid, 27);
    }

    #[test]
    fn test_parse_sudoers() {
        let data = "\
# User privilege specification
Defaults env_reset
root    ALL=(ALL:ALL) ALL
%sudo   ALL=(ALL) NOPASSWD: /usr/bin/systemctl
@includedir /etc/sudoers.d
";
        let rules = parse_sudoers(data);
        assert_eq!(rules.len(), 2);

        assert_eq!(rules[0].user, "root");
        assert_eq!(rules[0].host, "ALL");
        assert_eq!(rules[0].runas, "ALL:ALL");
        assert_eq!(rules[0].commands, "ALL");

        assert_eq!(rules[1].user, "%sudo");
        assert_eq!(rules[1].runas, "ALL");
        assert_eq!(rules[1].commands, "NOPASSWD: /usr/bin/systemctl");
    }

    #[test]
    fn test_collect_users_groups_smoke() {
        let config = UsersGroupsConfig::default();
        let (state, error) = collect_users_groups(&config, &Deadline::none());
        assert!(error.is_none());
        if cfg!(target_os = "linux") {
            assert!(state.users.contains_key("root"));
            assert_eq!(state.users["root"].uid, 0);
        }
    }
}
