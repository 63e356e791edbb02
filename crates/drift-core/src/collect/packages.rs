//! Package collectors.
//!
//! A dispatcher maps configured manager names onto concrete probes and
//! runs them concurrently. Every probe shells out to its native manager
//! and parses the listing; missing or failing managers contribute nothing.
//! Merged keys take the form `manager:name` so the same package name under
//! two managers never collides.

use super::runner::CommandRunner;
use crate::model::PackageInfo;
use drift_common::{CollectError, Deadline};
use drift_config::PackagesConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::thread;
use tracing::debug;

type PackageMap = BTreeMap<String, PackageInfo>;

/// Collect installed packages for every configured manager.
pub fn collect_packages(
    config: &PackagesConfig,
    runner: &CommandRunner,
    deadline: &Deadline,
) -> (PackageMap, Option<CollectError>) {
    let managers = resolve_managers(&config.managers);
    let merged = Mutex::new(PackageMap::new());

    thread::scope(|scope| {
        for manager in &managers {
            let merged = &merged;
            let manager = *manager;
            scope.spawn(move || {
                let packages = run_manager(manager, runner, deadline);
                if packages.is_empty() {
                    return;
                }
                debug!(manager = manager.name(), count = packages.len(), "packages collected");
                let mut merged = merged.lock().expect("package merge lock poisoned");
                for (name, info) in packages {
                    merged.insert(format!("{}:{}", manager.name(), name), info);
                }
            });
        }
    });

    let error = deadline.check().err().map(|_| CollectError::Cancelled);
    (merged.into_inner().expect("package merge lock poisoned"), error)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Manager {
    Dpkg,
    Rpm,
    Apk,
    Pip,
    Npm,
    Go,
    Brew,
}

impl Manager {
    fn name(self) -> &'static str {
        match self {
            Manager::Dpkg => "dpkg",
            Manager::Rpm => "rpm",
            Manager::Apk => "apk",
            Manager::Pip => "pip",
            Manager::Npm => "npm",
            Manager::Go => "go",
            Manager::Brew => "brew",
        }
    }
}

/// Map configured manager names to probes; aliases collapse and
/// duplicates drop.
fn resolve_managers(names: &[String]) -> Vec<Manager> {
    let mut managers = Vec::new();
    for name in names {
        let manager = match name.as_str() {
            "apt" | "dpkg" => Manager::Dpkg,
            "yum" | "rpm" => Manager::Rpm,
            "apk" => Manager::Apk,
            "pip" | "pip3" => Manager::Pip,
            "npm" => Manager::Npm,
            "go" => Manager::Go,
            "brew" => Manager::Brew,
            other => {
                debug!(manager = other, "unknown package manager, skipping");
                continue;
            }
        };
        if !managers.contains(&manager) {
            managers.push(manager);
        }
    }
    managers
}

fn run_manager(manager: Manager, runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    if deadline.expired() {
        return PackageMap::new();
    }
    match manager {
        Manager::Dpkg => collect_dpkg(runner, deadline),
        Manager::Rpm => collect_rpm(runner, deadline),
        Manager::Apk => collect_apk(runner, deadline),
        Manager::Pip => collect_pip(runner, deadline),
        Manager::Npm => collect_npm(runner, deadline),
        Manager::Go => collect_go(runner, deadline),
        Manager::Brew => collect_brew(runner, deadline),
    }
}

fn collect_dpkg(runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    if !cfg!(target_os = "linux") {
        return PackageMap::new();
    }
    match runner.stdout(
        "dpkg-query",
        &["-W", "-f=${Package}\t${Version}\t${Architecture}\n"],
        deadline,
    ) {
        Some(output) => parse_tab_listing(&output, "dpkg"),
        None => PackageMap::new(),
    }
}

fn collect_rpm(runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    if !cfg!(target_os = "linux") {
        return PackageMap::new();
    }
    match runner.stdout(
        "rpm",
        &["-qa", "--queryformat", "%{NAME}\t%{VERSION}-%{RELEASE}\t%{ARCH}\n"],
        deadline,
    ) {
        Some(output) => parse_tab_listing(&output, "rpm"),
        None => PackageMap::new(),
    }
}

fn collect_apk(runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    match runner.stdout("apk", &["list", "--installed"], deadline) {
        Some(output) => parse_apk_listing(&output),
        None => PackageMap::new(),
    }
}

fn collect_pip(runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    // pip3 first, plain pip as fallback
    let output = runner
        .stdout("pip3", &["list", "--format=freeze"], deadline)
        .or_else(|| runner.stdout("pip", &["list", "--format=freeze"], deadline));
    match output {
        Some(output) => parse_pip_freeze(&output),
        None => PackageMap::new(),
    }
}

fn collect_npm(runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    // npm exits non-zero for dependency problems but still prints the tree
    let output = match runner.run("npm", &["list", "-g", "--depth=0", "--json"], deadline) {
        Ok(output) if !output.stdout.is_empty() => output.stdout_str(),
        _ => return PackageMap::new(),
    };
    parse_npm_json(&output)
}

fn collect_go(runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    match runner.stdout("go", &["list", "-m", "-json", "all"], deadline) {
        Some(output) => parse_go_modules(&output),
        None => PackageMap::new(),
    }
}

fn collect_brew(runner: &CommandRunner, deadline: &Deadline) -> PackageMap {
    if !cfg!(target_os = "macos") {
        return PackageMap::new();
    }
    match runner.stdout("brew", &["list", "--versions"], deadline) {
        Some(output) => parse_brew_listing(&output),
        None => PackageMap::new(),
    }
}

fn package(name: &str, version: &str, architecture: &str, manager: &str) -> PackageInfo {
    PackageInfo {
        name: name.to_string(),
        version: version.to_string(),
        architecture: architecture.to_string(),
        manager: manager.to_string(),
        exists: true,
    }
}

/// dpkg-query / rpm `name\tversion\tarch` rows.
fn parse_tab_listing(output: &str, manager: &str) -> PackageMap {
    let mut packages = PackageMap::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            continue;
        }
        let arch = parts.get(2).copied().unwrap_or("");
        packages.insert(
            parts[0].to_string(),
            package(parts[0], parts[1], arch, manager),
        );
    }
    packages
}

static APK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-(\d+[^\s]*)\s+(\w+)").unwrap());

/// `apk list --installed` rows: `name-version arch {origin} ...`.
fn parse_apk_listing(output: &str) -> PackageMap {
    let mut packages = PackageMap::new();
    for line in output.lines() {
        let Some(caps) = APK_LINE.captures(line) else {
            continue;
        };
        let name = &caps[1];
        packages.insert(name.to_string(), package(name, &caps[2], &caps[3], "apk"));
    }
    packages
}

/// `pip list --format=freeze` rows: `name==version`.
fn parse_pip_freeze(output: &str) -> PackageMap {
    let mut packages = PackageMap::new();
    for line in output.lines() {
        let Some((name, version)) = line.split_once("==") else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        packages.insert(name.to_string(), package(name, version, "", "pip"));
    }
    packages
}

/// `npm list -g --depth=0 --json`: `dependencies` map of `{version}`.
fn parse_npm_json(output: &str) -> PackageMap {
    let mut packages = PackageMap::new();
    let Ok(root) = serde_json::from_str::<serde_json::Value>(output) else {
        return packages;
    };
    let Some(deps) = root.get("dependencies").and_then(|d| d.as_object()) else {
        return packages;
    };
    for (name, entry) in deps {
        let Some(version) = entry.get("version").and_then(|v| v.as_str()) else {
            continue;
        };
        packages.insert(name.clone(), package(name, version, "", "npm"));
    }
    packages
}

/// `go list -m -json all`: a stream of concatenated JSON objects with
/// `Path` and `Version`. The main module has no version and is skipped.
fn parse_go_modules(output: &str) -> PackageMap {
    let mut packages = PackageMap::new();
    for value in serde_json::Deserializer::from_str(output).into_iter::<serde_json::Value>() {
        let Ok(value) = value else { break };
        let Some(path) = value.get("Path").and_then(|p| p.as_str()) else {
            continue;
        };
        let Some(version) = value.get("Version").and_then(|v| v.as_str()) else {
            continue;
        };
        packages.insert(path.to_string(), package(path, version, "", "go"));
    }
    packages
}

/// `brew list --versions` rows: `name version [version...]`.
fn parse_brew_listing(output: &str) -> PackageMap {
    let mut packages = PackageMap::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(version)) = (fields.next(), fields.next()) else {
            continue;
        };
        packages.insert(name.to_string(), package(name, version, "", "brew"));
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_managers_aliases_and_dedup() {
        let names: Vec<String> = ["apt", "dpkg", "yum", "pip3", "cargo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let managers = resolve_managers(&names);
        assert_eq!(managers, vec![Manager::Dpkg, Manager::Rpm, Manager::Pip]);
    }

    #[test]
    fn test_parse_tab_listing() {
        let output = "libc6\t2.36-9+deb12u4\tamd64\nbash\t5.2.15-2+b2\tamd64\nbroken-line\n";
        let packages = parse_tab_listing(output, "dpkg");
        assert_eq!(packages.len(), 2);
        assert_eq!(packages["libc6"].version, "2.36-9+deb12u4");
        assert_eq!(packages["libc6"].architecture, "amd64");
        assert_eq!(packages["bash"].manager, "dpkg");
    }

    #[test]
    fn test_parse_apk_listing() {
        let output = "musl-1.2.4-r2 x86_64 {musl} (MIT) [installed]\nnot a package line\n";
        let packages = parse_apk_listing(output);
        assert_eq!(packages.len(), 1);
        let musl = &packages["musl"];
        assert_eq!(musl.version, "1.2.4-r2");
        assert_eq!(musl.architecture, "x86_64");
    }

    #[test]
    fn test_parse_pip_freeze() {
        let output = "requests==2.31.0\nurllib3==2.0.7\n# comment\n";
        let packages = parse_pip_freeze(output);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages["requests"].version, "2.31.0");
        assert_eq!(packages["requests"].manager, "pip");
    }

    #[test]
    fn test_parse_npm_json() {
        let output = r#"{
            "name": "global",
            "dependencies": {
                "npm": { "version": "10.2.4" },
                "yarn": { "version": "1.22.21" }
            }
        }"#;
        let packages = parse_npm_json(output);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages["npm"].version, "10.2.4");
    }

    #[test]
    fn test_parse_go_modules() {
        let output = r#"{
            "Path": "example.com/app",
            "Main": true
        }
        {
            "Path": "github.com/google/uuid",
            "Version": "v1.6.0"
        }"#;
        let packages = parse_go_modules(output);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages["github.com/google/uuid"].version, "v1.6.0");
    }

    #[test]
    fn test_parse_brew_listing() {
        let output = "openssl@3 3.2.0\nwget 1.21.4 1.21.3\n";
        let packages = parse_brew_listing(output);
        assert_eq!(packages["openssl@3"].version, "3.2.0");
        assert_eq!(packages["wget"].version, "1.21.4");
    }

    #[test]
    fn test_missing_managers_yield_empty() {
        let config = PackagesConfig {
            enabled: true,
            managers: vec!["apk".to_string()],
        };
        // apk is almost certainly absent on dev hosts; the probe must
        // degrade to empty output rather than error
        let (packages, error) =
            collect_packages(&config, &CommandRunner::default(), &Deadline::none());
        assert!(error.is_none());
        let _ = packages;
    }
}
