//! Bot configuration
//!
//! The configuration file holds a list of items, each one the merge policy for
//! a set of repositories. Items are loaded once at startup, defaulted and
//! validated, and then handed out read-only per event.

use anyhow::{bail, Context};
use regex::Regex;
use scm::MergeMethod;
use serde::Deserialize;
use tracing::info;

use crate::error::{ReviewError, ReviewResult};
use crate::freeze::FreezeFile;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub config_items: Vec<BotConfig>,
}

impl Configuration {
    /// Load, default and validate a YAML configuration file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config = Self::from_yaml(&raw).with_context(|| format!("Invalid config file {path}"))?;

        info!(
            path,
            items = config.config_items.len(),
            "Loaded review bot configuration"
        );
        Ok(config)
    }

    /// Parse, default and validate a YAML document.
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let mut config: Configuration =
            serde_yaml::from_str(raw).context("Failed to parse configuration YAML")?;
        config.set_default();
        config.validate()?;
        Ok(config)
    }

    pub fn set_default(&mut self) {
        for item in &mut self.config_items {
            item.set_default();
        }
    }

    pub fn validate(&mut self) -> anyhow::Result<()> {
        for (i, item) in self.config_items.iter_mut().enumerate() {
            item.validate()
                .with_context(|| format!("config_items[{i}] is invalid"))?;
        }
        Ok(())
    }

    /// Policy for `org/repo`. An item naming the repository wins over one naming its org.
    pub fn config_for(&self, org: &str, repo: &str) -> ReviewResult<&BotConfig> {
        let full_name = format!("{org}/{repo}");

        self.config_items
            .iter()
            .find(|c| c.repos.iter().any(|r| *r == full_name))
            .or_else(|| {
                self.config_items.iter().find(|c| {
                    c.repos.iter().any(|r| r == org) && !c.excluded_repos.contains(&full_name)
                })
            })
            .ok_or_else(|| ReviewError::NoConfig {
                org: org.to_string(),
                repo: repo.to_string(),
            })
    }
}

/// Merge policy for a set of repositories.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    /// Repositories covered, as `org` or `org/repo`.
    #[serde(default)]
    pub repos: Vec<String>,

    /// `org/repo` entries excluded from an org-wide item.
    #[serde(default)]
    pub excluded_repos: Vec<String>,

    /// Number of lgtm labels a PR needs. Above 1, each reviewer adds an
    /// `lgtm-<login>` label and every label of the lgtm family is counted.
    #[serde(default)]
    pub lgtm_counts_required: u32,

    /// Grant /lgtm and /approve to the owners of the sig directories a PR
    /// touches, when every change lies under `sigs_dir`.
    #[serde(default)]
    pub check_permission_based_on_sig_owners: bool,

    /// Root of the sig directories. Required when the sig owner check is on.
    #[serde(default)]
    pub sigs_dir: String,

    #[serde(skip)]
    sig_dir_pattern: Option<Regex>,

    /// Labels a PR needs besides `approved` and the lgtm labels.
    #[serde(default)]
    pub labels_for_merge: Vec<String>,

    /// Labels a PR must not carry to be merged.
    #[serde(default)]
    pub missing_labels_for_merge: Vec<String>,

    #[serde(default)]
    pub merge_method: MergeMethod,

    /// Skip the "please set a reviewer" reminder on newly opened PRs.
    #[serde(default)]
    pub unable_checking_reviewer_for_pr: bool,

    /// Branch freeze documents, consulted in order.
    #[serde(default)]
    pub freeze_file: Vec<FreezeFile>,
}

impl BotConfig {
    pub fn set_default(&mut self) {
        if self.lgtm_counts_required == 0 {
            self.lgtm_counts_required = 1;
        }
    }

    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.repos.is_empty() {
            bail!("repos must not be empty");
        }

        for f in &self.freeze_file {
            f.validate()?;
        }

        if self.check_permission_based_on_sig_owners {
            let dir = self.sigs_dir.trim().trim_end_matches('/');
            if dir.is_empty() {
                bail!("missing sigs_dir");
            }

            let pattern = format!(r"^{}/[-\w]+/", regex::escape(dir));
            let re = Regex::new(&pattern)
                .with_context(|| format!("invalid sigs_dir pattern {pattern}"))?;
            self.sig_dir_pattern = Some(re);
        }

        Ok(())
    }

    /// Compiled sig directory pattern; `None` when the sig owner check is off.
    pub fn sig_dir_pattern(&self) -> Option<&Regex> {
        if self.check_permission_based_on_sig_owners {
            self.sig_dir_pattern.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r"
config_items:
  - repos: [openeuler]
    excluded_repos: [openeuler/kernel]
    labels_for_merge: [ci_successful]
  - repos: [openeuler/kernel]
    lgtm_counts_required: 2
    merge_method: squash
  - repos: [openeuler/community]
    check_permission_based_on_sig_owners: true
    sigs_dir: sigs/
    freeze_file:
      - owner: openeuler
        repo: release-management
        branch: master
        path: freeze.yaml
";

    #[test]
    fn test_defaults_applied() {
        let cfg = Configuration::from_yaml(CONFIG).unwrap();
        let item = cfg.config_for("openeuler", "docs").unwrap();

        assert_eq!(item.lgtm_counts_required, 1);
        assert_eq!(item.merge_method, MergeMethod::Merge);
        assert_eq!(item.labels_for_merge, vec!["ci_successful"]);
    }

    #[test]
    fn test_repo_item_wins_over_org_item() {
        let cfg = Configuration::from_yaml(CONFIG).unwrap();
        let item = cfg.config_for("openeuler", "kernel").unwrap();

        assert_eq!(item.lgtm_counts_required, 2);
        assert_eq!(item.merge_method, MergeMethod::Squash);
    }

    #[test]
    fn test_no_config_for_unknown_org() {
        let cfg = Configuration::from_yaml(CONFIG).unwrap();
        let err = cfg.config_for("src-openeuler", "kernel").unwrap_err();
        assert_eq!(err.to_string(), "no config for this repo: src-openeuler/kernel");
    }

    #[test]
    fn test_sig_dir_pattern_compiled_once_at_load() {
        let cfg = Configuration::from_yaml(CONFIG).unwrap();
        let item = cfg.config_for("openeuler", "community").unwrap();

        let re = item.sig_dir_pattern().unwrap();
        assert!(re.is_match("sigs/sig-infra/OWNERS"));
        assert!(re.is_match("sigs/Kernel_2/src/main.c"));
        assert!(!re.is_match("sigs/README.md"));
        assert!(!re.is_match("docs/sigs/infra/OWNERS"));

        assert_eq!(item.freeze_file.len(), 1);
        assert!(cfg
            .config_for("openeuler", "docs")
            .unwrap()
            .sig_dir_pattern()
            .is_none());
    }

    #[test]
    fn test_missing_sigs_dir_rejected() {
        let raw = r"
config_items:
  - repos: [openeuler/community]
    check_permission_based_on_sig_owners: true
";
        let err = Configuration::from_yaml(raw).unwrap_err();
        assert!(format!("{err:#}").contains("missing sigs_dir"));
    }

    #[test]
    fn test_unsupported_merge_method_rejected() {
        let raw = r"
config_items:
  - repos: [openeuler]
    merge_method: rebase
";
        assert!(Configuration::from_yaml(raw).is_err());
    }

    #[test]
    fn test_empty_repos_rejected() {
        let raw = r"
config_items:
  - lgtm_counts_required: 1
";
        let err = Configuration::from_yaml(raw).unwrap_err();
        assert!(format!("{err:#}").contains("repos must not be empty"));
    }
}
