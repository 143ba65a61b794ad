//! Label policy: which labels a PR needs, which it must not carry, and how many lgtm labels count.

use std::collections::BTreeSet;

use crate::config::BotConfig;
use crate::events::login_key;

pub const LGTM_LABEL: &str = "lgtm";
pub const APPROVED_LABEL: &str = "approved";

/// Gitee rejects labels longer than this.
const LABEL_LEN_LIMIT: usize = 20;

/// Label added by `/lgtm`: `lgtm` itself when one approval is enough,
/// otherwise `lgtm-<login>` cut to the platform limit.
pub fn lgtm_label_for(commenter: &str, lgtm_counts_required: u32) -> String {
    if lgtm_counts_required <= 1 {
        return LGTM_LABEL.to_string();
    }

    format!("{LGTM_LABEL}-{}", login_key(commenter))
        .chars()
        .take(LABEL_LEN_LIMIT)
        .collect()
}

/// Every label of the lgtm family on the PR (`lgtm` and `lgtm-*`).
pub fn lgtm_labels_on_pr(labels: &BTreeSet<String>) -> Vec<String> {
    labels
        .iter()
        .filter(|l| l.starts_with(LGTM_LABEL))
        .cloned()
        .collect()
}

/// Reasons the label set blocks a merge. Empty when the labels satisfy the policy.
pub fn evaluate(labels: &BTreeSet<String>, cfg: &BotConfig) -> Vec<String> {
    let mut reasons = Vec::new();

    let mut needs: BTreeSet<&str> = BTreeSet::from([APPROVED_LABEL]);
    needs.extend(cfg.labels_for_merge.iter().map(String::as_str));

    let required = cfg.lgtm_counts_required;
    if required <= 1 {
        needs.insert(LGTM_LABEL);
    } else {
        let n = lgtm_labels_on_pr(labels).len();
        if n < required as usize {
            reasons.push(format!(
                "PR needs {required} lgtm labels and now gets {n}"
            ));
        }
    }

    let missing: Vec<&str> = needs
        .into_iter()
        .filter(|l| !labels.contains(*l))
        .collect();
    if !missing.is_empty() {
        reasons.push(format!(
            "PR does not have these labels: {}",
            missing.join(", ")
        ));
    }

    let forbidden: BTreeSet<&str> = cfg
        .missing_labels_for_merge
        .iter()
        .map(String::as_str)
        .filter(|l| labels.contains(*l))
        .collect();
    if !forbidden.is_empty() {
        reasons.push(format!(
            "PR should remove these labels: {}",
            forbidden.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(labels: &[&str]) -> BTreeSet<String> {
        labels.iter().map(|l| (*l).to_string()).collect()
    }

    fn cfg(required: u32) -> BotConfig {
        let mut cfg = BotConfig::default();
        cfg.lgtm_counts_required = required;
        cfg
    }

    #[test]
    fn test_single_lgtm_and_approved_is_enough() {
        assert!(evaluate(&set(&["lgtm", "approved"]), &cfg(1)).is_empty());
    }

    #[test]
    fn test_missing_baseline_labels() {
        let reasons = evaluate(&set(&["kind/bug"]), &cfg(1));
        assert_eq!(
            reasons,
            vec!["PR does not have these labels: approved, lgtm".to_string()]
        );
    }

    #[test]
    fn test_extra_labels_for_merge_required() {
        let mut c = cfg(1);
        c.labels_for_merge = vec!["ci_successful".to_string()];

        let reasons = evaluate(&set(&["lgtm", "approved"]), &c);
        assert_eq!(
            reasons,
            vec!["PR does not have these labels: ci_successful".to_string()]
        );
        assert!(evaluate(&set(&["lgtm", "approved", "ci_successful"]), &c).is_empty());
    }

    #[test]
    fn test_not_enough_lgtm_labels() {
        let reasons = evaluate(&set(&["lgtm-alice", "approved"]), &cfg(2));
        assert_eq!(
            reasons,
            vec!["PR needs 2 lgtm labels and now gets 1".to_string()]
        );
    }

    #[test]
    fn test_baseline_lgtm_alone_never_satisfies_more_than_one() {
        let reasons = evaluate(&set(&["lgtm", "approved"]), &cfg(2));
        assert_eq!(
            reasons,
            vec!["PR needs 2 lgtm labels and now gets 1".to_string()]
        );

        assert!(evaluate(&set(&["lgtm-alice", "lgtm-bob", "approved"]), &cfg(2)).is_empty());
    }

    #[test]
    fn test_lgtm_shortfall_and_missing_approved_both_reported() {
        let reasons = evaluate(&set(&["lgtm-alice"]), &cfg(2));
        assert_eq!(
            reasons,
            vec![
                "PR needs 2 lgtm labels and now gets 1".to_string(),
                "PR does not have these labels: approved".to_string(),
            ]
        );
    }

    #[test]
    fn test_forbidden_labels_listed() {
        let mut c = cfg(1);
        c.missing_labels_for_merge = vec!["do-not-merge".to_string(), "wip".to_string()];

        let reasons = evaluate(&set(&["lgtm", "approved", "do-not-merge"]), &c);
        assert_eq!(
            reasons,
            vec!["PR should remove these labels: do-not-merge".to_string()]
        );
    }

    #[test]
    fn test_lgtm_label_for() {
        assert_eq!(lgtm_label_for("Alice", 1), "lgtm");
        assert_eq!(lgtm_label_for("Alice", 2), "lgtm-alice");
        assert_eq!(
            lgtm_label_for("a-very-long-gitee-login", 3),
            "lgtm-a-very-long-git"
        );
        assert_eq!(lgtm_label_for("a-very-long-gitee-login", 3).len(), 20);
    }

    #[test]
    fn test_lgtm_labels_on_pr() {
        let labels = set(&["lgtm", "lgtm-bob", "approved", "kind/bug"]);
        assert_eq!(lgtm_labels_on_pr(&labels), vec!["lgtm", "lgtm-bob"]);
    }
}
