//! End-to-end merge decisions over complete pull request snapshots.

use std::collections::BTreeSet;

use review::events::PullRequestSnapshot;
use review::{Configuration, MergeHelper, Trigger};
use scm::memory::MemoryScm;
use scm::{MergeMethod, PullRequestUpdate};

const FREEZE_DOC: &str = r"
release:
  - branch: master
    community: [openeuler]
    frozen: true
    owner: [alice]
  - branch: openEuler-24.03-LTS
    community: [openeuler]
    frozen: false
    owner: []
";

fn snapshot(labels: &[&str]) -> PullRequestSnapshot {
    PullRequestSnapshot {
        org: "openeuler".to_string(),
        repo: "kernel".to_string(),
        number: 42,
        author: "carol".to_string(),
        base_ref: "openEuler-24.03-LTS".to_string(),
        open: true,
        mergeable: true,
        labels: labels.iter().map(|l| (*l).to_string()).collect::<BTreeSet<_>>(),
        ..PullRequestSnapshot::default()
    }
}

fn config() -> Configuration {
    Configuration::from_yaml(
        r"
config_items:
  - repos: [openeuler]
    missing_labels_for_merge: [do-not-merge]
    merge_method: squash
    freeze_file:
      - {owner: release, repo: mgmt, branch: main, path: freeze.yaml}
  - repos: [openeuler/kernel]
    lgtm_counts_required: 2
    freeze_file:
      - {owner: release, repo: mgmt, branch: main, path: freeze.yaml}
",
    )
    .unwrap()
}

fn platform() -> MemoryScm {
    let scm = MemoryScm::new();
    scm.set_file("release", "mgmt", "freeze.yaml", "main", FREEZE_DOC);
    scm
}

#[tokio::test]
async fn test_ready_pr_is_merged_with_configured_method() {
    let scm = platform();
    let config = config();
    let cfg = config.config_for("openeuler", "docs").unwrap();
    let pr = PullRequestSnapshot {
        repo: "docs".to_string(),
        need_review: true,
        ..snapshot(&["lgtm", "approved"])
    };

    let helper = MergeHelper::new(&scm, cfg, &pr);
    assert!(helper.decide(None).await.unwrap().is_mergeable());
    helper.try_merge(Trigger::LabelUpdate).await.unwrap();

    assert_eq!(
        scm.updates(),
        vec![(42, PullRequestUpdate::clear_review_requirements())]
    );
    let merges = scm.merges();
    assert_eq!(merges.len(), 1);
    assert_eq!(merges[0].repo, "docs");
    assert_eq!(merges[0].method, MergeMethod::Squash);
}

#[tokio::test]
async fn test_repo_item_overrides_org_item() {
    let scm = platform();
    let config = config();
    let cfg = config.config_for("openeuler", "kernel").unwrap();
    let pr = snapshot(&["lgtm-alice", "approved", "do-not-merge"]);

    let verdict = MergeHelper::new(&scm, cfg, &pr).decide(None).await.unwrap();

    assert_eq!(
        verdict.reasons(),
        ["PR needs 2 lgtm labels and now gets 1".to_string()]
    );
}

#[tokio::test]
async fn test_forbidden_label_blocks() {
    let scm = platform();
    let config = config();
    let cfg = config.config_for("openeuler", "docs").unwrap();
    let pr = snapshot(&["lgtm", "approved", "do-not-merge"]);

    let verdict = MergeHelper::new(&scm, cfg, &pr).decide(None).await.unwrap();

    assert_eq!(
        verdict.reasons(),
        ["PR should remove these labels: do-not-merge".to_string()]
    );
}

#[tokio::test]
async fn test_frozen_master_exempts_only_owners() {
    let scm = platform();
    let config = config();
    let cfg = config.config_for("openeuler", "docs").unwrap();
    let pr = PullRequestSnapshot {
        base_ref: "master".to_string(),
        ..snapshot(&["lgtm", "approved"])
    };
    let helper = MergeHelper::new(&scm, cfg, &pr);

    let verdict = helper.decide(Some("bob")).await.unwrap();
    assert_eq!(verdict.reasons().len(), 1);
    assert!(verdict.reasons()[0].contains("alice"));

    assert!(helper.decide(Some("ALICE")).await.unwrap().is_mergeable());
}

#[tokio::test]
async fn test_unfrozen_entry_does_not_block() {
    let scm = platform();
    let config = config();
    let cfg = config.config_for("openeuler", "docs").unwrap();
    let pr = snapshot(&["lgtm", "approved"]);

    assert!(MergeHelper::new(&scm, cfg, &pr)
        .decide(Some("bob"))
        .await
        .unwrap()
        .is_mergeable());
}

#[tokio::test]
async fn test_conflict_reported_whatever_else_holds() {
    let scm = platform();
    let config = config();
    let cfg = config.config_for("openeuler", "docs").unwrap();
    let pr = PullRequestSnapshot {
        mergeable: false,
        base_ref: "master".to_string(),
        ..snapshot(&["do-not-merge"])
    };

    let verdict = MergeHelper::new(&scm, cfg, &pr)
        .decide(Some("bob"))
        .await
        .unwrap();

    assert_eq!(verdict.reasons()[0], "PR conflicts to the target branch.");
    assert_eq!(verdict.reasons().len(), 4);
}
