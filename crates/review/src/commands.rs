//! Gating commands recognized in pull request comments.
//!
//! Each command must sit alone on a line; matching is case-insensitive and
//! a comment may carry several commands on separate lines.

use regex::Regex;
use std::sync::LazyLock;

static ADD_LGTM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?mi)^/lgtm\s*$").unwrap());
static REMOVE_LGTM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/lgtm cancel\s*$").unwrap());
static ADD_APPROVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/approve\s*$").unwrap());
static REMOVE_APPROVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^/approve cancel\s*$").unwrap());
static CHECK_PR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?mi)^/check-pr\s*$").unwrap());

/// Comment posted to re-run CI after new commits.
pub const RETEST_COMMAND: &str = "/retest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AddLgtm,
    RemoveLgtm,
    AddApprove,
    RemoveApprove,
    CheckPr,
}

/// Commands carried by a comment, at most one per family.
///
/// Within the lgtm and approve families the add form wins over the cancel form.
pub fn parse(body: &str) -> Vec<Command> {
    let mut commands = Vec::new();

    if ADD_LGTM.is_match(body) {
        commands.push(Command::AddLgtm);
    } else if REMOVE_LGTM.is_match(body) {
        commands.push(Command::RemoveLgtm);
    }

    if ADD_APPROVE.is_match(body) {
        commands.push(Command::AddApprove);
    } else if REMOVE_APPROVE.is_match(body) {
        commands.push(Command::RemoveApprove);
    }

    if CHECK_PR.is_match(body) {
        commands.push(Command::CheckPr);
    }

    commands
}
