//! Release pipeline: classify, fix or upgrade, run side effects, decide.

use anyhow::Result;
use tracing::{debug, info, info_span, warn, Instrument};

use super::context::{CiContext, CiEvent, CommitStatus, ProjectContext, Versions};
use super::decision::make_decision;
use super::ops::ReleaseVersionOps;
use crate::changelog::{ChangelogConfig, ChangelogGenerator, ChangelogResult, DockerChangelog};
use crate::config::ProjectConfig;
use crate::event::{GitEvent, GitParser, RuntimeContext};
use crate::git::{GitOps, GitOpsConfig, SystemGit};
use crate::github::{GitHubClient, PullRequestApi, RunnerEnv};
use crate::version::{find_previous_version, VersionStrategy};

/// Drives a release run against its collaborators.
pub struct ProjectOps {
    parser: GitParser,
    version_ops: ReleaseVersionOps,
    git_config: GitOpsConfig,
    git: Box<dyn GitOps>,
    changelog: Box<dyn ChangelogGenerator>,
    pull_requests: Option<Box<dyn PullRequestApi>>,
}

impl ProjectOps {
    /// Assembles a pipeline without pull request access.
    pub fn new(
        parser: GitParser,
        version_ops: ReleaseVersionOps,
        git_config: GitOpsConfig,
        git: Box<dyn GitOps>,
        changelog: Box<dyn ChangelogGenerator>,
    ) -> Self {
        Self {
            parser,
            version_ops,
            git_config,
            git,
            changelog,
            pull_requests: None,
        }
    }

    /// Enables opening release pull requests.
    #[must_use]
    pub fn with_pull_requests(mut self, api: Box<dyn PullRequestApi>) -> Self {
        self.pull_requests = Some(api);
        self
    }

    /// Builds the production pipeline: system git, Docker changelog and,
    /// when a token is available, the GitHub pull request API.
    pub fn from_config(config: &ProjectConfig, runner: &RunnerEnv) -> Result<Self> {
        let parser = GitParser::new(config.parser.clone())?;
        let strategy = VersionStrategy::new(
            &runner.workspace,
            config.version.patterns.as_deref(),
            config.version.next_version_mode,
        )?;
        debug!(
            patterns = strategy.version_patterns.len(),
            mode = %strategy.next_version_mode,
            "Resolved version strategy"
        );

        let changelog_config = ChangelogConfig {
            token: config.changelog.token.clone().or_else(|| config.token.clone()),
            ..config.changelog.clone()
        };
        let ops = Self::new(
            parser,
            ReleaseVersionOps::new(strategy),
            config.git.clone(),
            Box::new(SystemGit::new(&runner.workspace, config.git.clone())),
            Box::new(DockerChangelog::new(changelog_config, runner.clone())),
        );

        match config.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => Ok(ops.with_pull_requests(Box::new(GitHubClient::new(
                runner,
                token.to_string(),
            )?))),
            None => Ok(ops),
        }
    }

    /// Processes one event end to end.
    pub async fn process(&self, event: &GitEvent, dry_run: bool) -> Result<ProjectContext> {
        let runtime = self.normalize_commit_msg(self.parser.classify(event));
        let span = info_span!("process", branch = %runtime.branch, event = %event.event_name);

        async {
            info!(
                is_release = runtime.is_release,
                is_tag = runtime.is_tag,
                is_merged = runtime.is_merged,
                dry_run,
                "Evaluating context"
            );
            let (versions, ci) = if runtime.is_release {
                self.on_release(&runtime, dry_run).await?
            } else {
                self.on_next(&runtime, dry_run).await?
            };
            self.remove_branch_if_merged(&runtime, dry_run);

            let decision = make_decision(&runtime, &ci);
            info!(build = decision.build, publish = decision.publish, "Decision");
            Ok(ProjectContext {
                version: versions.current.clone(),
                runtime,
                versions,
                ci,
                decision,
            })
        }
        .instrument(span)
        .await
    }

    fn normalize_commit_msg(&self, runtime: RuntimeContext) -> RuntimeContext {
        if !runtime.commit_msg.is_empty() || runtime.commit_id.is_empty() {
            return runtime;
        }
        match self.git.commit_message(&runtime.commit_id) {
            Ok(message) => runtime.with_commit_msg(message),
            Err(e) => {
                warn!("Cannot read commit message of {}: {e}", runtime.commit_id);
                runtime
            }
        }
    }

    async fn on_release(
        &self,
        runtime: &RuntimeContext,
        dry_run: bool,
    ) -> Result<(Versions, CiContext)> {
        let fixed = self.version_ops.fix(runtime, dry_run).await?;
        let version = fixed.versions.current.clone();
        let tag = format!("{}{version}", self.parser.config().tag_prefix);

        let (status, event) = if runtime.is_merged {
            let status = self.tag_release(&tag, dry_run)?;
            (
                status,
                CiEvent::OnMergeReleasePR {
                    must_fix_version: fixed.must_fix_version,
                    need_tag: fixed.need_tag,
                },
            )
        } else if runtime.is_tag {
            (
                CommitStatus::default(),
                CiEvent::OnMergeReleasePR {
                    must_fix_version: false,
                    need_tag: false,
                },
            )
        } else {
            let mut status = if fixed.must_fix_version {
                let message = self.git_config.correct_version_message(&version);
                self.commit(&runtime.branch, &message, dry_run)?
            } else {
                CommitStatus::default()
            };

            let changelog = self.generate_changelog(runtime, &version, &tag, dry_run)?;
            status = status.merge(CommitStatus {
                is_committed: changelog.is_committed,
                is_pushed: false,
                commit_id: changelog.commit_id.clone(),
                commit_msg: None,
            });

            if status.is_committed {
                status.is_pushed = self.git.push(&runtime.branch, dry_run)?;
            }
            if fixed.need_pull_request {
                self.open_pull_request(runtime, &version, dry_run).await;
            }

            (
                status,
                CiEvent::OnReleaseBranch {
                    must_fix_version: fixed.must_fix_version,
                    need_pull_request: fixed.need_pull_request,
                    changelog: Some(changelog),
                },
            )
        };

        Ok((fixed.versions, CiContext { status, event }))
    }

    async fn on_next(
        &self,
        runtime: &RuntimeContext,
        dry_run: bool,
    ) -> Result<(Versions, CiContext)> {
        let upgraded = self
            .version_ops
            .upgrade(runtime, runtime.is_after_merged_release_pr, dry_run)
            .await?;

        let mut status = CommitStatus::default();
        if let (true, Some(next)) = (upgraded.need_upgrade, upgraded.next_version.as_deref()) {
            let message = self.git_config.next_version_message(next);
            status = self.commit(&runtime.branch, &message, dry_run)?;
            if status.is_committed {
                status.is_pushed = self.git.push(&runtime.branch, dry_run)?;
            }
        }

        let ci = CiContext {
            status,
            event: CiEvent::OnNext {
                need_upgrade: upgraded.need_upgrade,
            },
        };
        Ok((upgraded.versions, ci))
    }

    fn commit(&self, branch: &str, message: &str, dry_run: bool) -> Result<CommitStatus> {
        if dry_run || !self.git_config.allow_commit {
            info!(branch, message, dry_run, "Commit skipped");
            return Ok(CommitStatus::default());
        }
        self.git.commit(branch, message)
    }

    fn tag_release(&self, tag: &str, dry_run: bool) -> Result<CommitStatus> {
        if dry_run || !self.git_config.allow_tag {
            info!(tag, dry_run, "Tag skipped");
            return Ok(CommitStatus::default());
        }
        let mut status = self.git.tag(tag, &self.git_config.release_message(tag))?;
        status.is_pushed = self.git.push(tag, dry_run)?;
        Ok(status)
    }

    /// Generates and commits the changelog of `tag` since the previous release.
    fn generate_changelog(
        &self,
        runtime: &RuntimeContext,
        version: &str,
        tag: &str,
        dry_run: bool,
    ) -> Result<ChangelogResult> {
        let prefix = &self.parser.config().tag_prefix;
        let since_tag = match self.git.latest_tags(prefix) {
            Ok(tags) => match find_previous_version(version, &tags) {
                Ok(previous) => Some(format!("{prefix}{previous}")),
                Err(e) => {
                    debug!("No previous release: {e}");
                    None
                }
            },
            Err(e) => {
                warn!("Cannot list release tags: {e}");
                None
            }
        };

        let generated = self.changelog.generate(
            since_tag.as_deref(),
            tag,
            Some(runtime.default_branch.as_str()),
            dry_run,
        )?;

        let status = match generated.commit_msg.as_deref() {
            Some(message) if generated.generated => {
                self.commit(&runtime.branch, message, dry_run)?
            }
            _ => CommitStatus::default(),
        };
        Ok(ChangelogResult::new(generated, &status))
    }

    async fn open_pull_request(&self, runtime: &RuntimeContext, version: &str, dry_run: bool) {
        let base = runtime.default_branch.as_str();
        let head = runtime.branch.as_str();
        if dry_run {
            info!(base, head, "Dry run, pull request not opened");
            return;
        }
        let Some(api) = &self.pull_requests else {
            warn!(base, head, "No GitHub token, pull request not opened");
            return;
        };

        match api.is_open(base, head).await {
            Ok(true) => info!(base, head, "Pull request already open"),
            Ok(false) => {
                let title = format!("Release {version}");
                if let Err(e) = api.open(base, head, &title, None).await {
                    warn!("Cannot open pull request: {e}");
                }
            }
            Err(e) => warn!("Cannot list pull requests: {e}"),
        }
    }

    fn remove_branch_if_merged(&self, runtime: &RuntimeContext, dry_run: bool) {
        if !(runtime.is_pr && runtime.is_merged) || dry_run {
            return;
        }
        if let Err(e) = self.git.remove_remote_branch(&runtime.branch) {
            warn!("Cannot remove merged branch {}: {e}", runtime.branch);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::future::Future;
    use std::path::Path;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::changelog::GeneratedResult;
    use crate::error::ReleaseError;
    use crate::event::{EventPayload, ParserConfig};
    use crate::release::Decision;
    use crate::version::NextVersionMode;

    type Calls = Arc<Mutex<Vec<String>>>;

    struct FakeGit {
        calls: Calls,
        tags: Vec<String>,
        message: Option<String>,
    }

    impl GitOps for FakeGit {
        fn commit(&self, branch: &str, message: &str) -> Result<CommitStatus> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("commit {branch}: {message}"));
            Ok(CommitStatus {
                is_committed: true,
                is_pushed: false,
                commit_id: Some("c0ffee".to_string()),
                commit_msg: Some(message.to_string()),
            })
        }

        fn tag(&self, tag: &str, message: &str) -> Result<CommitStatus> {
            self.calls.lock().unwrap().push(format!("tag {tag}: {message}"));
            Ok(CommitStatus {
                is_committed: true,
                is_pushed: false,
                commit_id: Some("7a9bee".to_string()),
                commit_msg: Some(message.to_string()),
            })
        }

        fn push(&self, refspec: &str, dry_run: bool) -> Result<bool> {
            self.calls.lock().unwrap().push(format!("push {refspec}"));
            Ok(!dry_run)
        }

        fn latest_tags(&self, _prefix: &str) -> Result<Vec<String>> {
            Ok(self.tags.clone())
        }

        fn commit_message(&self, sha: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("message {sha}"));
            self.message
                .clone()
                .ok_or_else(|| anyhow::anyhow!("unknown commit {sha}"))
        }

        fn remove_remote_branch(&self, branch: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("remove {branch}"));
            Ok(())
        }
    }

    struct FakeChangelog {
        calls: Calls,
        generated: bool,
    }

    impl ChangelogGenerator for FakeChangelog {
        fn generate(
            &self,
            since_tag: Option<&str>,
            release_tag: &str,
            _release_branch: Option<&str>,
            _dry_run: bool,
        ) -> Result<GeneratedResult> {
            self.calls.lock().unwrap().push(format!(
                "changelog {}..{release_tag}",
                since_tag.unwrap_or("")
            ));
            Ok(GeneratedResult {
                generated: self.generated,
                since_tag: since_tag.map(str::to_string),
                release_tag: release_tag.to_string(),
                commit_msg: self
                    .generated
                    .then(|| format!("Generated CHANGELOG {release_tag}")),
            })
        }
    }

    struct FakePullRequests {
        calls: Calls,
        open: bool,
    }

    impl PullRequestApi for FakePullRequests {
        fn is_open<'a>(
            &'a self,
            _base: &'a str,
            _head: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
            Box::pin(async move { Ok(self.open) })
        }

        fn open<'a>(
            &'a self,
            base: &'a str,
            head: &'a str,
            title: &'a str,
            _body: Option<&'a str>,
        ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("pr {head}->{base}: {title}"));
                Ok("https://github.com/zero88/demo/pull/1".to_string())
            })
        }
    }

    struct Harness {
        ops: ProjectOps,
        calls: Calls,
        _dir: tempfile::TempDir,
    }

    fn harness(version: &str, mode: NextVersionMode, git_config: GitOpsConfig) -> Harness {
        harness_with(version, mode, git_config, false, Some("Initial commit"))
    }

    fn harness_with(
        version: &str,
        mode: NextVersionMode,
        git_config: GitOpsConfig,
        changelog: bool,
        message: Option<&str>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), version);
        let calls: Calls = Arc::default();
        let strategy = VersionStrategy::new(dir.path(), Some("package.json"), mode).unwrap();

        let ops = ProjectOps::new(
            GitParser::new(ParserConfig::default()).unwrap(),
            ReleaseVersionOps::new(strategy),
            git_config,
            Box::new(FakeGit {
                calls: calls.clone(),
                tags: vec!["1.0.0".to_string(), "0.9.0".to_string()],
                message: message.map(str::to_string),
            }),
            Box::new(FakeChangelog {
                calls: calls.clone(),
                generated: changelog,
            }),
        )
        .with_pull_requests(Box::new(FakePullRequests {
            calls: calls.clone(),
            open: false,
        }));

        Harness {
            ops,
            calls,
            _dir: dir,
        }
    }

    fn write_package(dir: &Path, version: &str) {
        fs::write(
            dir.join("package.json"),
            format!("{{\n  \"version\": \"{version}\"\n}}\n"),
        )
        .unwrap();
    }

    fn event(name: &str, ref_name: &str, payload: serde_json::Value) -> GitEvent {
        GitEvent {
            event_name: name.to_string(),
            ref_name: ref_name.to_string(),
            sha: "1584df028b7f4c1d87327da577c2d465f147134f".to_string(),
            payload: serde_json::from_value::<EventPayload>(payload).unwrap(),
        }
    }

    fn push(ref_name: &str, message: &str) -> GitEvent {
        event(
            "push",
            ref_name,
            json!({
                "repository": { "default_branch": "main" },
                "head_commit": { "message": message }
            }),
        )
    }

    fn pull_request(action: &str, head: &str, merged: bool) -> GitEvent {
        event(
            "pull_request",
            "refs/pull/16/merge",
            json!({
                "action": action,
                "repository": { "default_branch": "main" },
                "pull_request": {
                    "head": { "ref": head, "sha": "956a75767722d596de58fa277cce281529c5272d" },
                    "base": { "ref": "main" },
                    "merged": merged
                }
            }),
        )
    }

    fn calls(harness: &Harness) -> Vec<String> {
        harness.calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn push_to_default_branch_builds_and_publishes() {
        let h = harness("1.0.0", NextVersionMode::None, GitOpsConfig::default());

        let ctx = h
            .ops
            .process(&push("refs/heads/main", "Update README"), false)
            .await
            .unwrap();

        assert_eq!(ctx.decision, Decision { build: true, publish: true });
        assert_eq!(ctx.version, "1.0.0");
        assert_eq!(ctx.ci.event, CiEvent::OnNext { need_upgrade: false });
        assert!(calls(&h).is_empty());
    }

    #[tokio::test]
    async fn merged_pull_request_is_not_built_and_branch_removed() {
        let h = harness("1.0.0", NextVersionMode::None, GitOpsConfig::default());

        let ctx = h
            .ops
            .process(&pull_request("closed", "zero88-patch-1", true), false)
            .await
            .unwrap();

        assert_eq!(ctx.decision, Decision::default());
        assert_eq!(
            calls(&h),
            vec![
                "message 1584df028b7f4c1d87327da577c2d465f147134f",
                "remove zero88-patch-1"
            ]
        );
    }

    #[tokio::test]
    async fn merged_pull_request_dry_run_keeps_branch() {
        let h = harness("1.0.0", NextVersionMode::None, GitOpsConfig::default());

        h.ops
            .process(&pull_request("closed", "zero88-patch-1", true), true)
            .await
            .unwrap();

        assert!(!calls(&h).iter().any(|c| c.starts_with("remove")));
    }

    #[tokio::test]
    async fn release_branch_corrects_version_and_opens_pull_request() {
        let h = harness_with(
            "1.0.0",
            NextVersionMode::None,
            GitOpsConfig::default(),
            true,
            None,
        );

        let ctx = h
            .ops
            .process(&push("refs/heads/release/1.0.1", "Start release"), false)
            .await
            .unwrap();

        assert_eq!(ctx.version, "1.0.1");
        assert!(ctx.ci.status.is_committed && ctx.ci.status.is_pushed);
        match &ctx.ci.event {
            CiEvent::OnReleaseBranch {
                must_fix_version,
                need_pull_request,
                changelog,
            } => {
                assert!(*must_fix_version && *need_pull_request);
                let changelog = changelog.as_ref().unwrap();
                assert!(changelog.generated && changelog.is_committed);
                assert_eq!(changelog.since_tag.as_deref(), Some("v1.0.0"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(
            calls(&h),
            vec![
                "commit release/1.0.1: <ci-auto-commit> Correct version 1.0.1",
                "changelog v1.0.0..v1.0.1",
                "commit release/1.0.1: Generated CHANGELOG v1.0.1",
                "push release/1.0.1",
                "pr release/1.0.1->main: Release 1.0.1",
            ]
        );
        assert_eq!(ctx.decision, Decision::default());
    }

    #[tokio::test]
    async fn release_branch_without_commit_permission() {
        let h = harness(
            "1.0.0",
            NextVersionMode::None,
            GitOpsConfig {
                allow_commit: false,
                ..GitOpsConfig::default()
            },
        );

        let ctx = h
            .ops
            .process(&push("refs/heads/release/1.0.1", "Start release"), false)
            .await
            .unwrap();

        assert!(!ctx.ci.status.is_committed && !ctx.ci.status.is_pushed);
        assert!(matches!(
            ctx.ci.event,
            CiEvent::OnReleaseBranch {
                must_fix_version: true,
                ..
            }
        ));
        assert!(!calls(&h).iter().any(|c| c.starts_with("commit") || c.starts_with("push")));
    }

    #[tokio::test]
    async fn merged_release_pull_request_is_tagged() {
        let h = harness("1.0.1", NextVersionMode::None, GitOpsConfig::default());

        let ctx = h
            .ops
            .process(&pull_request("closed", "release/1.0.1", true), false)
            .await
            .unwrap();

        assert_eq!(
            ctx.ci.event,
            CiEvent::OnMergeReleasePR {
                must_fix_version: false,
                need_tag: true
            }
        );
        assert!(ctx.ci.status.is_pushed);
        let calls = calls(&h);
        assert!(calls.contains(&"tag v1.0.1: Release version v1.0.1".to_string()));
        assert!(calls.contains(&"push v1.0.1".to_string()));
        assert!(calls.contains(&"remove release/1.0.1".to_string()));
    }

    #[tokio::test]
    async fn tag_with_mismatched_version_fails() {
        let h = harness("1.0.0", NextVersionMode::None, GitOpsConfig::default());

        let err = h
            .ops
            .process(&push("refs/tags/v1.0.1", "Release"), false)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ReleaseError>(),
            Some(ReleaseError::TagVersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn matching_tag_publishes() {
        let h = harness("1.0.1", NextVersionMode::None, GitOpsConfig::default());

        let ctx = h
            .ops
            .process(&push("refs/tags/v1.0.1", "Release"), false)
            .await
            .unwrap();

        assert_eq!(ctx.decision, Decision { build: true, publish: true });
        assert!(calls(&h).is_empty());
    }

    #[tokio::test]
    async fn push_after_merged_release_upgrades_version() {
        let h = harness("1.0.1", NextVersionMode::Patch, GitOpsConfig::default());

        let ctx = h
            .ops
            .process(
                &push(
                    "refs/heads/main",
                    "Merge pull request #16 from zero88/release/1.0.1",
                ),
                false,
            )
            .await
            .unwrap();

        assert_eq!(ctx.ci.event, CiEvent::OnNext { need_upgrade: true });
        assert_eq!(ctx.versions.bumped.as_deref(), Some("1.0.2"));
        assert_eq!(
            calls(&h),
            vec![
                "commit main: <ci-auto-commit> Next version 1.0.2",
                "push main",
            ]
        );
        assert_eq!(ctx.decision, Decision::default());
    }

    #[tokio::test]
    async fn missing_commit_message_is_looked_up() {
        let h = harness_with(
            "1.0.0",
            NextVersionMode::None,
            GitOpsConfig::default(),
            false,
            Some("Fix typo"),
        );

        let ctx = h
            .ops
            .process(&event("push", "refs/heads/main", json!({})), false)
            .await
            .unwrap();

        assert_eq!(ctx.runtime.commit_msg, "Fix typo");
    }

    #[tokio::test]
    async fn failed_commit_message_lookup_is_tolerated() {
        let h = harness_with(
            "1.0.0",
            NextVersionMode::None,
            GitOpsConfig::default(),
            false,
            None,
        );

        let ctx = h
            .ops
            .process(&event("push", "refs/heads/main", json!({})), false)
            .await
            .unwrap();

        assert_eq!(ctx.runtime.commit_msg, "");
        assert!(ctx.decision.build);
    }
}
