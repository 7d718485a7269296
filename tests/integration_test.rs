use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use git2::{Repository, Signature};
use release_pilot::changelog::{ChangelogConfig, DockerChangelog};
use release_pilot::event::{EventPayload, GitEvent, GitParser, ParserConfig};
use release_pilot::git::{GitOps, GitOpsConfig, SystemGit};
use release_pilot::github::RunnerEnv;
use release_pilot::release::{CiEvent, Decision, ProjectOps, ReleaseVersionOps};
use release_pilot::version::{NextVersionMode, VersionStrategy};
use tempfile::TempDir;

/// Temporary git repository with a package.json manifest.
struct TestRepo {
    _temp_dir: TempDir,
    repo_path: PathBuf,
    repo: Repository,
    commits: Vec<git2::Oid>,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo_path = temp_dir.path().to_path_buf();

        let repo = Repository::init(&repo_path)?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;
        config.set_bool("commit.gpgsign", false)?;
        config.set_bool("tag.gpgsign", false)?;

        Ok(TestRepo {
            _temp_dir: temp_dir,
            repo_path,
            repo,
            commits: Vec::new(),
        })
    }

    fn write_version(&self, version: &str) -> Result<()> {
        fs::write(
            self.repo_path.join("package.json"),
            format!("{{\n  \"name\": \"demo\",\n  \"version\": \"{version}\"\n}}\n"),
        )?;
        Ok(())
    }

    fn add_commit(&mut self, message: &str, version: &str) -> Result<git2::Oid> {
        self.write_version(version)?;

        let mut index = self.repo.index()?;
        index.add_path(Path::new("package.json"))?;
        index.write()?;

        let signature = Signature::now("Test User", "test@example.com")?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent_commit = match self.commits.last() {
            Some(last_commit_id) => Some(self.repo.find_commit(*last_commit_id)?),
            None => None,
        };
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

        let commit_id = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        self.commits.push(commit_id);
        Ok(commit_id)
    }

    fn tag(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.tag_lightweight(name, head.as_object(), false)?;
        Ok(())
    }

    fn branch(&self) -> Result<String> {
        Ok(self.repo.head()?.shorthand().unwrap_or("HEAD").to_string())
    }

    fn read_version_file(&self) -> Result<String> {
        Ok(fs::read_to_string(self.repo_path.join("package.json"))?)
    }

    fn git(&self) -> SystemGit {
        SystemGit::new(&self.repo_path, GitOpsConfig::default())
    }
}

#[test]
fn latest_tags_strip_prefix() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "0.9.0")?;
    test_repo.tag("v0.9.0")?;
    test_repo.add_commit("Release 1.0.0", "1.0.0")?;
    test_repo.tag("v1.0.0")?;
    test_repo.tag("nightly")?;

    let mut tags = test_repo.git().latest_tags("v")?;
    tags.sort();

    assert_eq!(tags, vec!["0.9.0", "1.0.0"]);
    Ok(())
}

#[test]
fn commit_message_lookup() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "1.0.0")?;
    let second = test_repo.add_commit(
        "Merge pull request #16 from zero88/release/1.0.1\n\nRelease 1.0.1",
        "1.0.1",
    )?;

    let message = test_repo.git().commit_message(&second.to_string())?;

    assert_eq!(
        message,
        "Merge pull request #16 from zero88/release/1.0.1\n\nRelease 1.0.1"
    );
    assert!(test_repo.git().commit_message("not-a-sha").is_err());
    Ok(())
}

#[test]
fn commit_and_tag_with_git_binary() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "1.0.0")?;
    test_repo.write_version("1.0.1")?;
    let branch = test_repo.branch()?;
    let git = test_repo.git();

    let status = git.commit(&branch, "<ci-auto-commit> Correct version 1.0.1")?;
    assert!(status.is_committed && !status.is_pushed);

    let head = test_repo.repo.head()?.peel_to_commit()?;
    assert_eq!(status.commit_id, Some(head.id().to_string()));
    assert_eq!(
        head.message(),
        Some("<ci-auto-commit> Correct version 1.0.1\n")
    );

    let tagged = git.tag("v1.0.1", "Release version v1.0.1")?;
    assert_eq!(tagged.commit_id, Some(head.id().to_string()));
    assert_eq!(git.latest_tags("v")?, vec!["1.0.1"]);
    Ok(())
}

#[tokio::test]
async fn dry_run_release_branch_against_real_repository() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "1.0.0")?;
    test_repo.tag("v1.0.0")?;

    let runner = RunnerEnv {
        workspace: test_repo.repo_path.clone(),
        ..RunnerEnv::default()
    };
    let strategy = VersionStrategy::new(&runner.workspace, None, NextVersionMode::Patch)?;
    let ops = ProjectOps::new(
        GitParser::new(ParserConfig::default())?,
        ReleaseVersionOps::new(strategy),
        GitOpsConfig::default(),
        Box::new(test_repo.git()),
        Box::new(DockerChangelog::new(ChangelogConfig::default(), runner)),
    );

    let event = GitEvent {
        event_name: "create".to_string(),
        ref_name: "refs/heads/release/1.1.0".to_string(),
        sha: test_repo.commits[0].to_string(),
        payload: EventPayload::default(),
    };
    let context = ops.process(&event, true).await?;

    assert_eq!(context.version, "1.1.0");
    assert_eq!(context.runtime.commit_msg, "Initial commit");
    assert!(matches!(
        context.ci.event,
        CiEvent::OnReleaseBranch {
            must_fix_version: true,
            need_pull_request: true,
            ..
        }
    ));
    assert_eq!(context.decision, Decision::default());
    assert!(test_repo.read_version_file()?.contains("\"version\": \"1.0.0\""));
    Ok(())
}
