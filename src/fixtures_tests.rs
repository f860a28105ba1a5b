#[cfg(test)]
mod fixtures {
    use std::fs;
    use std::path::Path;
    use std::process::Command;
    use std::sync::Once;

    use anyhow::{bail, Context, Result};
    use tempfile::TempDir;

    use crate::api;
    use crate::cli::Args;
    use crate::git::{GitRepo, Vcs};
    use crate::run_lookup;
    use crate::traceback::parse_trace;

    static INIT_ENV: Once = Once::new();

    const SNIPPET: &str = "return get_geo_db().record_by_addr(ip_address)";
    const GEO_PATH: &str = "common/utils/geo_utils.py";

    fn trace() -> String {
        format!(
            "Traceback (most recent call last):\n  \
             File \"/srv/app/{}\", line 2, in get_ip_geo\n    \
             {}\nAttributeError: boom\n",
            GEO_PATH, SNIPPET
        )
    }

    /// A small repository with three commits: a base, a commit that
    /// rewrites line 2 of geo_utils.py into the traceback's snippet, and
    /// an unrelated README commit.
    struct Fixture {
        _temp: TempDir,
        repo: GitRepo,
        range: String,
        bug_commit: String,
    }

    fn build_fixture() -> Result<Fixture> {
        INIT_ENV.call_once(|| {
            std::env::set_var("GIT_CONFIG_GLOBAL", "/dev/null");
            std::env::set_var("GIT_CONFIG_SYSTEM", "/dev/null");
            std::env::set_var("GIT_ATTR_NOSYSTEM", "1");
        });

        let temp = TempDir::new().context("create temp dir")?;
        let dir = temp.path();

        run_git(dir, &["init", "-b", "main"])?;
        run_git(dir, &["config", "user.name", "Fixture Tests"])?;
        run_git(dir, &["config", "user.email", "tests@example.com"])?;
        run_git(dir, &["config", "commit.gpgsign", "false"])?;

        write_file(dir, GEO_PATH, "def get_ip_geo(ip_address):\n    pass\n")?;
        run_git(dir, &["add", "."])?;
        run_git(dir, &["commit", "-m", "base"])?;
        let base_commit = head_commit(dir)?;

        write_file(
            dir,
            GEO_PATH,
            &format!("def get_ip_geo(ip_address):\n    {}\n", SNIPPET),
        )?;
        run_git(dir, &["add", "."])?;
        run_git(
            dir,
            &[
                "commit",
                "-m",
                "Use the geo db\n\nDifferential Revision: https://phab.example.com/D42",
            ],
        )?;
        let bug_commit = head_commit(dir)?;

        write_file(dir, "README.md", "docs\n")?;
        run_git(dir, &["add", "."])?;
        run_git(dir, &["commit", "-m", "add readme"])?;

        Ok(Fixture {
            repo: GitRepo::in_dir(dir),
            range: format!("{}..HEAD", base_commit),
            bug_commit,
            _temp: temp,
        })
    }

    #[test]
    fn test_lookup_finds_the_bug_commit() -> Result<()> {
        let fixture = build_fixture()?;
        let mut traceback = parse_trace(&trace())?;

        let results = api::lookup_stacktrace(&fixture.repo, &mut traceback, &fixture.range, false)?;
        let sorted = results.sorted();
        assert_eq!(sorted.len(), 1);

        let top = sorted[0];
        assert_eq!(top.commit(), fixture.bug_commit);
        assert!(top.lines_added.contains(SNIPPET));
        // Line 2 was added by the bug commit, so the file evidence
        // carries the exact line number.
        assert!(top.files_modified.contains(&format!("{}:2", GEO_PATH)));
        assert_eq!(top.line_number_matches, 1);
        assert_eq!(
            traceback.frames[0].resolved_path.as_deref(),
            Some(GEO_PATH)
        );
        Ok(())
    }

    #[test]
    fn test_pickaxe_full_line_only() -> Result<()> {
        let fixture = build_fixture()?;

        // Fragment of a line: pickaxe finds the commit but the hit is
        // discarded because the snippet never matches a whole line.
        let hits = fixture
            .repo
            .pickaxe("record_by_addr", &fixture.range, Some(GEO_PATH))?;
        assert!(hits.is_empty());

        // The exact line matches, classified as added.
        let hits = fixture.repo.pickaxe(SNIPPET, &fixture.range, Some(GEO_PATH))?;
        assert_eq!(hits, vec![(fixture.bug_commit.clone(), false)]);

        // "pass" was removed by the bug commit.
        let hits = fixture.repo.pickaxe("pass", &fixture.range, Some(GEO_PATH))?;
        assert_eq!(hits, vec![(fixture.bug_commit.clone(), true)]);
        Ok(())
    }

    #[test]
    fn test_valid_range() -> Result<()> {
        let fixture = build_fixture()?;
        assert!(fixture.repo.valid_range(&fixture.range)?);
        assert!(!fixture.repo.valid_range("HEAD..HEAD")?);
        Ok(())
    }

    #[test]
    fn test_convert_since() -> Result<()> {
        let fixture = build_fixture()?;
        let range = fixture.repo.convert_since("1970-01-01", None)?;
        let (oldest, newest) = range.split_once("..").expect("old..new range");
        assert_eq!(oldest.len(), 40);
        assert_eq!(newest.len(), 40);
        assert_ne!(oldest, newest);
        Ok(())
    }

    #[test]
    fn test_commit_info_with_review_url() -> Result<()> {
        let fixture = build_fixture()?;
        let info = fixture.repo.commit_info(&fixture.bug_commit)?;
        assert_eq!(info.subject, "Use the geo db");
        assert_eq!(info.author_name, "Fixture Tests");
        assert_eq!(info.url.as_deref(), Some("https://phab.example.com/D42"));
        Ok(())
    }

    #[test]
    fn test_report_output() -> Result<()> {
        let fixture = build_fixture()?;
        let args = Args::default();
        let report = run_lookup(&fixture.repo, &fixture.range, &trace(), &args)?;

        assert!(report.starts_with("Traceback (most recent call last):"));
        assert!(report.contains(&format!("commit {}", fixture.bug_commit)));
        assert!(report.contains("Subject:     Use the geo db"));
        assert!(report.contains("Link:        https://phab.example.com/D42"));
        assert!(report.contains(&format!("Lines Added:\n    - \"{}\"\n", SNIPPET)));
        Ok(())
    }

    #[test]
    fn test_json_report_output() -> Result<()> {
        let fixture = build_fixture()?;
        let args = Args {
            json: true,
            ..Args::default()
        };
        let report = run_lookup(&fixture.repo, &fixture.range, &trace(), &args)?;
        let value: serde_json::Value = serde_json::from_str(&report)?;

        let commits = value["commits"].as_array().expect("commits array");
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0]["commit"], fixture.bug_commit.as_str());
        assert_eq!(commits[0]["lines_added"][0], SNIPPET);
        Ok(())
    }

    #[test]
    fn test_no_matches_reported() -> Result<()> {
        let fixture = build_fixture()?;
        let args = Args::default();
        let unrelated = "\
Traceback (most recent call last):
  File \"/srv/app/elsewhere/untouched.py\", line 1, in main
    launch()
RuntimeError: nope
";
        let report = run_lookup(&fixture.repo, &fixture.range, unrelated, &args)?;
        assert!(report.ends_with("No matches found\n"));
        Ok(())
    }

    fn head_commit(dir: &Path) -> Result<String> {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
            .context("run git rev-parse")?;
        if !output.status.success() {
            bail!("git rev-parse failed");
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run_git(dir: &Path, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .with_context(|| format!("run git {:?}", args))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {:?} failed: {}", args, stderr.trim());
        }

        Ok(())
    }

    fn write_file(root: &Path, path: &str, contents: &str) -> Result<()> {
        let full_path = root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        fs::write(&full_path, contents)
            .with_context(|| format!("write {}", full_path.display()))?;
        Ok(())
    }
}
