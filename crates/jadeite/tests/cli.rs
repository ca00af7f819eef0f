use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::process::Stdio;

fn jadeite_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_jadeite"))
}

/// A command running in `dir`, isolated from the user's config directory
/// and `JADEITE_*` variables.
fn jadeite(dir: &Path) -> Command {
    let mut command = Command::new(jadeite_binary());
    command
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("HOME", dir)
        .env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("JADEITE_") {
            command.env_remove(key);
        }
    }
    command
}

fn write(dir: &Path, name: &str, source: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, source).unwrap();
}

fn describe(output: &Output) -> String {
    format!(
        "status {:?}\nstdout: {}\nstderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    )
}

mod render {
    use super::*;

    #[test]
    fn renders_with_a_data_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "views/index.pug", "h1 Hi\np Hello, #{name}!");
        write(dir.path(), "data.json", r#"{"name": "Bob"}"#);

        let output = jadeite(dir.path())
            .args(["render", "views/index.pug", "--root", "views", "--data", "data.json"])
            .output()
            .unwrap();

        assert!(output.status.success(), "{}", describe(&output));
        assert_eq!(
            String::from_utf8_lossy(&output.stdout),
            "<h1>Hi</h1><p>Hello, Bob!</p>\n"
        );
    }

    #[test]
    fn reads_data_from_stdin() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.pug", "p= name");

        let mut child = jadeite(dir.path())
            .args(["render", "index", "--data", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(br#"{"name": "stdin"}"#)
            .unwrap();
        let output = child.wait_with_output().unwrap();

        assert!(output.status.success(), "{}", describe(&output));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "<p>stdin</p>\n");
    }

    #[test]
    fn flags_override_settings() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "jadeite.toml", "mode = \"xml\"");
        write(dir.path(), "index.pug", "div\n  hr");

        let output = jadeite(dir.path())
            .args(["render", "index.pug", "--mode", "xhtml", "--pretty"])
            .output()
            .unwrap();

        assert!(output.status.success(), "{}", describe(&output));
        assert_eq!(
            String::from_utf8_lossy(&output.stdout),
            "<div>\n  <hr/>\n</div>\n"
        );
    }

    #[test]
    fn settings_pick_the_mode() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "jadeite.toml", "mode = \"xml\"");
        write(dir.path(), "index.pug", "br");

        let output = jadeite(dir.path()).args(["render", "index"]).output().unwrap();

        assert!(output.status.success(), "{}", describe(&output));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "<br></br>\n");
    }

    #[test]
    fn render_errors_exit_one_with_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.pug", "p ok\n+missing");

        let output = jadeite(dir.path()).args(["render", "index"]).output().unwrap();

        assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("J302"), "{stderr}");
        assert!(stderr.contains("mixin `missing` is not defined"), "{stderr}");
    }

    #[test]
    fn data_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.pug", "p");
        write(dir.path(), "data.json", "[1, 2]");

        let output = jadeite(dir.path())
            .args(["render", "index", "--data", "data.json"])
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
        assert!(String::from_utf8_lossy(&output.stderr).contains("must be a JSON object"));
    }

    #[test]
    fn missing_templates_exit_one() {
        let dir = tempfile::tempdir().unwrap();

        let output = jadeite(dir.path()).args(["render", "nope"]).output().unwrap();

        assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
        assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read template"));
    }
}

mod check {
    use super::*;

    #[test]
    fn clean_templates_exit_zero() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "views/layout.pug", "html\n  body\n    block content");
        write(dir.path(), "views/index.pug", "extends layout\nblock content\n  p hi");

        let output = jadeite(dir.path()).args(["check", "views"]).output().unwrap();

        assert!(output.status.success(), "{}", describe(&output));
    }

    #[test]
    fn broken_templates_exit_one() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "views/good.pug", "p fine");
        write(dir.path(), "views/broken.pug", "p\n  div(class=\"a\"");

        let output = jadeite(dir.path()).args(["check", "views"]).output().unwrap();

        assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("J101"), "{stdout}");
        assert!(stdout.contains("broken.pug"), "{stdout}");
        assert!(!stdout.contains("good.pug"), "{stdout}");
        assert!(String::from_utf8_lossy(&output.stderr).contains("Found 1 error in 1 file."));
    }

    #[test]
    fn defaults_to_the_template_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "jadeite.toml", "root = \"views\"");
        write(dir.path(), "views/a.pug", "a(href='x'");
        write(dir.path(), "views/b.pug", "p(");
        write(dir.path(), "elsewhere/c.pug", "p(");

        let output = jadeite(dir.path()).arg("check").output().unwrap();

        assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Found 2 errors in 2 files."));
    }
}

#[test]
fn quiet_and_verbose_conflict() {
    let dir = tempfile::tempdir().unwrap();

    let output = jadeite(dir.path())
        .args(["-q", "-v", "check"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2), "{}", describe(&output));
}
