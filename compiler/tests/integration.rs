#![cfg(unix)]

use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Copies the staged markdown to the `-o` path and logs its arguments.
const FAKE_CONVERTER: &str = r#"#!/bin/sh
printf '%s\n' "$@" > converter-args.txt
in="$1"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
cp "$in" "$out"
"#;

const FAILING_CONVERTER: &str = "#!/bin/sh\necho boom >&2\nexit 3\n";

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_manuscript")))
}

fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn book() -> TempDir {
    project(&[
        ("toc.md", "# My Book\n// draft note\n{part1/ch1.md}\n{part2/ch2.md}\n"),
        ("part1/ch1.md", "---\nid: one\n---\nChapter one\n"),
        ("part2/ch2.md", "Chapter two\n{one}\n"),
    ])
}

/// `manuscript -C <root> compile <args> --converter <converter>`
fn compile(root: &Path, args: &[&str], converter: &Path) -> assert_cmd::Command {
    let mut command = cmd();
    command
        .args(["-C", root.to_str().unwrap(), "compile"])
        .args(args)
        .args(["--converter", converter.to_str().unwrap()]);
    command
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

// ── compile ──────────────────────────────────────────────────────

#[test]
fn compile_toc_flattens_book() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["toc"], &converter)
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote"));

    let result = read(dir.path().join("toc.docx"));
    assert!(result.starts_with("# My Book\n\n---\nid: one\n---\nChapter one\n"), "Got: {result}");
    assert!(result.contains("Chapter two\n\n---\nid: one"), "Got: {result}");
    assert!(!result.contains("draft note"), "Got: {result}");
    assert!(!dir.path().join(".manuscript").exists());
}

#[test]
fn compile_passes_converter_arguments() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["toc", "--format", "html", "--smart-dashes"], &converter)
        .assert()
        .success();

    assert!(dir.path().join("toc.html").is_file());
    let args = read(dir.path().join("converter-args.txt"));
    let args: Vec<&str> = args.lines().collect();
    assert!(args[0].contains(".manuscript"), "Got: {args:?}");
    assert_eq!(&args[1..5], ["-f", "markdown+smart", "-t", "html"]);
    assert!(args.contains(&"--resource-path"), "Got: {args:?}");
    assert!(!args.contains(&"--reference-doc"), "Got: {args:?}");
}

#[test]
fn compile_file_from_subfolder() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["file", "part2/ch2.md"], &converter)
        .assert()
        .success();

    let result = read(dir.path().join("part2/ch2.docx"));
    assert_eq!(result, "Chapter two\n\n---\nid: one\n---\nChapter one\n");
}

#[test]
fn markdown_export_keeps_the_source() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["file", "part2/ch2.md", "--format", "markdown"], &converter)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("would overwrite a source document"));

    assert_eq!(read(dir.path().join("part2/ch2.md")), "Chapter two\n{one}\n");
    assert!(!dir.path().join("converter-args.txt").exists());
}

#[test]
fn compile_toc_falls_back_to_root() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["toc", "part1/ch1.md"], &converter).assert().success();

    assert!(dir.path().join("toc.docx").is_file());
}

#[test]
fn compile_toc_missing() {
    let dir = project(&[("a.md", "A\n")]);
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "compile", "toc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("toc.md not found"));
}

#[test]
fn include_errors_cancel_without_yes() {
    let dir = project(&[("toc.md", "{missing.md}\n")]);
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["toc"], &converter)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("file not found"));

    assert!(!dir.path().join("toc.docx").exists());
    assert!(!dir.path().join("converter-args.txt").exists());
    assert!(!dir.path().join(".manuscript").exists());
}

#[test]
fn include_errors_inline_with_yes() {
    let dir = project(&[("toc.md", "{missing.md}\nStill here\n")]);
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["toc", "--yes", "--inline-errors"], &converter).assert().success();

    let result = read(dir.path().join("toc.docx"));
    assert!(result.contains("> **Compile error:** `missing.md`"), "Got: {result}");
    assert!(result.contains("Still here"), "Got: {result}");
}

#[test]
fn circular_include_is_reported() {
    let dir = project(&[("toc.md", "{a.md}\n"), ("a.md", "A\n{b.md}\n"), ("b.md", "B\n{a.md}\n")]);
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["toc", "--no-confirm"], &converter)
        .assert()
        .success()
        .stderr(predicate::str::contains("circular"));

    assert_eq!(read(dir.path().join("toc.docx")), "A\nB\n");
}

#[test]
fn converter_failure() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAILING_CONVERTER);

    compile(dir.path(), &["toc"], &converter)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("export to docx failed"))
        .stderr(predicate::str::contains("boom"));

    assert!(!dir.path().join(".manuscript").exists());
}

#[test]
fn missing_converter() {
    let dir = book();
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "compile", "toc"])
        .args(["--converter", "manuscript-no-such-converter"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn compile_all_with_select() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["all", "--select", "part2/*"], &converter).assert().success();

    let result = read(dir.path().join("export_all.docx"));
    assert!(result.starts_with("Chapter two\n"), "Got: {result}");
    assert!(!result.contains("My Book"), "Got: {result}");
}

#[test]
fn compile_all_nothing_selected() {
    let dir = book();
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "compile", "all"])
        .args(["--select", "nowhere/*"])
        .assert()
        .code(2);
}

#[test]
fn save_as_writes_elsewhere() {
    let dir = book();
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);
    let out = TempDir::new().unwrap();
    let target = out.path().join("final.docx");

    compile(dir.path(), &["toc", "--save-as", target.to_str().unwrap()], &converter)
        .assert()
        .success();

    assert!(target.is_file());
    assert!(!dir.path().join("toc.docx").exists());
}

#[test]
fn settings_file_is_used() {
    let dir = project(&[
        ("contents.md", "{a.md}\n"),
        ("a.md", "A\n"),
        ("manuscript.toml", "toc_file = \"contents.md\"\nformat = \"odt\"\n"),
    ]);
    let bin = TempDir::new().unwrap();
    let converter = script(&bin, "convert", FAKE_CONVERTER);

    compile(dir.path(), &["toc"], &converter).assert().success();

    assert_eq!(read(dir.path().join("contents.odt")), "A\n");
}

#[test]
fn invalid_settings_file() {
    let dir = project(&[("manuscript.toml", "format = [\n")]);
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "index"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid settings"));
}

// ── inspection ───────────────────────────────────────────────────

#[test]
fn index_lists_documents() {
    let dir = book();
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("part1/ch1.md  [one]"))
        .stdout(predicate::str::contains("toc.md"));
}

#[test]
fn index_json() {
    let dir = book();
    let output = cmd()
        .args(["-C", dir.path().to_str().unwrap(), "index", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 3);
    let with_id: Vec<_> = records.iter().filter(|r| r["id"] == "one").collect();
    assert_eq!(with_id.len(), 1);
    assert_eq!(with_id[0]["metadata"]["id"], "one");
}

#[test]
fn ids_flag_conflicts() {
    let dir = project(&[
        ("a.md", "---\nid: shared\n---\n"),
        ("b.md", "---\nid: shared\n---\n"),
        ("c.md", "---\nid: solo\n---\n"),
    ]);
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "ids"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shared  CONFLICT: a.md, b.md"))
        .stdout(predicate::str::contains("solo  c.md"));
}

#[test]
fn tree_shows_folders() {
    let dir = book();
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "tree"])
        .assert()
        .success()
        .stdout("part1/\n  ch1.md  [one]\npart2/\n  ch2.md\ntoc.md\n");
}

#[test]
fn glob_override() {
    let dir = project(&[("a.md", "A\n"), ("notes.txt", "N\n")]);
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "--glob", "*.txt", "tree"])
        .assert()
        .success()
        .stdout("notes.txt\n");
}

#[test]
fn words_counts_body() {
    let dir = project(&[
        ("ch.md", "---\ntitle: Ignored\n---\nThe sea, the sea.\n{more.md}\n"),
        ("more.md", "Sea again\n"),
    ]);
    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "words", "ch.md", "--top", "1"])
        .assert()
        .success()
        .stdout("     2  sea\n");

    cmd()
        .args(["-C", dir.path().to_str().unwrap(), "words", "ch.md", "--flatten", "--top", "1"])
        .assert()
        .success()
        .stdout("     3  sea\n");
}

#[test]
fn words_json() {
    let dir = project(&[("ch.md", "Tide, tide and moon\n")]);
    let output = cmd()
        .args(["-C", dir.path().to_str().unwrap(), "words", "ch.md", "--json", "--top", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let counts: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let counts = counts.as_array().unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0]["word"], "tide");
    assert_eq!(counts[0]["count"], 2);
}
