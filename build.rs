//! Source guards for `src/`, run on every build.
//!
//! - files stay under [`MAX_LINES`] non-empty lines
//! - no `#[allow(dead_code)]`
//! - tests fail instead of silently skipping
//! - tests touching the process environment are `#[serial]`

use std::path::{Path, PathBuf};

const MAX_LINES: usize = 750;

const SKIP_PHRASES: &[&str] = &[
    "skipping test",
    "test skipped",
    "credentials not available",
    "no network",
];

struct Violation {
    file: PathBuf,
    line: usize,
    message: String,
}

/// A test function body, one entry per line with the brace depth at its start.
struct TestFn<'a> {
    name: String,
    line: usize,
    serial: bool,
    body: Vec<(usize, i32, &'a str)>,
}

fn main() {
    let root = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    println!("cargo:rerun-if-changed=src");

    let mut files = Vec::new();
    collect_rust_files(&root.join("src"), &mut files);
    files.sort();

    let mut violations = Vec::new();
    for path in &files {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                println!("cargo:warning=Could not read {}: {}", path.display(), e);
                continue;
            }
        };
        let file = path.strip_prefix(&root).unwrap_or(path);
        let mut report = |line: usize, message: String| {
            violations.push(Violation {
                file: file.to_path_buf(),
                line,
                message,
            })
        };

        check_line_limit(&content, &mut report);
        check_dead_code_allows(&content, &mut report);
        for test in test_functions(&content) {
            check_test(&test, &mut report);
        }
    }

    if violations.is_empty() {
        return;
    }
    eprintln!("\nSource guard violations:");
    for v in &violations {
        eprintln!("  {}:{}: {}", v.file.display(), v.line, v.message);
    }
    eprintln!();
    panic!(
        "Build failed: {} source guard violation(s)",
        violations.len()
    );
}

fn collect_rust_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_rust_files(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}

fn check_line_limit(content: &str, report: &mut impl FnMut(usize, String)) {
    let lines = content.lines().filter(|l| !l.trim().is_empty()).count();
    if lines > MAX_LINES {
        report(
            1,
            format!("{} non-empty lines (max {}); split the module", lines, MAX_LINES),
        );
    }
}

fn check_dead_code_allows(content: &str, report: &mut impl FnMut(usize, String)) {
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        let is_attr = ["#[allow(", "#![allow(", "#[expect(", "#![expect("]
            .iter()
            .any(|prefix| trimmed.starts_with(prefix));
        if is_attr && trimmed.contains("dead_code") {
            report(
                index + 1,
                "dead_code allowed; delete the code or gate it with #[cfg(test)]".to_string(),
            );
        }
    }
}

fn check_test(test: &TestFn<'_>, report: &mut impl FnMut(usize, String)) {
    let mut env_reported = false;
    for &(line, depth, text) in &test.body {
        let trimmed = text.trim();
        if trimmed.starts_with("//") {
            continue;
        }

        let lower = trimmed.to_lowercase();
        if let Some(phrase) = SKIP_PHRASES.iter().find(|p| lower.contains(*p)) {
            report(line, format!("test `{}` skips itself ({})", test.name, phrase));
        }

        // Depth 1 is the function body; deeper means a conditional exit.
        if trimmed == "return;" && depth > 1 {
            report(line, format!("test `{}` returns early", test.name));
        }

        let mutates_env = trimmed.contains("env::set_var") || trimmed.contains("env::remove_var");
        if mutates_env && !test.serial && !env_reported {
            env_reported = true;
            report(
                test.line,
                format!("test `{}` mutates the process env without #[serial]", test.name),
            );
        }
    }
}

/// Finds `#[test]` / `#[tokio::test]` functions, including ones inside
/// `proptest!` blocks.
fn test_functions(content: &str) -> Vec<TestFn<'_>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut tests = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let trimmed = lines[index].trim();
        if trimmed != "#[test]" && !trimmed.starts_with("#[tokio::test") {
            index += 1;
            continue;
        }

        let mut serial = index > 0 && is_serial_attr(lines[index - 1]);
        let mut fn_index = index + 1;
        while fn_index < lines.len() && lines[fn_index].trim().starts_with("#[") {
            serial |= is_serial_attr(lines[fn_index]);
            fn_index += 1;
        }
        let Some(name) = lines.get(fn_index).and_then(|l| fn_name(l)) else {
            index += 1;
            continue;
        };

        let (body, end) = function_body(&lines, fn_index);
        tests.push(TestFn {
            name,
            line: fn_index + 1,
            serial,
            body,
        });
        index = end + 1;
    }
    tests
}

fn is_serial_attr(line: &str) -> bool {
    matches!(line.trim(), "#[serial]" | "#[serial_test::serial]")
}

fn fn_name(line: &str) -> Option<String> {
    let (_, after) = line.split_once("fn ")?;
    let name: String = after
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Lines from `start` until the opening brace closes, and the closing line.
fn function_body<'a>(lines: &[&'a str], start: usize) -> (Vec<(usize, i32, &'a str)>, usize) {
    let mut body = Vec::new();
    let mut depth = 0;
    let mut opened = false;

    for (index, line) in lines.iter().enumerate().skip(start) {
        body.push((index + 1, depth, *line));
        let mut in_string = false;
        let mut escaped = false;
        for c in line.chars() {
            match c {
                '\\' if in_string => escaped = !escaped,
                '"' if !escaped => in_string = !in_string,
                '{' if !in_string => {
                    depth += 1;
                    opened = true;
                }
                '}' if !in_string => depth -= 1,
                _ => {}
            }
            if c != '\\' {
                escaped = false;
            }
        }
        if opened && depth <= 0 {
            return (body, index);
        }
    }
    (body, lines.len())
}
