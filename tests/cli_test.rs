use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_deckforge"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn write_sample_deck(dir: &Path) -> String {
    let markdown_path = dir.join("deck.md");
    let markdown_content = "% Launch Plan\n% Ada\n\n\
# Launch Plan\nQ3 roadmap\n\n\
- Hire two engineers\n- Ship the beta\n- Grow revenue\n\n\
> Focus wins\n-- Ada";
    fs::write(&markdown_path, markdown_content).expect("Failed to write markdown file");
    markdown_path.to_str().unwrap().to_string()
}

#[test]
fn test_generate_markdown_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample_deck(temp_dir.path());
    let output_path = temp_dir.path().join("out").join("deck.md");

    let output = run_command(&[
        "generate",
        "-i",
        &input,
        "-o",
        output_path.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "Command failed: {:?}", output);
    let content = fs::read_to_string(&output_path).expect("Failed to read output file");
    assert!(content.contains("# Launch Plan"), "Missing title slide");
    assert!(content.contains("- Hire two engineers"), "Missing list slide");
    assert!(content.contains("> -- Ada"), "Missing quote attribution");
    assert_eq!(content.matches("\n---\n").count(), 2);
}

#[test]
fn test_generate_json_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample_deck(temp_dir.path());
    let output_path = temp_dir.path().join("deck.json");

    let output = run_command(&[
        "generate",
        "-i",
        &input,
        "-o",
        output_path.to_str().unwrap(),
        "--format",
        "json",
    ]);

    assert!(output.status.success(), "Command failed: {:?}", output);
    let raw = fs::read_to_string(&output_path).expect("Failed to read output file");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("Output is not JSON");

    assert_eq!(json["meta"]["title"], "Launch Plan");
    assert_eq!(json["slides"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["layout_decisions"][0]["type"], "title");
    assert_eq!(json["metrics"]["steps"].as_array().map(Vec::len), Some(4));
}

#[test]
fn test_generate_html_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample_deck(temp_dir.path());
    let output_path = temp_dir.path().join("deck.html");

    let output = run_command(&[
        "generate",
        "-i",
        &input,
        "-o",
        output_path.to_str().unwrap(),
        "--format",
        "html",
    ]);

    assert!(output.status.success(), "Command failed: {:?}", output);
    let html = fs::read_to_string(&output_path).expect("Failed to read output file");
    assert!(html.contains("<title>Launch Plan</title>"));
    assert!(html.contains("<div class=\"slide slide-title\" data-index=\"1\">"));
    assert!(html.contains("<h1>Launch Plan</h1>"));
    assert!(html.contains("<blockquote>"));
}

#[test]
fn test_generate_split_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample_deck(temp_dir.path());
    let split_dir = temp_dir.path().join("slides");

    let output = run_command(&[
        "generate",
        "-i",
        &input,
        "--split-dir",
        split_dir.to_str().unwrap(),
        "--base-name",
        "launch",
    ]);

    assert!(output.status.success(), "Command failed: {:?}", output);
    for index in 1..=3 {
        let path = split_dir.join(format!("launch_{:04}.md", index));
        assert!(path.exists(), "Missing slide file {:?}", path);
    }
    let first = fs::read_to_string(split_dir.join("launch_0001.md")).unwrap();
    assert!(first.contains("# Launch Plan"));
}

#[test]
fn test_generate_rejects_unsafe_base_name() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample_deck(temp_dir.path());
    let split_dir = temp_dir.path().join("slides");

    let output = run_command(&[
        "generate",
        "-i",
        &input,
        "--split-dir",
        split_dir.to_str().unwrap(),
        "--base-name",
        "../escape",
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsafe filename"), "stderr: {}", stderr);
}

#[test]
fn test_generate_missing_input_fails() {
    let output = run_command(&["generate", "-i", "/definitely/not/here.md"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read input"), "stderr: {}", stderr);
}

#[test]
fn test_analyze_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample_deck(temp_dir.path());

    let output = run_command(&["analyze", "-i", &input]);

    assert!(output.status.success(), "Command failed: {:?}", output);
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output is not JSON");
    assert_eq!(json["domain"], "business");
    assert!(json["suggested_slide_count"].as_u64().unwrap() >= 3);
}

#[test]
fn test_validate_templates_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let good = temp_dir.path().join("good.json");
    fs::write(
        &good,
        r#"[{ "id": "slide:title", "version": "2.0.0", "layout": "title",
              "content": "{{> partial:meta}}## {{title}}\n", "extends": "slide:base" }]"#,
    )
    .unwrap();
    let cyclic = temp_dir.path().join("cyclic.json");
    fs::write(
        &cyclic,
        r#"[{ "id": "x", "version": "1.0.0", "layout": "d", "content": "x", "extends": "y" },
            { "id": "y", "version": "1.0.0", "layout": "d", "content": "y", "extends": "x" }]"#,
    )
    .unwrap();

    let output = run_command(&["validate-templates", "-t", good.to_str().unwrap()]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("templates are valid"));

    let output = run_command(&["validate-templates", "-t", cyclic.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("inheritance cycle"));
}

#[test]
fn test_config_file_is_applied() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample_deck(temp_dir.path());
    let config = temp_dir.path().join("config.json");
    fs::write(&config, r#"{ "template_cache_size": 0 }"#).unwrap();

    let output = run_command(&[
        "--config",
        config.to_str().unwrap(),
        "generate",
        "-i",
        &input,
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error"), "stderr: {}", stderr);
}
