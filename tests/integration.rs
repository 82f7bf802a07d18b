use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ihub_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ihub");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("sources.csv"),
        "名称,网址,检索目标\nThe Verge,https://theverge.com,Gadgets\n,https://anon.example,\nNo URL,,ignored\n",
    )
    .unwrap();
    fs::write(
        files_dir.join("sources.json"),
        r#"[{"name":"Wired","url":"https://wired.com","target":"Culture"},{"Name":"Ars","URL":"https://arstechnica.com"}]"#,
    )
    .unwrap();
    fs::write(files_dir.join("sources.xls"), b"not really excel").unwrap();
    fs::write(files_dir.join("sources.ods"), b"opendocument").unwrap();
    write_xlsx(&files_dir.join("sources.xlsx"));

    let config_content = format!(
        r#"[db]
path = "{}/data/hub.sqlite"

[provider]
kind = "disabled"

[report]
language = "English"

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("hub.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn write_xlsx(path: &Path) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("xl/sharedStrings.xml", options).unwrap();
    zip.write_all(
        br#"<sst><si><t>Name</t></si><si><t>URL</t></si><si><t>Hacker News</t></si><si><t>https://news.ycombinator.com</t></si></sst>"#,
    )
    .unwrap();
    zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    zip.write_all(
        br#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2" t="s"><v>3</v></c></row></sheetData></worksheet>"#,
    )
    .unwrap();
    zip.finish().unwrap();
}

fn run_ihub(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ihub_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ihub binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn init(config_path: &Path) {
    let (_, stderr, success) = run_ihub(config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
}

fn configs_json(config_path: &Path) -> serde_json::Value {
    let (stdout, stderr, success) = run_ihub(config_path, &["configs", "export"]);
    assert!(success, "export failed: {}", stderr);
    serde_json::from_str(&stdout).unwrap()
}

#[test]
fn test_init_creates_database_and_default_set() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ihub(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Seeded default configuration set"));
    assert!(tmp.path().join("data/hub.sqlite").exists());

    // Second init leaves the stored sets alone.
    let (stdout, _, success) = run_ihub(&config_path, &["init"]);
    assert!(success);
    assert!(!stdout.contains("Seeded"));

    let (stdout, _, success) = run_ihub(&config_path, &["configs", "list"]);
    assert!(success);
    assert!(stdout.contains("* default-set"));
    assert!(stdout.contains("Default intel set"));
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_ihub(&tmp.path().join("nope.toml"), &["configs", "list"]);
    assert!(!success);
    assert!(stderr.contains("nope.toml"));
}

#[test]
fn test_create_select_and_delete_configs() {
    let (_tmp, config_path) = setup_test_env();
    init(&config_path);

    let (stdout, _, success) = run_ihub(&config_path, &["configs", "create"]);
    assert!(success);
    assert!(stdout.contains("New intel set 2"));

    let configs = configs_json(&config_path);
    let new_id = configs[1]["id"].as_str().unwrap().to_string();
    assert_eq!(configs[1]["updateTime"], "09:00");
    assert_eq!(configs[1]["autoSend"], false);

    // The new set was selected on creation; deleting it falls back to the first.
    let (stdout, _, _) = run_ihub(&config_path, &["configs", "list"]);
    assert!(stdout.contains(&format!("* {}", new_id)));
    let (_, stderr, success) = run_ihub(&config_path, &["configs", "delete", &new_id]);
    assert!(success, "delete failed: {}", stderr);
    let (stdout, _, _) = run_ihub(&config_path, &["configs", "list"]);
    assert!(stdout.contains("* default-set"));

    let (_, stderr, success) = run_ihub(&config_path, &["configs", "delete", "default-set"]);
    assert!(!success);
    assert!(stderr.contains("at least one configuration set"));
}

#[test]
fn test_set_validates_fields() {
    let (_tmp, config_path) = setup_test_env();
    init(&config_path);

    let (stdout, stderr, success) = run_ihub(
        &config_path,
        &[
            "configs",
            "set",
            "default-set",
            "--name",
            "Weekly",
            "--lookback-days",
            "3",
            "--webhook-url",
            "https://hooks.example/x",
            "--auto-send",
            "false",
        ],
    );
    assert!(success, "set failed: {}", stderr);
    let updated: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(updated["name"], "Weekly");
    assert_eq!(updated["lookbackDays"], 3);
    assert_eq!(updated["webhookUrl"], "https://hooks.example/x");
    assert_eq!(updated["autoSend"], false);

    let (_, stderr, success) = run_ihub(
        &config_path,
        &["configs", "set", "default-set", "--update-time", "25:00"],
    );
    assert!(!success);
    assert!(stderr.contains("updateTime"));
}

#[test]
fn test_sources_and_areas_edit() {
    let (_tmp, config_path) = setup_test_env();
    init(&config_path);

    let (_, stderr, success) = run_ihub(
        &config_path,
        &[
            "sources",
            "add",
            "default-set",
            "--name",
            "Wired",
            "--url",
            "https://wired.com",
        ],
    );
    assert!(success, "sources add failed: {}", stderr);

    let (_, _, success) = run_ihub(&config_path, &["sources", "toggle", "default-set", "1"]);
    assert!(success);
    let (stdout, _, success) = run_ihub(&config_path, &["areas", "remove", "default-set", "2"]);
    assert!(success);
    assert!(stdout.contains("Removed 2"));
    let (_, _, success) = run_ihub(&config_path, &["areas", "add", "default-set", "Robotics"]);
    assert!(success);

    let configs = configs_json(&config_path);
    let sources = configs[0]["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0]["enabled"], false);
    assert_eq!(sources[2]["name"], "Wired");
    assert_eq!(sources[2]["target"], "");
    let areas: Vec<&str> = configs[0]["areas"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["keyword"].as_str().unwrap())
        .collect();
    assert_eq!(areas, vec!["Artificial Intelligence (AI)", "Robotics"]);
}

#[test]
fn test_import_csv_json_and_xlsx() {
    let (tmp, config_path) = setup_test_env();
    init(&config_path);
    let files = tmp.path().join("files");

    let (stdout, stderr, success) = run_ihub(
        &config_path,
        &["import", "default-set", files.join("sources.csv").to_str().unwrap()],
    );
    assert!(success, "csv import failed: {}", stderr);
    assert!(stdout.contains("Imported 2 sources."));

    let (stdout, _, success) = run_ihub(
        &config_path,
        &["import", "default-set", files.join("sources.json").to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.contains("Imported 2 sources."));

    let (stdout, stderr, success) = run_ihub(
        &config_path,
        &["import", "default-set", files.join("sources.xlsx").to_str().unwrap()],
    );
    assert!(success, "xlsx import failed: {}", stderr);
    assert!(stdout.contains("Imported 1 sources."));

    let configs = configs_json(&config_path);
    let names: Vec<&str> = configs[0]["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "TechCrunch",
            "Reuters",
            "The Verge",
            "未命名",
            "Wired",
            "Ars",
            "Hacker News"
        ]
    );
    assert_eq!(configs[0]["sources"][2]["target"], "Gadgets");
}

#[test]
fn test_import_rejects_unsupported_format() {
    let (tmp, config_path) = setup_test_env();
    init(&config_path);

    let file = tmp.path().join("files/sources.ods");
    let (_, stderr, success) =
        run_ihub(&config_path, &["import", "default-set", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"));

    let file = tmp.path().join("files/sources.xls");
    let (_, stderr, success) =
        run_ihub(&config_path, &["import", "default-set", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("XLSX import failed"), "stderr: {}", stderr);

    let configs = configs_json(&config_path);
    assert_eq!(configs[0]["sources"].as_array().unwrap().len(), 2);
}

#[test]
fn test_generate_with_disabled_provider_fails_and_archives_nothing() {
    let (_tmp, config_path) = setup_test_env();
    init(&config_path);

    let (_, stderr, success) = run_ihub(&config_path, &["generate"]);
    assert!(!success);
    assert!(stderr.contains("Generation provider is disabled"));

    let (stdout, _, success) = run_ihub(&config_path, &["reports", "list"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 1, "only the header: {}", stdout);

    let (stdout, _, success) = run_ihub(&config_path, &["reports", "latest"]);
    assert!(success);
    assert!(stdout.contains("No reports yet."));
}

#[test]
fn test_suggest_with_disabled_provider_adds_nothing() {
    let (_tmp, config_path) = setup_test_env();
    init(&config_path);

    let (stdout, stderr, success) = run_ihub(&config_path, &["areas", "suggest", "default-set"]);
    assert!(success, "suggest failed: {}", stderr);
    assert!(stdout.contains("No new keywords suggested."));
}

#[test]
fn test_unknown_report_is_an_error() {
    let (_tmp, config_path) = setup_test_env();
    init(&config_path);

    let (_, stderr, success) = run_ihub(&config_path, &["reports", "show", "missing"]);
    assert!(!success);
    assert!(stderr.contains("report not found: missing"));
}
