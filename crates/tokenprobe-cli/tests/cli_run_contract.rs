use axum::{
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

const DDG_PAGE: &str = r##"<html><body>
<div class="result web-result">
  <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Falpha">Alpha token</a>
  <a class="result__snippet" href="#">Alpha launched ALP.</a>
</div>
</body></html>"##;

const FINAL_REPLY: &str = "#1. Alpha\nGitHub URL: https://github.com/org/alpha\nНаявність запущеного токена: Так\nНазва токена: ALP\nПримітки: Listed in 2024.\n\n#2. Beta\nGitHub URL: https://github.com/org/beta\nНаявність запущеного токена: Ні\nНазва токена: -\nПримітки: No token found.\n";

/// Stub chat endpoint: asks for one search, then answers once it sees the tool result.
fn chat_app(tool_payloads: Arc<Mutex<Vec<String>>>) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(move |Json(body): Json<serde_json::Value>| {
                let tool_payloads = tool_payloads.clone();
                async move {
                    let messages = body["messages"].as_array().cloned().unwrap_or_default();
                    let last = messages.last().cloned().unwrap_or_default();
                    let message = if last["role"] == "tool" {
                        tool_payloads
                            .lock()
                            .unwrap()
                            .push(last["content"].as_str().unwrap_or("").to_string());
                        serde_json::json!({ "role": "assistant", "content": FINAL_REPLY })
                    } else {
                        serde_json::json!({
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {
                                    "name": "search_web",
                                    "arguments": "{\"query\":\"alpha token\"}"
                                }
                            }]
                        })
                    };
                    Json(serde_json::json!({ "choices": [{ "index": 0, "message": message }] }))
                }
            }),
        )
        .route("/html/", get(|| async { axum::response::Html(DDG_PAGE) }))
}

fn tokenprobe() -> std::process::Command {
    let bin = assert_cmd::cargo::cargo_bin!("tokenprobe");
    let mut cmd = std::process::Command::new(bin);
    cmd.env_remove("TOKENPROBE_ENV_FILE")
        .env_remove("TOKENPROBE_MODEL")
        .env_remove("TOKENPROBE_SEARCH_PROVIDER")
        .env_remove("XAI_API_KEY");
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn tokenprobe_run_writes_csv_against_stub_endpoints() {
    let tool_payloads = Arc::new(Mutex::new(Vec::new()));
    let addr = serve(chat_app(tool_payloads.clone())).await;

    let dir = tempfile::tempdir().unwrap();
    let links = dir.path().join("links.txt");
    std::fs::write(
        &links,
        "https://github.com/org/alpha\n\nhttps://github.com/org/beta\n",
    )
    .unwrap();
    let out = dir.path().join("results.csv");

    let mut cmd = tokenprobe();
    cmd.arg("run")
        .arg("--links")
        .arg(&links)
        .arg("--out")
        .arg(&out)
        .env("TOKENPROBE_API_KEY", "test-key")
        .env("TOKENPROBE_BASE_URL", format!("http://{addr}"))
        .env("TOKENPROBE_DUCKDUCKGO_ENDPOINT", format!("http://{addr}/html/"));
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .expect("run tokenprobe");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), out.display().to_string());

    let mut rdr = csv::Reader::from_path(&out).unwrap();
    let headers: Vec<String> = rdr.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(
        headers,
        vec![
            "Проект",
            "GitHub URL",
            "Наявність запущеного токена?",
            "Назва токена",
            "Примітки"
        ]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "Alpha");
    assert_eq!(&rows[0][2], "Так");
    assert_eq!(&rows[0][3], "ALP");
    assert_eq!(&rows[1][1], "https://github.com/org/beta");
    assert_eq!(&rows[1][4], "No token found.");

    let payloads = tool_payloads.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0].contains("https://example.com/alpha"), "{}", payloads[0]);
}

#[test]
fn tokenprobe_run_fails_fast_without_links_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results.csv");
    let output = tokenprobe()
        .arg("run")
        .arg("--links")
        .arg(dir.path().join("missing.txt"))
        .arg("--out")
        .arg(&out)
        .env("TOKENPROBE_API_KEY", "test-key")
        // Unroutable; a request here would hang rather than fail.
        .env("TOKENPROBE_BASE_URL", "http://10.255.255.1")
        .output()
        .expect("run tokenprobe");

    assert!(!output.status.success());
    assert!(!out.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.txt"), "stderr: {stderr}");
}

#[test]
fn tokenprobe_run_requires_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let links = dir.path().join("links.txt");
    std::fs::write(&links, "https://github.com/org/alpha\n").unwrap();
    let output = tokenprobe()
        .arg("run")
        .arg("--links")
        .arg(&links)
        .arg("--out")
        .arg(dir.path().join("results.csv"))
        .env_remove("TOKENPROBE_API_KEY")
        .output()
        .expect("run tokenprobe");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOKENPROBE_API_KEY"), "stderr: {stderr}");
}
