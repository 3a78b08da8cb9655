use anyhow::Context;

use crate::cli::OutputFormat;

pub async fn handle(base_url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    let response = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("health endpoint returned invalid JSON")?;

    match output_format {
        OutputFormat::Json => println!("{}", body),
        OutputFormat::Text => {
            let db = body["data"]["database"].as_str().unwrap_or("unknown");
            println!("{} -> {} (database: {})", url, status, db);
        }
    }

    if !status.is_success() {
        anyhow::bail!("server reported degraded health ({})", status);
    }
    Ok(())
}
