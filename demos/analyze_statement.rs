use anyhow::{bail, Context};
use dotenv::dotenv;
use statement_insight::{PipelineConfig, StatementProcessor};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: analyze_statement <statement.csv|.pdf|.jpg|.png|.webp|.heic>");
    };
    let path = Path::new(&path);
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("statement path has no file name")?;

    println!("🚀 Analyzing {}...\n", filename);

    let bytes = std::fs::read(path).with_context(|| format!("reading {:?}", path))?;
    let processor = StatementProcessor::from_env(PipelineConfig::default())?;

    let report = match processor.process_upload(filename, &bytes).await {
        Ok(report) => report,
        Err(e) if e.is_client_error() => {
            println!("❌ {}", e.client_reason());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("📄 {} transactions:", report.transactions.len());
    for txn in &report.transactions {
        println!(
            "   {} {:<40} {:>12.2}  {:<16}{}",
            txn.date,
            txn.description.chars().take(40).collect::<String>(),
            txn.amount,
            txn.category,
            if txn.is_anomalous() { "  ⚠️" } else { "" }
        );
    }

    println!("\n🔍 {} unusual transactions", report.anomalies.len());
    println!("💡 {}", report.insight);

    std::fs::write("report.json", serde_json::to_string_pretty(&report)?)?;
    println!("\n✅ Full report written to report.json");

    Ok(())
}
