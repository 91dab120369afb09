//! Contest admission service.
//!
//! ```text
//!   Client ──▶ request id / trace / timeout / body limit
//!                  │
//!                  ▼
//!            rate limiter ── 429 + Retry-After
//!                  │
//!                  ▼
//!          authorization gate ── 401 / 403
//!                  │
//!                  ▼
//!       session + notification handlers ──▶ notification store
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "contest-admission")]
#[command(about = "Rate limiting, token auth and notifications for the contest platform", long_about = None)]
struct Args {
    /// Path to the TOML config file; watched for quota changes.
    #[arg(short, long, env = "CONTEST_ADMISSION_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    contest_admission::lifecycle::run(args.config).await?;
    Ok(())
}
