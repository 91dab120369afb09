use std::time::Duration;

use clap::{Parser, Subcommand};
use contest_admission::auth::{TokenIssuer, TokenSubject};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde_json::Value;
use url::Url;

#[derive(Parser)]
#[command(name = "admission-cli")]
#[command(about = "Operator CLI for the contest admission service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Identity token sent as the session cookie.
    #[arg(short, long, env = "ADMISSION_TOKEN")]
    token: Option<String>,

    #[arg(long, default_value = "auth-token")]
    cookie_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a token for local testing
    MintToken {
        #[arg(long, env = "JWT_SECRET")]
        secret: String,
        #[arg(long)]
        user: String,
        /// Repeat for several roles
        #[arg(long = "role")]
        roles: Vec<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long, default_value_t = 7 * 24 * 60 * 60)]
        ttl_secs: u64,
    },
    /// Print a random signing secret
    GenSecret {
        #[arg(long, default_value_t = 48)]
        length: usize,
    },
    /// Show the identity behind the token
    Me,
    /// List the caller's notifications
    Notifications {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        unread_only: bool,
    },
    /// Show the caller's unread count
    Unread,
    /// Mark one notification read
    MarkRead { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = Url::parse(&cli.url)?;

    let request = match cli.command {
        Commands::MintToken {
            secret,
            user,
            roles,
            company,
            ttl_secs,
        } => {
            let issuer = TokenIssuer::new(secret.as_bytes(), Duration::from_secs(ttl_secs));
            let mut subject = TokenSubject::new(user, roles);
            subject.company_id = company;
            println!("{}", issuer.issue(&subject)?);
            return Ok(());
        }
        Commands::GenSecret { length } => {
            let secret: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(length)
                .map(char::from)
                .collect();
            println!("{secret}");
            return Ok(());
        }
        Commands::Me => client.get(base.join("/api/auth/me")?),
        Commands::Notifications { limit, unread_only } => {
            let mut url = base.join("/api/notifications")?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(limit) = limit {
                    query.append_pair("limit", &limit.to_string());
                }
                if unread_only {
                    query.append_pair("unreadOnly", "true");
                }
            }
            client.get(url)
        }
        Commands::Unread => client.get(base.join("/api/notifications/unread-count")?),
        Commands::MarkRead { id } => {
            client.patch(base.join(&format!("/api/notifications/{id}/read"))?)
        }
    };

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", cli.cookie_name, token))?,
        );
    }

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Some(retry) = res.headers().get(reqwest::header::RETRY_AFTER) {
            eprintln!("Retry after: {}s", retry.to_str().unwrap_or("?"));
        }
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
