use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use dualport::rpc::codec;
use dualport::rpc::server::{GRPC_MESSAGE, GRPC_STATUS, RPC_CONTENT_TYPE};
use dualport::rpc::Code;

#[derive(Parser)]
#[command(name = "dualport-cli")]
#[command(about = "Call a dualport server over RPC or the HTTP gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Credential sent as `authorization` metadata.
    #[arg(short, long)]
    token: Option<String>,

    /// Request id sent as `x-request-id` metadata.
    #[arg(short, long)]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a method with a JSON payload
    Call {
        /// RPC method, e.g. /greeter.Greeter/SayHello
        method: String,
        /// JSON request body
        json: String,
        /// Go through the HTTP gateway at this path instead of RPC
        #[arg(short, long)]
        gateway: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(token)?);
    }
    if let Some(id) = &cli.request_id {
        headers.insert("x-request-id", HeaderValue::from_str(id)?);
    }

    match cli.command {
        Commands::Call { method, json, gateway } => {
            serde_json::from_str::<serde_json::Value>(&json)?;
            match gateway {
                Some(path) => call_gateway(&cli.url, &path, json, headers).await?,
                None => call_rpc(&cli.url, &method, json, headers).await?,
            }
        }
    }

    Ok(())
}

async fn call_gateway(
    url: &str,
    path: &str,
    json: String,
    headers: HeaderMap,
) -> Result<(), Box<dyn std::error::Error>> {
    let res = reqwest::Client::new()
        .post(format!("{url}{path}"))
        .headers(headers)
        .header(CONTENT_TYPE, "application/json")
        .body(json)
        .send()
        .await?;

    let status = res.status();
    let text = res.text().await?;
    if status.is_success() {
        println!("{}", pretty(&text));
    } else {
        eprintln!("Error: gateway returned status {status}");
        eprintln!("{}", pretty(&text));
        std::process::exit(1);
    }
    Ok(())
}

async fn call_rpc(
    url: &str,
    method: &str,
    json: String,
    headers: HeaderMap,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::builder().http2_prior_knowledge().build()?;
    let res = client
        .post(format!("{url}{method}"))
        .headers(headers)
        .header(CONTENT_TYPE, RPC_CONTENT_TYPE)
        .header("te", "trailers")
        .body(codec::encode(json.as_bytes()))
        .send()
        .await?;

    // Failures are trailers-only: the status arrives with the headers.
    if let Some(code) = res.headers().get(GRPC_STATUS).and_then(|v| v.to_str().ok()) {
        let code = Code::from_i32(code.parse().unwrap_or(Code::Unknown.as_i32()));
        if code != Code::Ok {
            let message = res
                .headers()
                .get(GRPC_MESSAGE)
                .and_then(|v| v.to_str().ok())
                .map(codec::decode_message)
                .unwrap_or_default();
            eprintln!("Error: {code}: {message}");
            std::process::exit(1);
        }
    }

    let body = res.bytes().await?;
    let reply = codec::decode(&body)?;
    println!("{}", pretty(&String::from_utf8_lossy(&reply)));
    Ok(())
}

fn pretty(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| text.to_string())
}
