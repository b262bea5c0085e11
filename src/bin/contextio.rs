use anyhow::{Context, Result};
use clap::Parser;
use contextio::{pretty_json, Config, Credentials, Params, RestContext, DEFAULT_API_HOST};
use tracing_subscriber::EnvFilter;
use url::form_urlencoded;

/// Send a signed request to the Context.IO API and print the JSON response
#[derive(Debug, Parser)]
#[command(
    name = "contextio",
    version,
    about,
    after_help = "Keys and values in QUERY must already be URL-escaped, and so must any \
                  reserved characters used inside PATH segments."
)]
struct Cli {
    /// Consumer key
    #[arg(long)]
    key: String,

    /// Consumer secret
    #[arg(long)]
    secret: String,

    /// Form-encoded request body, ignored unless METHOD is POST, PUT or DELETE
    #[arg(long)]
    body: Option<String>,

    /// API host to send the request to
    #[arg(long, alias = "apiHost", default_value = DEFAULT_API_HOST)]
    api_host: String,

    /// Print the response status and headers, and debug logs on stderr
    #[arg(short, long)]
    verbose: bool,

    /// HTTP method, e.g. GET
    method: String,

    /// Request path, e.g. /2.0/accounts
    path: String,

    /// Query string, e.g. limit=10&offset=20
    query: Option<String>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "contextio=debug" } else { "contextio=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let query: Params = cli
        .query
        .as_deref()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let ctx = RestContext::with_config(
        Credentials::new(cli.key, cli.secret),
        Config::new(cli.api_host),
    )
    .context("failed to create client")?;

    let response = ctx
        .do_request(&cli.method, &cli.path, &query, cli.body.as_deref().map(str::as_bytes))
        .context("request failed")?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().context("failed to read response body")?;
    let pretty = pretty_json(&body).context("failed to format response as JSON")?;

    if cli.verbose {
        println!("Status: {status}");
        for (name, value) in &headers {
            println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }
    println!("{pretty}");
    Ok(())
}
