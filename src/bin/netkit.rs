//! netkit command-line front end.
//!
//! Usage:
//!   netkit latest                         Today's daily news list
//!   netkit news <id>                      One story
//!   netkit sections                       Section list
//!   netkit get <path> [key=value ...]     Raw GET against the base URL
//!   netkit download <url> [--dir <path>]  Stream a file to disk

use anyhow::{bail, Context};
use netkit::api::DailyApi;
use netkit::{DownloadTarget, NetWorker};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_BASE_URL: &str = "https://news-at.zhihu.com/api/4/";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "latest" => cmd_latest().await,
        "news" => cmd_news(&args[2..]).await,
        "sections" => cmd_sections().await,
        "get" => cmd_get(&args[2..]).await,
        "download" => cmd_download(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("netkit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"netkit - HTTP client facade

USAGE:
    netkit <COMMAND> [OPTIONS]

COMMANDS:
    latest                          Today's daily news list
    news <id>                       Show one story
    sections                        List sections
    get <path> [key=value ...]      Raw GET, body printed as-is
    download <url> [--dir <path>]   Stream a file to disk
    version                         Show version information
    help                            Show this help message

ENVIRONMENT:
    NETKIT_BASE_URL                 Base URL (default {DEFAULT_BASE_URL})
    NETKIT_CONFIG                   YAML client configuration file
    RUST_LOG                        Log filter, e.g. netkit=debug"#
    );
}

fn worker() -> anyhow::Result<NetWorker> {
    if let Ok(path) = std::env::var("NETKIT_CONFIG") {
        return NetWorker::from_config_file(&path)
            .with_context(|| format!("loading client config from {}", path));
    }
    let base = std::env::var("NETKIT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    Ok(NetWorker::builder().base_url(base).build()?)
}

async fn cmd_latest() -> anyhow::Result<()> {
    let api = DailyApi::new(worker()?);
    let list = api.latest().execute().await?;
    println!("{}", list.date);
    for story in &list.stories {
        println!("{:>10}  {}", story.id, story.title);
    }
    Ok(())
}

async fn cmd_news(args: &[String]) -> anyhow::Result<()> {
    let Some(raw) = args.first() else {
        bail!("usage: netkit news <id>");
    };
    let id: u64 = raw.parse().with_context(|| format!("invalid story id: {}", raw))?;
    let detail = DailyApi::new(worker()?).news(id).execute().await?;
    println!("{}\n{}\n", detail.title, detail.share_url);
    println!("{}", detail.body);
    Ok(())
}

async fn cmd_sections() -> anyhow::Result<()> {
    let sections = DailyApi::new(worker()?).sections().execute().await?;
    for section in &sections.data {
        println!("{:>6}  {}  {}", section.id, section.name, section.description);
    }
    Ok(())
}

async fn cmd_get(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: netkit get <path> [key=value ...]");
    };
    let params: Vec<(&str, &str)> = args[1..]
        .iter()
        .filter_map(|kv| kv.split_once('='))
        .collect();
    let body = worker()?.get(path, &params).execute().await?;
    println!("{}", body);
    Ok(())
}

async fn cmd_download(args: &[String]) -> anyhow::Result<()> {
    let Some(url) = args.first() else {
        bail!("usage: netkit download <url> [--dir <path>]");
    };
    let mut dir = PathBuf::from(".");
    for (i, arg) in args.iter().enumerate() {
        if arg == "--dir" {
            if let Some(path) = args.get(i + 1) {
                dir = PathBuf::from(path);
            }
        }
    }
    let target = DownloadTarget::new(dir).on_progress(|done, total| match total {
        Some(total) => eprint!("\r{} / {} bytes", done, total),
        None => eprint!("\r{} bytes", done),
    });
    let path = worker()?.download(url, target)?.wait().await?;
    eprintln!();
    println!("{}", path.display());
    Ok(())
}
