use dotenv::dotenv;
use prettytable::{row, Table};
use structopt::StructOpt;

use rate_gate::config::CacheConfig;
use rate_gate::CacheClient;

/// Inspect cache backend connectivity and usage statistics.
#[derive(Debug, StructOpt)]
#[structopt(name = "cache_stats")]
struct Opt {
    /// Backend URL (defaults to REDIS_URL or local)
    #[structopt(long)]
    url: Option<String>,

    /// Logical database index
    #[structopt(long)]
    db: Option<i64>,

    /// Also print every backend INFO key
    #[structopt(long)]
    full: bool,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    rate_gate::init_logging();

    let opt = Opt::from_args();
    let mut config = CacheConfig::from_env();
    if let Some(url) = opt.url {
        config.url = url;
    }
    if let Some(db) = opt.db {
        config.db = db;
    }

    let cache = match CacheClient::new(config) {
        Ok(cache) => cache,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = cache.initialize().await {
        eprintln!("connection failed: {err}");
    }

    let report = cache.stats().await;

    let mut table = Table::new();
    table.add_row(row!["connected", report.connected]);
    table.add_row(row!["hits", report.counters.hits]);
    table.add_row(row!["misses", report.counters.misses]);
    table.add_row(row!["errors", report.counters.errors]);
    table.add_row(row!["sets", report.counters.sets]);
    table.add_row(row!["deletes", report.counters.deletes]);
    table.add_row(row!["hit_rate", format!("{:.1}%", report.counters.hit_rate)]);

    for key in [
        "redis_version",
        "connected_clients",
        "used_memory_human",
        "uptime_in_seconds",
    ] {
        if let Some(value) = report.info.get(key) {
            table.add_row(row![key, value]);
        }
    }
    table.printstd();

    if opt.full {
        let mut entries: Vec<_> = report.info.iter().collect();
        entries.sort();
        for (key, value) in entries {
            println!("{key}: {value}");
        }
    }
}
