//! Point d'entrée de Sanda.
//!
//! Usage :
//!   sanda [URL...] [--stealth] [--watch SECS] [--dump]
//!
//! Exemples :
//!   cargo run -- doubleclick.net/ads             → un onglet, traqueur bloqué
//!   cargo run -- example.com hotjar.com --watch 20 → laisse le ticker geler
//!   cargo run -- --stealth youtube.com --dump      → export JSON-lines sur stdout

use std::env;
use std::error::Error;
use std::io;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use sanda::browser::Browser;
use sanda::config::Config;
use sanda::tabs::is_internal_url;

#[derive(Debug, Clone)]
struct Args {
    urls: Vec<String>,
    stealth: bool,
    watch: Option<Duration>,
    dump: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // ── 1. Logging / Tracing ───────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // ── 2. Arguments ───────────────────────────────────────────────────
    let args = parse_args(env::args().skip(1))?;

    // ── 3. Configuration ───────────────────────────────────────────────
    let config = Config::load();
    let mut urls = args.urls.clone();
    if urls.is_empty() && !is_internal_url(&config.general.default_url) {
        urls.push(config.general.default_url.clone());
    }
    let browser = Browser::new(config);

    if args.stealth && !browser.shield_snapshot().await.stealth_mode {
        browser.toggle_stealth().await;
    }

    // ── 4. Navigation ──────────────────────────────────────────────────
    let mut first = true;
    for input in &urls {
        let url = normalize_url(input);
        let tab = match browser.active_tab().await {
            Some(active) if first => active.id,
            _ => browser.new_tab().await,
        };
        first = false;
        match browser.navigate(tab, &url).await {
            Ok(verdict) => info!(%tab, url = %url, blocked = verdict.is_blocked, reason = %verdict.reason, "Visited"),
            Err(e) => warn!(error = %e, url = %url, "Navigation failed"),
        }
    }

    // ── 5. Ticker ──────────────────────────────────────────────────────
    if let Some(watch) = args.watch {
        let ticker = browser.spawn_ticker();
        info!(secs = watch.as_secs(), "Watching tab lifecycle");
        tokio::time::sleep(watch).await;
        ticker.abort();
    }

    // ── 6. Bilan ───────────────────────────────────────────────────────
    let shield = browser.shield_snapshot().await;
    let tabs = browser.tabs().await;
    if args.dump {
        sanda::export::write_session(&mut io::stdout().lock(), &shield, &tabs)?;
    } else {
        println!(
            "ads={} trackers={} cryptojacking={} threat={:?} stealth={}",
            shield.ads_blocked,
            shield.trackers_blocked,
            shield.cryptojacking_blocked,
            shield.last_threat_level,
            shield.stealth_mode,
        );
        for tab in &tabs {
            println!(
                "{:<8} {:<8} {:>3}  {:>6.1} MB  {}",
                tab.id.to_string(),
                tab.state,
                tab.security_score,
                tab.memory_usage_mb,
                tab.url
            );
        }
    }
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, Box<dyn Error>> {
    let mut parsed = Args {
        urls: Vec::new(),
        stealth: false,
        watch: None,
        dump: false,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stealth" => parsed.stealth = true,
            "--dump" => parsed.dump = true,
            "--watch" => {
                let secs: u64 = args
                    .next()
                    .ok_or("--watch attend un nombre de secondes")?
                    .parse()?;
                parsed.watch = Some(Duration::from_secs(secs));
            }
            flag if flag.starts_with("--") => return Err(format!("option inconnue : {flag}").into()),
            _ => parsed.urls.push(arg),
        }
    }
    Ok(parsed)
}

/// Ajoute `https://` si l'argument n'a pas de schéma.
fn normalize_url(input: &str) -> String {
    if Url::parse(input).is_ok() {
        return input.to_string();
    }
    Url::parse(&format!("https://{input}"))
        .map(String::from)
        .unwrap_or_else(|_| input.to_string())
}
