use chrono::Utc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use shared::telegram::TelegramSubscriber;
use trending_crawler::{config::Env, Crawler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let env = Env::from_env()?;

    let telegram = env
        .telegram()
        .map(|(token, chat_id)| TelegramSubscriber::new(token, chat_id));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(telegram.clone())
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    let crawler = Crawler::from_env(&env)?;

    tokio::select! {
        _ = run(&crawler, &env, telegram.as_ref()) => {}
        _ = signal::ctrl_c() => {
            warn!("Received SIGINT. Exiting.");
        }
    }

    if let Some(telegram) = &telegram {
        telegram.flush().await;
    }
    Ok(())
}

async fn run(crawler: &Crawler, env: &Env, telegram: Option<&TelegramSubscriber>) {
    let Some(period) = env.run_interval() else {
        run_once(crawler, telegram).await;
        return;
    };

    info!("Crawling every {} minutes", period.as_secs() / 60);
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        run_once(crawler, telegram).await;
    }
}

async fn run_once(crawler: &Crawler, telegram: Option<&TelegramSubscriber>) {
    let today = Utc::now().date_naive();
    info!("Starting trending crawl for {today}");
    let report = crawler.run(today).await;
    if let Some(telegram) = telegram {
        telegram.summary(&report.to_string());
    }
}
