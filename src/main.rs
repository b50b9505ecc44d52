use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use news_analyzer::{
    AnalysisConfig, FetchConfig, NewsAnalyzer, PgRepository, SourceConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "news-analyzer")]
#[command(about = "Crawl news sources, group re-reports, and measure publication speed")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl one source from its JSON config file
    Crawl {
        /// Path to the source config
        config: PathBuf,
        /// Analyze each newly saved article after the crawl
        #[arg(long)]
        analyze: bool,
    },
    /// Crawl every source config in a directory
    CrawlAll {
        /// Directory of *.json source configs
        config_dir: PathBuf,
        /// Analyze each newly saved article after the crawls
        #[arg(long)]
        analyze: bool,
    },
    /// Group one article and score its sentiment
    Analyze {
        article_id: Uuid,
    },
    /// Recompute publication-speed metrics for a story group
    Speed {
        group_id: Uuid,
    },
    /// Delete articles ingested more than the given number of days ago
    Purge {
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let repo = Arc::new(PgRepository::connect(&database_url).await?);
    let analyzer = NewsAnalyzer::new(repo, FetchConfig::default(), AnalysisConfig::default())?;

    match cli.command {
        Command::Crawl { config, analyze } => {
            let source = SourceConfig::load(&config)?;
            if analyze {
                let (report, analyses) = analyzer.crawl_and_analyze(&source).await?;
                print_json(&report)?;
                for analysis in &analyses {
                    print_json(analysis)?;
                }
            } else {
                print_json(&analyzer.crawl_source(&source).await?)?;
            }
        }
        Command::CrawlAll { config_dir, analyze } => {
            let reports = analyzer.crawl_all(&config_dir).await?;
            for report in &reports {
                print_json(report)?;
                if analyze {
                    for article_id in &report.new_article_ids {
                        print_json(&analyzer.analyze_article(*article_id).await?)?;
                    }
                }
            }
        }
        Command::Analyze { article_id } => {
            print_json(&analyzer.analyze_article(article_id).await?)?;
        }
        Command::Speed { group_id } => {
            print_json(&analyzer.compute_speed(group_id).await?)?;
        }
        Command::Purge { days } => {
            let cutoff = Utc::now() - Duration::days(days);
            print_json(&analyzer.purge_before(cutoff).await?)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
