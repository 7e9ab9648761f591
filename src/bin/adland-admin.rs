use adland::config::{load_routes, Config, DatabaseBackend};
use adland::filter::Router;
use adland::storage::{PostgresStorage, SqliteStorage, VisitCounter};
use adland::templates::TemplateStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "adland-admin")]
#[command(about = "Route checking and visit counter management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a route file and its templates, then print the route table
    CheckRoutes {
        /// Route file (defaults to ROUTES_FILE)
        file: Option<String>,
    },
    /// Show the visit count of a visitor token
    Visits {
        /// Value of the visitor cookie
        token: String,
    },
    /// Forget a visitor token's visit count
    Reset {
        /// Value of the visitor cookie
        token: String,
    },
    /// List the most frequent visitors
    Top {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

async fn open_counter(config: &Config) -> Result<Arc<dyn VisitCounter>> {
    let counter: Arc<dyn VisitCounter> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };
    counter.init().await?;
    Ok(counter)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::CheckRoutes { file } => {
            let file = file.unwrap_or_else(|| config.filter.routes_file.clone());
            let configs = load_routes(&file)?;
            let mut templates = TemplateStore::new(&config.filter.template_dir);
            let router = Router::build(&configs, &mut templates)
                .with_context(|| format!("routes in {file} are not servable"))?;

            println!("✓ {} defines {} route(s)", file, router.len());
            println!("{:<30} {:<8} {:<8} {:<10} {}", "URL", "IPS", "AREAS", "COOKIES", "UAS");
            println!("{}", "-".repeat(70));
            for path in router.paths() {
                let Some(route) = router.get(path) else {
                    continue;
                };
                let count = |m: Option<&adland::filter::PatternMatcher>| {
                    m.map(|m| m.patterns().len().to_string())
                        .unwrap_or_else(|| "-".to_string())
                };
                println!(
                    "{:<30} {:<8} {:<8} {:<10} {}",
                    path,
                    count(route.blocked_ips()),
                    count(route.blocked_areas()),
                    route
                        .blocked_cookies()
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    count(route.allowed_uas()),
                );
            }
        }
        Commands::Visits { token } => {
            let counter = open_counter(&config).await?;
            match counter.get(&token).await? {
                Some(visits) => println!("{}: {} visit(s)", token, visits),
                None => println!("⚠ No visits recorded for '{}'", token),
            }
        }
        Commands::Reset { token } => {
            let counter = open_counter(&config).await?;
            if counter.reset(&token).await? {
                println!("✓ Reset visit count for '{}'", token);
            } else {
                println!("⚠ No visits recorded for '{}'", token);
            }
        }
        Commands::Top { limit } => {
            let counter = open_counter(&config).await?;
            let visitors = counter.top(limit).await?;
            if visitors.is_empty() {
                println!("No visits recorded.");
            } else {
                println!("{:<40} {:>8} {}", "Visitor", "Visits", "Last seen");
                println!("{}", "-".repeat(80));
                for record in visitors {
                    let last_seen = chrono::DateTime::from_timestamp(record.last_seen_at, 0)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| record.last_seen_at.to_string());
                    println!("{:<40} {:>8} {}", record.visitor, record.visits, last_seen);
                }
            }
        }
    }

    Ok(())
}
