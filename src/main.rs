use anyhow::Result;
use clap::{Parser, Subcommand};
use nlsql_engine::report;
use nlsql_engine::service::DEFAULT_SAMPLE_SIZE;
use nlsql_engine::{logging, Config, NlSqlService};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nlsql")]
#[command(about = "Natural language to SQL over PostgreSQL")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a natural language request to SQL and run it
    Ask {
        query: String,

        /// Leave the model's explanation out of the report
        #[arg(long)]
        no_explanation: bool,
    },
    /// Run a SQL statement through the safety gate
    Sql { sql: String },
    /// List all tables grouped by schema
    Tables,
    /// Show the columns of one table
    Table {
        name: String,

        #[arg(short, long)]
        schema: Option<String>,
    },
    /// Show the first rows of a table
    Sample {
        name: String,

        #[arg(short = 'n', long, default_value_t = DEFAULT_SAMPLE_SIZE)]
        size: i64,

        #[arg(short, long)]
        schema: Option<String>,
    },
    /// Explain a SQL statement in plain language
    Explain { sql: String },
    /// Show or change SELECT-only mode
    Mode {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        #[arg(long)]
        disable: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    logging::init(&config.log_level);

    info!("nlsql starting ({:?})", config);

    let service = NlSqlService::connect(config).await?;
    let row_cap = service.config().max_query_results;

    let output = match args.command {
        Command::Ask {
            query,
            no_explanation,
        } => service
            .ask(&query, !no_explanation)
            .await
            .map(|r| report::render_ask(&r, row_cap)),
        Command::Sql { sql } => service
            .execute_sql(&sql)
            .await
            .map(|outcome| report::render_direct(sql.trim(), &outcome)),
        Command::Tables => service.list_tables().await.map(|l| report::render_table_list(&l)),
        Command::Table { name, schema } => service
            .table_info(&name, schema.as_deref())
            .await
            .map(|d| report::render_table_info(&d)),
        Command::Sample { name, size, schema } => service
            .sample_data(&name, size, schema.as_deref())
            .await
            .map(|s| report::render_sample(&s)),
        Command::Explain { sql } => service
            .explain_sql(&sql)
            .await
            .map(|text| format!("**SQL Explanation:**\n\n{}", text)),
        Command::Mode { enable, disable } => {
            if enable || disable {
                service
                    .set_mode(enable)
                    .map(|change| report::render_mode_change(&change, true))
            } else {
                let status = service.get_mode();
                Ok(format!(
                    "SELECT-only mode: {}\nToggle allowed: {}",
                    if status.select_only_mode { "on" } else { "off" },
                    status.can_toggle
                ))
            }
        }
    };

    match output {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            println!("{}", report::render_error(&e));
            std::process::exit(1);
        }
    }
}
