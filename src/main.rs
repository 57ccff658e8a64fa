use anyhow::Result;
use clap::Parser;
use last_insert_guard::cli::last_insert::{self, LastInsertConfig};
use last_insert_guard::logging::init_tracing;
use last_insert_guard::util::env;
use std::path::PathBuf;

/// Insert a row, reconnect, and recover its AUTO_INCREMENT id without
/// relying on the connection-bound LAST_INSERT_ID().
#[derive(Parser, Debug)]
#[command(name = "last_insert_id", version)]
struct Cli {
    /// Value to store in forty2_col (default: 5 characters of a N(0,1) sample)
    value: Option<String>,
    /// MySQL server URL (default: MYSQL_URL / DATABASE_URL / DB_* env)
    #[arg(long)]
    db_url: Option<String>,
    /// Database to create and use (default: FORTY2_DATABASE or test_forty2)
    #[arg(long)]
    database: Option<String>,
    /// Unix socket tried when the URL connect fails
    #[arg(long, conflicts_with = "no_socket_fallback")]
    socket: Option<PathBuf>,
    /// Never fall back to the unix socket
    #[arg(long, default_value_t = false)]
    no_socket_fallback: bool,
    /// Print the report as single-line JSON
    #[arg(long, default_value_t = false)]
    compact: bool,
}

impl From<Cli> for LastInsertConfig {
    fn from(cli: Cli) -> Self {
        Self {
            value: cli.value,
            database_url: cli.db_url,
            database: cli.database,
            socket: cli.socket,
            no_socket_fallback: cli.no_socket_fallback,
            compact: cli.compact,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env::init_env();
    init_tracing("warn")?;
    env::bootstrap_cli("last_insert_id");
    last_insert::run(cli.into()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn value_is_optional_positional() {
        let cli = Cli::try_parse_from(["last_insert_id"]).unwrap();
        assert!(cli.value.is_none());

        let cli = Cli::try_parse_from(["last_insert_id", "hello", "--compact"]).unwrap();
        assert_eq!(cli.value.as_deref(), Some("hello"));
        assert!(cli.compact);
    }

    #[test]
    fn flags_map_into_config() {
        let cli = Cli::try_parse_from([
            "last_insert_id",
            "--db-url",
            "mysql://u@h",
            "--database",
            "other_db",
            "--no-socket-fallback",
            "v",
        ])
        .unwrap();
        let cfg: LastInsertConfig = cli.into();
        assert_eq!(cfg.database_url.as_deref(), Some("mysql://u@h"));
        assert_eq!(cfg.database.as_deref(), Some("other_db"));
        assert!(cfg.no_socket_fallback);
        assert_eq!(cfg.value.as_deref(), Some("v"));
    }

    #[test]
    fn socket_conflicts_with_no_fallback() {
        assert!(Cli::try_parse_from([
            "last_insert_id",
            "--socket",
            "/tmp/x.sock",
            "--no-socket-fallback",
        ])
        .is_err());
    }
}
