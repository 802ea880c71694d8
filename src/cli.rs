use clap::{Parser, Subcommand};

/// dialbackd: dialback identity confirmation node
#[derive(Parser)]
#[command(name = "dialbackd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the dialback server
    Serve {
        /// Port to bind (defaults to DIALBACK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a dialback-authenticated POST
    ///
    /// The issued token is remembered in the configured store and must be
    /// confirmed later by a running `serve` node. Both processes have to
    /// share that store, so set DIALBACK_STORE=redis; with the memory store
    /// the token dies with this process.
    Post {
        /// Target resource URL
        #[arg(long)]
        url: String,
        /// Identity to claim: a hostname or account@domain
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "")]
        body: String,
        #[arg(long, default_value = "application/x-www-form-urlencoded")]
        content_type: String,
    },

    /// Run one expiry sweep and exit
    Sweep,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_post() {
        let cli = Cli::parse_from([
            "dialbackd", "post", "--url", "http://b.example/r", "--id", "alice@a.example", "--body", "type=test",
        ]);
        match cli.command {
            Some(Commands::Post { url, id, body, content_type }) => {
                assert_eq!(url, "http://b.example/r");
                assert_eq!(id.as_deref(), Some("alice@a.example"));
                assert_eq!(body, "type=test");
                assert_eq!(content_type, "application/x-www-form-urlencoded");
            }
            _ => panic!("expected post"),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::parse_from(["dialbackd"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_post_help_names_shared_store() {
        let cmd = Cli::command();
        let post = cmd.find_subcommand("post").unwrap();
        let help = post.get_long_about().unwrap().to_string();
        assert!(help.contains("DIALBACK_STORE=redis"));
    }
}
