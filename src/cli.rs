use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the search server
    Serve {
        /// Address to listen on, overrides server.listen_addr
        #[clap(short, long)]
        listen: Option<String>,

        /// Don't load the corpus before accepting requests
        #[clap(long, default_value = "false")]
        no_load: bool,
    },

    /// Fetch the corpus once and report its size
    Load,

    /// Load the corpus and run a single search
    Search {
        /// Search query
        query: String,

        /// term_frequency_token or sentence_embedding
        #[clap(short, long)]
        approach: Option<String>,

        /// Page number, starting at 1
        #[clap(short, long)]
        page: Option<i64>,

        /// Results per page (1-100)
        #[clap(long)]
        per_page: Option<i64>,
    },
}
