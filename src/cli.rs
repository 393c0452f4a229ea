use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rlm-memory",
    about = "Local, persistent memory service for an interactive coding assistant",
    version
)]
pub struct Cli {
    /// Override the storage root (default: ~/.claude/rlm/context)
    #[arg(long, global = true)]
    pub storage_root: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the MCP stdio server
    Serve,

    /// Report chunk/insight/session counts and embedding provider
    Status,

    /// Store a content-addressed chunk of text
    Chunk {
        /// Content to store (reads stdin if omitted)
        content: Option<String>,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        ticket: Option<String>,

        #[arg(long)]
        domain: Option<String>,
    },

    /// Read a chunk's content, optionally sliced by line range
    Peek {
        id: String,

        #[arg(long)]
        start_line: Option<usize>,

        #[arg(long)]
        end_line: Option<usize>,
    },

    /// Regex search over active chunk bodies
    Grep {
        pattern: String,

        /// Fuzzy-match every line of every chunk instead of using regex
        #[arg(long)]
        fuzzy: bool,

        #[arg(long, default_value_t = 0)]
        threshold: i64,

        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// List chunk metadata
    ListChunks {
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Hybrid BM25 + cosine search across chunks and insights
    Search {
        query: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Include insights in the corpus alongside chunks
        #[arg(long, default_value_t = true)]
        include_insights: bool,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Retention (archive/purge) commands
    Retention {
        #[command(subcommand)]
        command: RetentionCommand,
    },

    /// Restore an archived chunk back to active storage
    Restore { id: String },

    /// List recorded sessions
    Sessions {
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// List curated and observed domains
    Domains,

    /// Store a short insight
    Remember {
        content: String,

        #[arg(long, default_value = "general")]
        category: String,

        #[arg(long, default_value = "medium")]
        importance: String,

        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Recall insights ranked by relevance to a query
    Recall {
        query: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        importance: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Remove an insight by id
    Forget { id: String },
}

#[derive(Subcommand)]
pub enum RetentionCommand {
    /// List chunks that would be archived or purged right now
    Preview,

    /// Apply the archive/purge policy
    Run {
        #[arg(long, default_value_t = true)]
        archive: bool,

        #[arg(long, default_value_t = false)]
        purge: bool,
    },
}

#[derive(clap::Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub domain: Option<String>,

    #[arg(long)]
    pub date_from: Option<String>,

    #[arg(long)]
    pub date_to: Option<String>,

    #[arg(long)]
    pub entity: Option<String>,
}

impl From<FilterArgs> for crate::search::SearchFilters {
    fn from(f: FilterArgs) -> Self {
        crate::search::SearchFilters {
            project: f.project,
            domain: f.domain,
            date_from: f.date_from,
            date_to: f.date_to,
            entity: f.entity,
        }
    }
}
