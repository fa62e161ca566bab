use clap::{Args, Parser, Subcommand};

/// dbaas - resolve logical databases through the DBaaS agent
///
/// Configuration is read from `DBAAS_*` environment variables and the TOML
/// file named by `DBAAS_CONFIG_FILE`.
#[derive(Parser, Debug)]
#[command(name = "dbaas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Header propagated to the agent on every request (NAME:VALUE)
    #[arg(long = "header", global = true, value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Pretty-print the JSON result
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get or create a logical database and print its record
    GetOrCreate {
        #[command(flatten)]
        target: Target,

        /// Prefix of the generated database name
        #[arg(long)]
        name_prefix: Option<String>,

        /// Physical database to place the logical one in
        #[arg(long)]
        physical_database_id: Option<String>,
    },

    /// Print connection properties of an existing logical database
    Connection {
        #[command(flatten)]
        target: Target,
    },
}

/// Which database to address.
#[derive(Args, Debug)]
pub struct Target {
    /// Database type (postgresql, mongodb, ...)
    #[arg(value_name = "DB_TYPE")]
    pub db_type: String,

    /// Classifier as a JSON object; defaults to the configured service classifier
    #[arg(long, conflicts_with = "tenant")]
    pub classifier: Option<String>,

    /// Use the tenant classifier for this tenant id
    #[arg(long)]
    pub tenant: Option<String>,

    /// Requested user role
    #[arg(long)]
    pub role: Option<String>,
}
