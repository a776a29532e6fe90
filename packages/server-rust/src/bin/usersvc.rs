//! Command-line client for a running usersvcd.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use usersvc_core::User;
use usersvc_server::service::AuthConfig;
use usersvc_server::{ClientConfig, UserClient};

#[derive(Parser, Debug)]
#[command(name = "usersvc", version, about = "User service client")]
struct Args {
    /// Talk JSON to this HTTP address.
    #[arg(long, env = "USERSVC_HTTP_ADDR", conflicts_with = "rpc_addr")]
    http_addr: Option<String>,
    /// Talk protobuf to this RPC address.
    #[arg(long, env = "USERSVC_RPC_ADDR")]
    rpc_addr: Option<String>,
    /// Sign `create` requests with this HS256 secret.
    #[arg(long, env = "USERSVC_AUTH_SECRET", hide_env_values = true)]
    auth_secret: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a user.
    Create {
        id: String,
        first_name: String,
        last_name: String,
        email: String,
        username: String,
    },
    /// Look a user up by id.
    Get { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("tracing init failed: {e}");
    }

    let config = ClientConfig {
        auth: args.auth_secret.map(AuthConfig::new),
        ..ClientConfig::default()
    };

    let client = match (args.http_addr, args.rpc_addr) {
        (Some(addr), _) => UserClient::http(&addr, &config),
        (None, Some(addr)) => UserClient::rpc(&addr, &config).await?,
        (None, None) => anyhow::bail!("one of --http-addr or --rpc-addr is required"),
    };

    let user = match args.command {
        Command::Create {
            id,
            first_name,
            last_name,
            email,
            username,
        } => {
            client
                .create_user(User::new(id, first_name, last_name, email, username))
                .await?
        }
        Command::Get { id } => client.get_user(&id).await?,
    };

    println!(
        "{}\t{}\t{}\t{}\t{}",
        user.id, user.first_name, user.last_name, user.email, user.username
    );
    Ok(())
}
