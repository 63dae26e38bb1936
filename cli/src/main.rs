use anyhow::Context;
use clap::{Parser, Subcommand};
use rabbit_core::{HttpClient, QueueOptions, Server, DEFAULT_VHOST};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rabbitadmin")]
#[command(about = "Query a RabbitMQ broker through its HTTP management API")]
struct Cli {
    /// Management API address as host:port
    #[arg(long, env = "RABBITMQ_HOST", default_value = "localhost:15672")]
    host: String,

    #[arg(short, long, env = "RABBITMQ_USER", default_value = "guest")]
    user: String,

    #[arg(short, long, env = "RABBITMQ_PASSWORD", default_value = "guest", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Broker-wide overview
    Overview,
    /// Run the aliveness test for a vhost
    Alive {
        #[arg(long, default_value = DEFAULT_VHOST)]
        vhost: String,
    },
    Vhosts,
    Queues {
        #[arg(long)]
        vhost: Option<String>,
    },
    Exchanges {
        #[arg(long)]
        vhost: Option<String>,
    },
    Bindings {
        #[arg(long)]
        vhost: Option<String>,
    },
    Users,
    Connections,
    Permissions,
    /// Declare a queue (idempotent)
    DeclareQueue {
        name: String,
        #[arg(long, default_value = DEFAULT_VHOST)]
        vhost: String,
        /// Declare as transient instead of durable
        #[arg(long)]
        transient: bool,
        #[arg(long)]
        auto_delete: bool,
    },
    DeleteQueue {
        name: String,
        #[arg(long, default_value = DEFAULT_VHOST)]
        vhost: String,
    },
    /// Drop every ready message in a queue
    PurgeQueue {
        name: String,
        #[arg(long, default_value = DEFAULT_VHOST)]
        vhost: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(host = %cli.host, user = %cli.user, command = ?cli.command, "starting");

    let output = run(&cli).with_context(|| format!("request to {} failed", cli.host))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(cli: &Cli) -> rabbit_core::Result<Value> {
    let client = HttpClient::new(&cli.host, &cli.user, &cli.password);

    let value = match &cli.command {
        Command::Overview => {
            let server = Server::from_client(client)?;
            to_value(&server.overview)?
        }
        Command::Alive { vhost } => {
            let alive = client.is_alive(vhost)?;
            serde_json::json!({ "vhost": vhost, "alive": alive })
        }
        Command::Vhosts => to_value(&client.get_all_vhosts()?)?,
        Command::Queues { vhost } => to_value(&client.get_queues(vhost.as_deref())?)?,
        Command::Exchanges { vhost } => to_value(&client.get_exchanges(vhost.as_deref())?)?,
        Command::Bindings { vhost } => to_value(&client.get_bindings(vhost.as_deref())?)?,
        Command::Users => to_value(&client.get_users()?)?,
        Command::Connections => to_value(&client.get_connections()?)?,
        Command::Permissions => to_value(&client.get_permissions()?)?,
        Command::DeclareQueue {
            name,
            vhost,
            transient,
            auto_delete,
        } => {
            let options = QueueOptions {
                durable: !transient,
                auto_delete: *auto_delete,
                ..QueueOptions::default()
            };
            client.create_queue(vhost, name, &options)?;
            to_value(&client.get_queue(vhost, name)?)?
        }
        Command::DeleteQueue { name, vhost } => {
            client.delete_queue(vhost, name)?;
            serde_json::json!({ "deleted": name, "vhost": vhost })
        }
        Command::PurgeQueue { name, vhost } => {
            client.purge_queue(vhost, name)?;
            serde_json::json!({ "purged": name, "vhost": vhost })
        }
    };
    Ok(value)
}

fn to_value<T: serde::Serialize>(value: &T) -> rabbit_core::Result<Value> {
    serde_json::to_value(value).map_err(|e| rabbit_core::Error::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_guest() {
        let cli = Cli::try_parse_from(["rabbitadmin", "vhosts"]).unwrap();
        assert_eq!(cli.user, "guest");
        assert_eq!(cli.command, Command::Vhosts);
    }

    #[test]
    fn alive_defaults_to_root_vhost() {
        let cli = Cli::try_parse_from(["rabbitadmin", "alive"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Alive {
                vhost: "/".to_string()
            }
        );
    }

    #[test]
    fn queues_accept_vhost() {
        let cli = Cli::try_parse_from(["rabbitadmin", "--host", "broker:15672", "queues", "--vhost", "work"]).unwrap();
        assert_eq!(cli.host, "broker:15672");
        assert_eq!(
            cli.command,
            Command::Queues {
                vhost: Some("work".to_string())
            }
        );
    }

    #[test]
    fn declare_queue_flags() {
        let cli = Cli::try_parse_from(["rabbitadmin", "declare-queue", "jobs", "--transient"]).unwrap();
        assert_eq!(
            cli.command,
            Command::DeclareQueue {
                name: "jobs".to_string(),
                vhost: "/".to_string(),
                transient: true,
                auto_delete: false,
            }
        );
    }

    #[test]
    fn purge_requires_name() {
        assert!(Cli::try_parse_from(["rabbitadmin", "purge-queue"]).is_err());
    }
}
