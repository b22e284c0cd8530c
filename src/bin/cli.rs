use clap::{Parser, Subcommand};
use mcprouter::{
    config::RouterConfig,
    models::{SearchRequest, Server, TransportType},
    services::RouterService,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mcprouter-cli")]
#[command(about = "Query and call tool servers through the router core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every discovered server
    Servers,

    /// List tools, optionally for a single server
    Tools {
        /// Server name
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Ranked search for servers matching a task
    Search {
        /// Free-text task description
        query: String,

        /// Extra keywords
        #[arg(short, long)]
        keyword: Vec<String>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Minimum relevance score
        #[arg(short, long)]
        min_similarity: Option<f64>,
    },

    /// Invoke a tool
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Pin the call to this server
        #[arg(short, long)]
        server: Option<String>,

        /// Check the server's health first and skip the call if unhealthy
        #[arg(long, requires = "server")]
        checked: bool,
    },

    /// Health of one tool, or of all tools
    Health {
        /// Tool name; omit for a batch check
        tool: Option<String>,
    },

    /// Check that a tool is registered
    Verify {
        /// Tool name
        tool: String,
    },

    /// Register a server for this process and list what it exposes
    Register {
        /// Server name
        #[arg(short, long)]
        name: String,

        /// host:port or URL
        #[arg(short, long)]
        endpoint: String,

        /// synchronous | event-stream
        #[arg(short, long, default_value = "synchronous")]
        transport: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    let config = RouterConfig::from_env()?;
    let router = RouterService::from_config(&config);

    match cli.command {
        Commands::Servers => {
            let servers = router.list_servers().await;
            if servers.is_empty() {
                println!("No servers found.");
            } else {
                println!(
                    "{:<30} {:<14} {:<12} {:<6} {:<30}",
                    "Name", "Transport", "Status", "Tools", "Endpoint"
                );
                println!("{}", "-".repeat(96));
                for server in servers {
                    println!(
                        "{:<30} {:<14} {:<12} {:<6} {:<30}",
                        server.name,
                        server.transport_type.as_str(),
                        server.status.as_str(),
                        server.tools.len(),
                        server.endpoint
                    );
                }
            }
        }

        Commands::Tools { server } => match router.list_tools(server.as_deref()).await {
            Ok(tools) => {
                if tools.is_empty() {
                    println!("No tools found.");
                }
                for entry in tools {
                    println!("{:<30} {:<30} {}", entry.server_name, entry.tool.name, entry.tool.description);
                }
            }
            Err(err) => {
                eprintln!("❌ Failed to list tools: {}", err);
                std::process::exit(1);
            }
        },

        Commands::Search {
            query,
            keyword,
            limit,
            min_similarity,
        } => {
            let mut request = SearchRequest::for_task(query)
                .with_keywords(keyword)
                .with_limit(limit);
            request.min_similarity = min_similarity;

            let results = router.search(&request).await;
            for server in &results {
                println!("{:>6.2}  {:<30} {}", server.relevance_score, server.name, server.description);
            }
            println!("{} result(s)", results.len());
        }

        Commands::Call {
            tool,
            args,
            server,
            checked,
        } => {
            let arguments: Value = serde_json::from_str(&args)?;

            if checked {
                let server = server.unwrap_or_default();
                let outcome = router.call_with_health_check(&server, &tool, arguments).await;
                print_json(&outcome)?;
                if !outcome.success {
                    std::process::exit(1);
                }
            } else {
                match router.invoke(server.as_deref(), &tool, arguments).await {
                    Ok(result) => print_json(&result)?,
                    Err(err) => {
                        print_json(&err.to_structured(Some(&tool)))?;
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Health { tool } => match tool {
            Some(tool) => print_json(&router.check_health(&tool).await)?,
            None => print_json(&router.check_all_health().await)?,
        },

        Commands::Verify { tool } => {
            let check = router.verify_registration(&tool).await;
            print_json(&check)?;
            if !check.registered {
                std::process::exit(1);
            }
        }

        Commands::Register {
            name,
            endpoint,
            transport,
            description,
        } => {
            let Some(transport_type) = TransportType::parse(&transport) else {
                eprintln!("❌ Unsupported transport: {}", transport);
                std::process::exit(1);
            };

            let server = Server::new(name, endpoint, transport_type).with_description(description);
            match router.register(server) {
                Ok(stored) => {
                    println!("✅ Server '{}' registered", stored.name);
                    match router.list_tools(Some(&stored.name)).await {
                        Ok(tools) => {
                            for entry in tools {
                                println!("  {} - {}", entry.tool.name, entry.tool.description);
                            }
                        }
                        Err(err) => eprintln!("⚠️  Could not list tools: {}", err),
                    }
                }
                Err(err) => {
                    eprintln!("❌ Failed to register server: {}", err);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_call_requires_server() {
        assert!(Cli::try_parse_from(["mcprouter-cli", "call", "getAllPersons", "--checked"]).is_err());

        let cli = Cli::try_parse_from([
            "mcprouter-cli",
            "call",
            "getAllPersons",
            "--checked",
            "--server",
            "persons",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Call { checked: true, server: Some(ref s), .. } if s == "persons"
        ));
    }
}
