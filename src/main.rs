use std::net::SocketAddr;
use std::process;

use clap::{Parser, Subcommand};
use comfy_table::{modifiers, presets, ContentArrangement, Table};
use terminal_size::{terminal_size, Width};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use panelup::api::compute::{self, InstanceLookup};
use panelup::config::{self, Config, DEFAULT_HOST, DEFAULT_PORT};
use panelup::error::ConfigError;
use panelup::models::AppState;
use panelup::provision::{PanelStack, StackParams};
use panelup::routes;
use panelup::services::toggle_server;

fn build_state_from_env(env_file: Option<&str>) -> Result<AppState, ConfigError> {
    config::load_env_file(env_file);
    let cfg = Config::from_env()?;
    Ok(AppState::new(cfg))
}

fn state_or_exit(env_file: Option<&str>) -> AppState {
    match build_state_from_env(env_file) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(%e, "Invalid configuration");
            eprintln!("{}: {}", yansi::Paint::new("Invalid configuration").red(), e);
            process::exit(1);
        }
    }
}

async fn start_server(state: AppState, host: &str, port: u16) {
    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(%e, "Invalid host/port format");
            eprintln!("{}: {}", yansi::Paint::new("Invalid host/port format").red(), e);
            process::exit(1);
        }
    };
    let app = routes::build_router(state);
    tracing::info!(%addr, "Starting panelup trigger endpoint");
    println!(
        "{} {}",
        yansi::Paint::new("Toggle endpoint listening on").green(),
        yansi::Paint::new(format!("http://{}", addr)).cyan()
    );
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            // Run the server and log any errors (do not panic with unwrap()).
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(%e, "Server encountered an error while running");
                eprintln!("{}: {}", yansi::Paint::new("Server error").red(), e);
                process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!(%e, "Failed to bind to address; is the port already in use?");
            eprintln!(
                "{}: {}\n{}",
                yansi::Paint::new(format!("Failed to bind to {}", addr)).red(),
                e,
                yansi::Paint::new(
                    "Please stop any process using this port, or start the server with a different --port value."
                )
                .yellow()
            );
            process::exit(1);
        }
    }
}

fn print_manifest_table(stack: &PanelStack) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some((Width(w), _)) = terminal_size() {
        table.set_width(w - 4);
    }
    table.set_header(vec!["Resource", "Type", "Depends on"]);
    for row in stack.summary() {
        table.add_row(vec![
            row.name.clone(),
            row.resource_type.clone(),
            row.depends_on.join(", "),
        ]);
    }
    println!("\n{table}\n");
}

#[derive(Parser)]
#[command(
    name = "panelup",
    author,
    version,
    about = "PufferPanel-on-GCP provisioning declaration and server toggler",
    long_about = r#"panelup — run a PufferPanel game-server panel on a preemptible GCP instance.

Two jobs: print the declarative provisioning manifest the infrastructure
engine applies (bucket, source archive, disk, toggle function, public
invoker binding), and serve/run the toggle itself — delete the named
instance when it exists, create it when it does not, and on creation point
the configured DNS name at its public address.

Examples:
  1) Run the HTTP trigger endpoint (dev):
      cargo run -- serve --host 127.0.0.1 --port 8080
  2) Toggle once from the terminal:
      panelup toggle --env-file .env
  3) Inspect the provisioning declaration:
      panelup manifest --dns-name panel.example.com. --dns-zone example-zone --zone us-central1-a
"#,
    after_help = "Use `panelup <subcommand> --help` to get subcommand specific options and usage examples."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Disable colorized output
    #[arg(long, global = true)]
    no_color: bool,
    /// Disable request/response logging
    #[arg(long, global = true)]
    silent: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger endpoint
    Serve {
        /// Host to bind to
        #[arg(long, default_value_t = String::from(DEFAULT_HOST))]
        host: String,
        /// Port to bind to
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Path to .env file
        #[arg(long)]
        env_file: Option<String>,
    },
    /// Toggle the panel server once and print the result
    #[command(
        about = "Toggle the panel server once",
        long_about = "Perform one toggle invocation from the terminal: delete the instance if it exists, create it (and publish its DNS record) if it does not. Uses the same configuration as the served endpoint."
    )]
    Toggle {
        /// Path to .env file
        #[arg(long)]
        env_file: Option<String>,
    },
    /// Validate configuration (env vars / provider access)
    #[command(
        about = "Validate configuration and probe provider access.",
        long_about = "Validate the required environment variables, reporting every missing one at once, then probe the compute API by looking up the configured instance."
    )]
    CheckConfig {
        /// Path to .env file
        #[arg(long)]
        env_file: Option<String>,
    },
    /// Print the provisioning declaration
    #[command(
        about = "Print the provisioning declaration",
        long_about = "Compose the five-resource stack (bucket, source object, disk, toggle function, invoker binding) and print it as a summary table, or as the full desired-state manifest with --json."
    )]
    Manifest {
        /// Prefix for resource names
        #[arg(long, default_value = "pufferpanel")]
        name: String,
        /// Domain name the panel binds to (Cloud DNS FQDN form)
        #[arg(long)]
        dns_name: String,
        /// Managed zone the domain falls into
        #[arg(long)]
        dns_zone: String,
        /// Compute zone for the disk and server
        #[arg(long)]
        zone: String,
        /// Disk size for the server's boot disk
        #[arg(long, default_value_t = panelup::provision::stack::DEFAULT_DISK_SIZE_GB)]
        disk_size_gb: u32,
        /// Disk type for the server's boot disk
        #[arg(long, default_value = panelup::provision::stack::DEFAULT_DISK_TYPE)]
        disk_type: String,
        /// Machine type for the server
        #[arg(long, default_value = panelup::provision::stack::DEFAULT_MACHINE_TYPE)]
        machine_type: String,
        /// Name for the server instance
        #[arg(long, default_value = panelup::provision::stack::DEFAULT_SERVER_NAME)]
        server_name: String,
        /// Print the full manifest as JSON instead of a summary table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        yansi::whenever(yansi::Condition::NEVER);
    }

    if cli.silent {
        panelup::api::set_silent(true);
    }

    match cli.command {
        Commands::Serve {
            host,
            port,
            env_file,
        } => {
            let state = state_or_exit(env_file.as_deref());
            start_server(state, &host, port).await;
        }
        Commands::Toggle { env_file } => {
            let state = state_or_exit(env_file.as_deref());
            match toggle_server(&state).await {
                Ok(outcome) => {
                    println!("{}", yansi::Paint::new(outcome.message).green());
                }
                Err(e) => {
                    eprintln!("{}: {}", yansi::Paint::new("Toggle failed").red(), e);
                    process::exit(1);
                }
            }
        }
        Commands::CheckConfig { env_file } => {
            let state = state_or_exit(env_file.as_deref());
            let cfg = &state.config;
            match compute::get_instance(&state.gcp, &cfg.project, &cfg.zone, &cfg.server_name)
                .await
            {
                Ok(InstanceLookup::Found(instance)) => {
                    println!(
                        "{} {} {}",
                        yansi::Paint::new("Configuration looks valid; instance").green(),
                        instance.name,
                        yansi::Paint::new(format!(
                            "is {}",
                            instance.status.as_deref().unwrap_or("in an unknown state")
                        ))
                        .green()
                    );
                }
                Ok(InstanceLookup::NotFound) => {
                    println!(
                        "{}",
                        yansi::Paint::new(
                            "Configuration looks valid; instance does not currently exist"
                        )
                        .green()
                    );
                }
                Err(e) => {
                    eprintln!(
                        "{}: {}",
                        yansi::Paint::new("Configuration appears invalid").red(),
                        e
                    );
                    process::exit(1);
                }
            }
        }
        Commands::Manifest {
            name,
            dns_name,
            dns_zone,
            zone,
            disk_size_gb,
            disk_type,
            machine_type,
            server_name,
            json,
        } => {
            let mut params = StackParams::new(&name, &dns_name, &dns_zone, &zone);
            params.disk_size_gb = disk_size_gb;
            params.disk_type = disk_type;
            params.machine_type = machine_type;
            params.server_name = server_name;
            let stack = PanelStack::new(&params);

            if json {
                let manifest = stack.manifest();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&manifest)
                        .unwrap_or_else(|_| "<unrenderable manifest>".into())
                );
            } else {
                print_manifest_table(&stack);
            }
        }
    }
}
