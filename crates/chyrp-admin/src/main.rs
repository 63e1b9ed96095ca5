use anyhow::Context;
use chyrp_settings::{ClientConfig, Field, SettingType, SettingsConsole, SettingValue};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chyrp-admin")]
#[command(about = "Inspect and change Chyrp Lite Reimagine site settings")]
struct Cli {
    /// API root, e.g. https://blog.example.com/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the settings API
    #[arg(long, global = true)]
    token: Option<String>,

    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the site fields and store status
    Show,
    /// Print one setting
    Get {
        key: String,
        #[arg(long)]
        default: Option<String>,
    },
    /// Change one setting
    Set {
        key: String,
        value: String,
        /// string, boolean, number or json; inferred when omitted
        #[arg(long = "type")]
        kind: Option<SettingType>,
    },
    /// Change several settings from a JSON object
    SetMany { object: String },
    /// Print one group as the server returns it
    Group { name: String },
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = ClientConfig::from_file(path)?;
                config.apply_env();
                config
            }
            None => ClientConfig::load()?,
        };
        if let Some(url) = &self.api_url {
            config.base_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.api_token = Some(token.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

/// Interpret a command-line value: JSON literals keep their type, anything
/// else is a plain string.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn print_value(key: &str, value: &SettingValue) {
    println!("{} = {} ({})", key, value, value.setting_type());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config = cli.client_config()?;
    info!("Using settings API at {}", config.base_url);
    let console = SettingsConsole::connect(config).await?;
    let store = console.store();

    match cli.command {
        Command::Show => {
            if let Some(err) = store.last_error() {
                anyhow::bail!("could not load settings: {}", err);
            }
            println!("status: {:?} (version {})", store.status(), store.version());
            let fields = store.fields();
            for field in Field::ALL {
                print_value(field.name(), &fields.get(field));
            }
        }
        Command::Get { key, default } => {
            if let Some(err) = store.last_error() {
                anyhow::bail!("could not load settings: {}", err);
            }
            let fallback = default.as_deref().map(parse_value).unwrap_or_default();
            let fallback = SettingValue::infer(fallback)?;
            print_value(&key, &store.get_setting(&key, fallback));
        }
        Command::Set { key, value, kind } => {
            let outcome = console
                .writer()
                .update_by_key_value(&key, parse_value(&value), kind)
                .await
                .with_context(|| format!("failed to update {}", key))?;
            for (key, value) in &outcome.persisted {
                print_value(key, value);
            }
            if !outcome.is_refreshed() {
                eprintln!("warning: setting saved but the local copy could not be reloaded");
            }
        }
        Command::SetMany { object } => {
            let object: serde_json::Value =
                serde_json::from_str(&object).context("set-many expects a JSON object")?;
            let outcome = console
                .writer()
                .update_from_object(object)
                .await
                .context("failed to update settings")?;
            for (key, value) in &outcome.persisted {
                print_value(key, value);
            }
        }
        Command::Group { name } => {
            let settings = console.transport().fetch_by_group(&name).await?;
            for (key, value) in &settings {
                print_value(key, value);
            }
        }
    }

    console.dispose();
    Ok(())
}
