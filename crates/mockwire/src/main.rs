use anyhow::Context;
use clap::Parser;
use mockwire::config::TlsSettings;
use mockwire::{MockServer, ProxyAndRecordSettings, ServerSettings};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mockwire standalone stub server
#[derive(Parser, Debug)]
#[command(name = "mockwire")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (ignored when --urls is given)
    #[arg(short, long, env = "MOCKWIRE_PORT")]
    port: Option<u16>,

    /// Listen urls, e.g. http://0.0.0.0:9091 (repeatable)
    #[arg(long, env = "MOCKWIRE_URLS", value_delimiter = ',')]
    urls: Vec<String>,

    /// Settings file (YAML or JSON); flags override its values
    #[arg(short, long, env = "MOCKWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Serve https on --port
    #[arg(long)]
    ssl: bool,

    /// PEM certificate for https endpoints
    #[arg(long, env = "MOCKWIRE_CERT_PATH", requires = "key_path")]
    cert_path: Option<String>,

    /// PEM private key for https endpoints
    #[arg(long, env = "MOCKWIRE_KEY_PATH", requires = "cert_path")]
    key_path: Option<String>,

    #[arg(long, env = "MOCKWIRE_ADMIN_USERNAME", requires = "admin_password")]
    admin_username: Option<String>,

    #[arg(long, env = "MOCKWIRE_ADMIN_PASSWORD", requires = "admin_username")]
    admin_password: Option<String>,

    /// Do not serve the /__admin API
    #[arg(long)]
    no_admin: bool,

    /// Load mappings from the mappings directory at start
    #[arg(long)]
    read_static_mappings: bool,

    #[arg(long, env = "MOCKWIRE_MAPPINGS_DIR")]
    mappings_dir: Option<PathBuf>,

    /// Forward unmatched requests to this upstream
    #[arg(long, env = "MOCKWIRE_PROXY_URL")]
    proxy_url: Option<String>,

    /// Register a mapping for every proxied exchange
    #[arg(long, requires = "proxy_url")]
    save_mapping: bool,

    /// Write recorded mappings to the mappings directory
    #[arg(long, requires = "proxy_url")]
    save_mapping_to_file: bool,

    /// Only record upstream statuses matching this pattern (e.g. 2xx, 200-299)
    #[arg(long, requires = "proxy_url")]
    save_mapping_for_status_code_pattern: Option<String>,

    /// Rank partially matching mappings when nothing matches fully
    #[arg(long)]
    allow_partial_mapping: bool,

    #[arg(long, env = "MOCKWIRE_MAX_REQUEST_LOG_COUNT")]
    max_request_log_count: Option<usize>,

    /// Seed for fault injection and weighted selection
    #[arg(long, env = "MOCKWIRE_FAULT_SEED")]
    fault_seed: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Settings from --config (or defaults for the binary) with flags applied on top.
    fn into_settings(self) -> anyhow::Result<ServerSettings> {
        let mut settings = match &self.config {
            Some(path) => ServerSettings::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => ServerSettings {
                host: "0.0.0.0".to_string(),
                ..Default::default()
            },
        };

        if !self.urls.is_empty() {
            settings.urls = self.urls;
        }
        if let Some(port) = self.port {
            settings.port = Some(port);
        }
        if self.ssl {
            settings.use_ssl = true;
        }
        if let (Some(cert_path), Some(key_path)) = (self.cert_path, self.key_path) {
            settings.tls = Some(TlsSettings {
                cert_path,
                key_path,
            });
        }
        if self.admin_username.is_some() {
            settings.admin_username = self.admin_username;
            settings.admin_password = self.admin_password;
        }
        if self.no_admin {
            settings.start_admin_interface = false;
        }
        if self.read_static_mappings {
            settings.read_static_mappings = true;
        }
        if let Some(dir) = self.mappings_dir {
            settings.mappings_directory = dir;
        }
        if self.allow_partial_mapping {
            settings.allow_partial_mapping = true;
        }
        if let Some(max) = self.max_request_log_count {
            settings.max_request_log_count = Some(max);
        }
        if let Some(seed) = self.fault_seed {
            settings.fault_injection.seed = Some(seed);
        }

        if let Some(url) = self.proxy_url {
            let mut proxy = settings
                .proxy_and_record
                .take()
                .unwrap_or_else(|| ProxyAndRecordSettings::new(url.clone()));
            proxy.url = url;
            proxy.save_mapping |= self.save_mapping;
            proxy.save_mapping_to_file |= self.save_mapping_to_file;
            if let Some(pattern) = self.save_mapping_for_status_code_pattern {
                proxy.save_mapping_for_status_code_pattern = pattern;
            }
            settings.proxy_and_record = Some(proxy);
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid --log-level filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = args.into_settings()?;
    let server = MockServer::start(settings).await?;
    info!("Mockwire ready at {}", server.urls().join(", "));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    server.stop().await;
    Ok(())
}
