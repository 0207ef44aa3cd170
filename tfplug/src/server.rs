//! Server module for running Terraform providers
//!
//! This module starts the gRPC server, performs the go-plugin handshake on
//! stdout and optionally serves over TLS.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProvider;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::info;

/// Cookie Terraform sets in the plugin's environment
pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// go-plugin core protocol version and Terraform plugin protocol version
const CORE_PROTOCOL_VERSION: u32 = 1;
const PLUGIN_PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Registry address reported in debug mode, e.g. registry.terraform.io/example/example
    pub provider_address: String,
    /// Path to TLS certificate file; TLS is used when both paths are set
    pub cert_path: Option<PathBuf>,
    /// Path to TLS key file
    pub key_path: Option<PathBuf>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Run standalone and print TF_REATTACH_PROVIDERS instead of the handshake
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            provider_address: String::new(),
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20, // 256MB
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn new(provider_address: &str) -> Self {
        Self {
            provider_address: provider_address.to_string(),
            ..Self::default()
        }
    }

    /// Reads `--debug` from the process arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.debug = args.into_iter().any(|a| a.as_ref() == "--debug");
        self
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = Some(path);
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = Some(path);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// The line go-plugin reads from stdout to find the server
pub fn handshake_line(addr: &SocketAddr) -> String {
    format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PLUGIN_PROTOCOL_VERSION, addr
    )
}

/// Value for TF_REATTACH_PROVIDERS when running with `--debug`
pub fn reattach_config(provider_address: &str, addr: &SocketAddr) -> serde_json::Value {
    let mut providers = serde_json::Map::new();
    providers.insert(
        provider_address.to_string(),
        serde_json::json!({
            "Protocol": "grpc",
            "ProtocolVersion": PLUGIN_PROTOCOL_VERSION,
            "Pid": std::process::id(),
            "Test": true,
            "Addr": {
                "Network": "tcp",
                "String": addr.to_string(),
            }
        }),
    );
    serde_json::Value::Object(providers)
}

fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::Handshake(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will load \
             any plugins automatically"
                .to_string(),
        )),
    }
}

async fn tls_config(config: &ServerConfig) -> Result<Option<ServerTlsConfig>> {
    let (Some(cert_path), Some(key_path)) = (&config.cert_path, &config.key_path) else {
        return Ok(None);
    };

    // Ignore the error: a provider may already be installed for this process
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cert = tokio::fs::read(cert_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
    let key = tokio::fs::read(key_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;

    Ok(Some(
        ServerTlsConfig::new().identity(Identity::from_pem(cert, key)),
    ))
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if !config.debug {
        check_magic_cookie()?;
    }

    let provider_service = ProviderServer::new(GrpcProvider::new(provider))
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let mut builder = Server::builder();
    if let Some(tls) = tls_config(&config).await? {
        builder = builder.tls_config(tls)?;
    }

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let mut stdout = std::io::stdout();
    if config.debug {
        let reattach = reattach_config(&config.provider_address, &addr);
        writeln!(
            stdout,
            "Provider started. To attach Terraform CLI, set the TF_REATTACH_PROVIDERS \
             environment variable with the following:\n\n\tTF_REATTACH_PROVIDERS='{}'\n",
            reattach
        )?;
    } else {
        writeln!(stdout, "{}", handshake_line(&addr))?;
    }
    stdout.flush()?;

    info!(%addr, debug = config.debug, "provider server listening");

    builder
        .add_service(provider_service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("provider server stopped");
    Ok(())
}
