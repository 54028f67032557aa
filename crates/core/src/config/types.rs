use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::store::Channel;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub ticket_source: TicketSourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub apple: Option<AppleWalletConfig>,
    #[serde(default)]
    pub google: Option<GoogleWalletConfig>,
    #[serde(default)]
    pub mailer: Option<MailerConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits for the database lock before giving up.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tailorpass.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Ticket Tailor API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketSourceConfig {
    /// API base URL (e.g., "https://api.tickettailor.com/v1")
    pub base_url: String,
    /// API key, sent as the basic-auth username
    pub api_key: String,
    /// Event whose issued tickets are synchronized
    pub event_id: String,
    /// Ticket status filter passed to the API (default: "valid")
    #[serde(default = "default_ticket_status")]
    pub status: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_ticket_status() -> String {
    "valid".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for generated artifacts.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Optional object storage bucket that artifacts are uploaded to.
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            object_store: None,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("tickets")
}

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    /// Key prefix, e.g. "ham-2026"
    #[serde(default)]
    pub prefix: String,
    /// Lifetime of presigned read URLs (default: 7 days)
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_secs: u64,
    #[serde(default)]
    pub region: Option<String>,
}

fn default_presign_ttl() -> u64 {
    7 * 24 * 60 * 60
}

/// Sync scheduling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Run scheduled syncs. Manual runs through the API work either way.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scheduled runs.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Deadline for a single run in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Channels a pass is produced for.
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval(),
            run_timeout_secs: default_run_timeout(),
            channels: default_channels(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_run_timeout() -> u64 {
    600
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::AppleWallet]
}

/// How the signed pass is laid out before signing.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateMode {
    /// Pass built in code with a generated icon and QR thumbnail.
    #[default]
    Minimal,
    /// Designer bundle on disk; the attendee field is located and overwritten.
    Bundle,
}

/// Apple Wallet pass configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppleWalletConfig {
    pub pass_type_identifier: String,
    pub team_identifier: String,
    #[serde(default = "default_organization")]
    pub organization_name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_organization")]
    pub logo_text: String,
    /// PKCS#12 bundle with the pass signing certificate and key.
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,
    #[serde(default)]
    pub certificate_password: String,
    /// Apple WWDR intermediate certificate (DER or PEM).
    #[serde(default)]
    pub root_certificate_path: Option<PathBuf>,
    /// Base64 PKCS#12 content, used when `certificate_path` is unset.
    #[serde(default)]
    pub certificate_base64: Option<String>,
    /// Base64 root certificate content, used when `root_certificate_path` is unset.
    #[serde(default)]
    pub root_certificate_base64: Option<String>,
    /// Directory the base64 material is decoded into.
    #[serde(default = "default_cert_runtime_dir")]
    pub certificate_runtime_dir: PathBuf,
    #[serde(default = "default_qr_size")]
    pub qr_size: u32,
    #[serde(default)]
    pub template: TemplateMode,
    /// Bundle directory (required when template = "bundle").
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    /// Key of the attendee field in the bundle; fuzzy matching is used when unset.
    #[serde(default)]
    pub attendee_field_key: Option<String>,
}

fn default_organization() -> String {
    "Hakuna Wallet".to_string()
}

fn default_description() -> String {
    "Hakuna Wallet Ticket".to_string()
}

fn default_cert_runtime_dir() -> PathBuf {
    std::env::temp_dir().join("tailorpass-certs")
}

fn default_qr_size() -> u32 {
    200
}

/// Google Wallet object configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleWalletConfig {
    pub issuer_email: String,
    pub class_id: String,
    #[serde(default)]
    pub bin_range: String,
}

/// SMTP configuration for mailing passes to purchasers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailerConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_subject() -> String {
    "Your event ticket".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ticket_source: SanitizedTicketSourceConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple: Option<SanitizedAppleConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleWalletConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailer: Option<SanitizedMailerConfig>,
}

/// Ticket source config with the API key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTicketSourceConfig {
    pub base_url: String,
    pub event_id: String,
    pub status: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

/// Apple config with certificate secrets hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAppleConfig {
    pub pass_type_identifier: String,
    pub team_identifier: String,
    pub organization_name: String,
    pub template: TemplateMode,
    pub qr_size: u32,
    pub certificate_configured: bool,
    pub root_certificate_configured: bool,
    pub certificate_password_configured: bool,
}

/// Mailer config with the SMTP password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMailerConfig {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub password_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            ticket_source: SanitizedTicketSourceConfig {
                base_url: config.ticket_source.base_url.clone(),
                event_id: config.ticket_source.event_id.clone(),
                status: config.ticket_source.status.clone(),
                api_key_configured: !config.ticket_source.api_key.is_empty(),
                timeout_secs: config.ticket_source.timeout_secs,
            },
            storage: config.storage.clone(),
            sync: config.sync.clone(),
            apple: config.apple.as_ref().map(|a| SanitizedAppleConfig {
                pass_type_identifier: a.pass_type_identifier.clone(),
                team_identifier: a.team_identifier.clone(),
                organization_name: a.organization_name.clone(),
                template: a.template,
                qr_size: a.qr_size,
                certificate_configured: a.certificate_path.is_some()
                    || a.certificate_base64.is_some(),
                root_certificate_configured: a.root_certificate_path.is_some()
                    || a.root_certificate_base64.is_some(),
                certificate_password_configured: !a.certificate_password.is_empty(),
            }),
            google: config.google.clone(),
            mailer: config.mailer.as_ref().map(|m| SanitizedMailerConfig {
                host: m.host.clone(),
                port: m.port,
                from: m.from.clone(),
                password_configured: !m.password.is_empty(),
            }),
        }
    }
}
