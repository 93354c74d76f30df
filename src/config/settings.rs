use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheConfig,
    pub routes: RouteConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub notifications: NotificationConfig,
    pub network: NetworkConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub prefix: String,
    pub version: String,
    pub tiers: TierLimits,
    pub precache: Vec<String>,
    pub offline_page: String,
    pub app_shell: String,
    pub directory: String,
}

/// Item ceilings per cache tier. `None` means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierLimits {
    pub static_assets: Option<usize>,
    pub dynamic: Option<usize>,
    pub images: Option<usize>,
    pub listings: Option<usize>,
    pub api: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub api_patterns: Vec<String>,
    pub static_patterns: Vec<String>,
    pub font_domains: Vec<String>,
    pub image_patterns: Vec<String>,
    pub image_domains: Vec<String>,
    pub message_send_patterns: Vec<String>,
    pub realtime_patterns: Vec<String>,
    pub listings_path_pattern: String,
    pub messages_path_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub recent_listings_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub message_tag: String,
    pub listings_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub default_title: String,
    pub default_body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub origin: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Events buffered for the worker actor before senders wait.
    pub channel_buffer_size: usize,
    /// Events buffered per subscriber on the client broadcast channel.
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "marketplace".to_string(),
            version: "v1".to_string(),
            tiers: TierLimits::default(),
            precache: vec![
                "/".to_string(),
                "/offline.html".to_string(),
                "/manifest.json".to_string(),
                "/icons/icon-192x192.png".to_string(),
                "/icons/icon-512x512.png".to_string(),
            ],
            offline_page: "/offline.html".to_string(),
            app_shell: "/".to_string(),
            directory: "data/caches".to_string(),
        }
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            static_assets: None,
            dynamic: Some(50),
            images: Some(100),
            listings: Some(50),
            api: Some(30),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            api_patterns: vec![
                r"/rest/v1/".to_string(),
                r"/functions/v1/".to_string(),
                r"/auth/v1/".to_string(),
                r"^https?://[^/]+\.supabase\.co/".to_string(),
            ],
            static_patterns: vec![r"\.(js|mjs|css|woff2?|ttf|otf|eot)(\?.*)?$".to_string()],
            font_domains: vec![
                "fonts.googleapis.com".to_string(),
                "fonts.gstatic.com".to_string(),
            ],
            image_patterns: vec![r"\.(png|jpe?g|gif|webp|avif|svg|ico)(\?.*)?$".to_string()],
            image_domains: vec![
                "images.unsplash.com".to_string(),
                "res.cloudinary.com".to_string(),
            ],
            message_send_patterns: vec![
                r"/rest/v1/messages(\?.*)?$".to_string(),
                r"/functions/v1/send-message".to_string(),
            ],
            realtime_patterns: vec![r"/realtime/v1".to_string(), r"^wss?://".to_string()],
            listings_path_pattern: r"/listings".to_string(),
            messages_path_pattern: r"/messages".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/offline.db".to_string(),
            recent_listings_max: 20,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            message_tag: "sync-messages".to_string(),
            listings_tag: "sync-listings".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_title: "Marketplace".to_string(),
            default_body: "You have a new notification".to_string(),
            icon: "/icons/icon-192x192.png".to_string(),
            badge: "/icons/badge-72x72.png".to_string(),
            vibrate: vec![100, 50, 100],
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 32,
            broadcast_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Name of a cache partition for the current version, e.g. `marketplace-images-v1`.
    pub fn cache_name(&self, tier: CacheTier) -> String {
        format!("{}-{}-{}", self.cache.prefix, tier.as_str(), self.cache.version)
    }

    pub fn tier_limit(&self, tier: CacheTier) -> Option<usize> {
        let tiers = &self.cache.tiers;
        match tier {
            CacheTier::Static => tiers.static_assets,
            CacheTier::Dynamic => tiers.dynamic,
            CacheTier::Images => tiers.images,
            CacheTier::Listings => tiers.listings,
            CacheTier::Api => tiers.api,
        }
    }

    /// All partition names that belong to the current cache version.
    pub fn current_cache_names(&self) -> Vec<String> {
        CacheTier::ALL.iter().map(|tier| self.cache_name(*tier)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    Static,
    Dynamic,
    Images,
    Listings,
    Api,
}

impl CacheTier {
    pub const ALL: [CacheTier; 5] = [
        CacheTier::Static,
        CacheTier::Dynamic,
        CacheTier::Images,
        CacheTier::Listings,
        CacheTier::Api,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Static => "static",
            CacheTier::Dynamic => "dynamic",
            CacheTier::Images => "images",
            CacheTier::Listings => "listings",
            CacheTier::Api => "api",
        }
    }
}
