//! API configuration.

/// Default upload limit: 50 MB.
pub const DEFAULT_MAX_VIDEO_SIZE: usize = 50 * 1024 * 1024;

/// Default still-image limit: 10 MB.
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max uploaded video size, in bytes
    pub max_video_size: usize,
    /// Max uploaded image size, in bytes
    pub max_image_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Serve Prometheus metrics at `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_video_size: DEFAULT_MAX_VIDEO_SIZE,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            max_video_size: std::env::var("MAX_VIDEO_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_VIDEO_SIZE),
            max_image_size: std::env::var("MAX_IMAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_IMAGE_SIZE),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
