/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Deployment environment ("production" or "local").
    pub environment: String,
    /// Directory where generated workbooks are written.
    pub reports_dir: String,
    /// Base URL of the NASA POWER daily-point API.
    pub power_base_url: String,
    /// Hours a generated workbook is retained before the sweeper deletes it.
    pub retention_hours: u64,
}

/// Default NASA POWER daily temporal point endpoint.
const DEFAULT_POWER_BASE_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string()),
            reports_dir: std::env::var("REPORTS_DIR").unwrap_or_else(|_| "./reports".to_string()),
            power_base_url: std::env::var("POWER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_POWER_BASE_URL.to_string()),
            retention_hours: std::env::var("REPORT_RETENTION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("REPORT_RETENTION_HOURS must be a valid u64"),
        }
    }

    /// Allowed CORS origins for the frontend, chosen by deployment environment.
    ///
    /// Local development includes the literal "null" origin so a frontend
    /// opened from a file:// URL can reach the API.
    pub fn allowed_origins(&self) -> Vec<String> {
        if self.environment == "production" {
            vec!["https://solar-sergioapp.netlify.app".to_string()]
        } else {
            vec!["http://localhost:3000".to_string(), "null".to_string()]
        }
    }
}
