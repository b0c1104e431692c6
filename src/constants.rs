/// Environment variable that overrides the logging level set via `-v`/`-q`.
pub(crate) const LOG_ENV_VAR: &str = "LAGTRACE_LOG";

// ----------------------------------------------------------------------------------- Sampling
pub(crate) const DEFAULT_SAMPLING_INTERVAL_SECS: &str = "30";
pub(crate) const DEFAULT_RETENTION_SECS: &str = "3600";
pub(crate) const DEFAULT_HISTORY: &str = "240";
pub(crate) const DEFAULT_IDLE_TIMEOUT_SECS: &str = "3600";
pub(crate) const DEFAULT_PARTITION_COUNT_TTL_SECS: &str = "30";

// --------------------------------------------------------------------------- Sampling instants
pub(crate) const DEFAULT_INSTANTS: &str = "10";
pub(crate) const DEFAULT_INSTANTS_STEP_SECS: &str = "60";
pub(crate) const DEFAULT_INSTANTS_LEAD_SECS: &str = "2";

// ------------------------------------------------------------------------------------- Service
pub(crate) const DEFAULT_REPORT_INTERVAL_SECS: &str = "60";
pub(crate) const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_HTTP_PORT: &str = "6564";
