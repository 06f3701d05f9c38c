// src/presensi_client.rs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use url::Url;

// --- Constants ---

pub const DEFAULT_SESSION_FILE: &str = "presensi_session.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
// Re-authenticate slightly before the token actually dies.
pub const SESSION_EXPIRY_BUFFER_SECS: u64 = 60;
// Assumed lifetime when the API hands out a token without an exp claim.
const FALLBACK_SESSION_TTL_SECS: u64 = 8 * 60 * 60;

const NO_BODY: Option<&()> = None;

// --- Error Handling ---

#[derive(Error, Debug)]
pub enum PresensiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing failed: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("I/O error ({context}): {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("Session rejected by the API (Status 401)")]
    Unauthorized,

    #[error("Operation not permitted for this role (Status 403)")]
    Forbidden,

    #[error("e-presensi API error: Status={status}, Message='{message}'")]
    ApiError { status: StatusCode, message: String },

    #[error("System time error: {0}")]
    TimeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// Helper to create context-aware IO errors
fn io_context<E: Into<std::io::Error>, S: Into<String>>(source: E, context: S) -> PresensiError {
    PresensiError::Io {
        source: source.into(),
        context: context.into(),
    }
}

fn now_unix_secs() -> Result<u64, PresensiError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| PresensiError::TimeError(format!("Failed to get system time: {}", e)))?
        .as_secs())
}

// --- Configuration ---

fn default_session_file() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Client configuration, read from `PRESENSI_*` environment variables
/// (`PRESENSI_BASE_URL`, `PRESENSI_USERNAME`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct PresensiConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PresensiConfig {
    pub fn from_env() -> Result<Self, PresensiError> {
        envy::prefixed("PRESENSI_")
            .from_env::<PresensiConfig>()
            .map_err(|e| PresensiError::ConfigError(e.to_string()))
    }
}

// --- Roles ---

/// Access level declared by the login response. Admin-scoped commands
/// check this before hitting the API so a plain user gets a clear error
/// instead of a 403 round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "super_admin", alias = "Super Admin", alias = "superadmin")]
    SuperAdmin,
    #[serde(rename = "admin", alias = "Admin")]
    Admin,
    #[serde(rename = "user", alias = "User", alias = "pegawai")]
    User,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::SuperAdmin => write!(f, "super_admin"),
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

// --- API Wire Types ---

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// One day's attendance for one person, exactly as the API serializes it.
/// Timestamps arrive either as ISO date-times or bare `HH:MM[:SS]`
/// strings; nothing here is parsed until evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordDto {
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub morning_check_in: Option<String>,
    #[serde(default)]
    pub midday_check_in: Option<String>,
    #[serde(default)]
    pub evening_check_in: Option<String>,
    #[serde(default)]
    pub leave_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecordDto>,
}

#[derive(Debug, Serialize)]
struct CheckInRequest<'a> {
    slot: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInResponse {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    /// Personal leave ("izin").
    Izin,
    /// Sick leave ("sakit").
    Sakit,
    /// Annual leave ("cuti").
    Cuti,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequestPayload {
    pub kind: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaveRequestResponse {
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementListResponse {
    pub data: Vec<Announcement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectInfo {
    pub id: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectListResponse {
    pub data: Vec<SubjectInfo>,
}

// Error envelope the API uses for non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
struct ApiErrorPayload {
    message: Option<String>,
}

// --- Session Persistence ---

/// Bearer session persisted to disk so repeated CLI invocations do not
/// re-login every time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub subject_id: String,
    pub subject_name: Option<String>,
    pub role: Role,
    pub expires_at_unix_secs: u64,
}

impl StoredSession {
    pub fn is_expired(&self, buffer_secs: u64) -> Result<bool, PresensiError> {
        let now_unix = now_unix_secs()?;
        Ok(now_unix >= self.expires_at_unix_secs.saturating_sub(buffer_secs))
    }
}

/// Reads the `exp` claim out of a JWT without verifying the signature;
/// the client only needs it to know when to re-login.
fn jwt_expiry_unix(token: &str) -> Option<u64> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    claims.get("exp")?.as_u64()
}

// --- Client ---

#[derive(Clone)]
pub struct PresensiClient {
    config: Arc<PresensiConfig>,
    http_client: Client,
    session: Arc<Mutex<Option<StoredSession>>>,
}

impl PresensiClient {
    pub fn new(config: PresensiConfig) -> Result<Self, PresensiError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // Reuse a previously persisted session if one exists.
        let initial_session = Self::load_session(&config.session_file)?;
        if initial_session.is_some() {
            debug!("Loaded stored session from {:?}", config.session_file);
        }

        Ok(Self {
            config: Arc::new(config),
            http_client,
            session: Arc::new(Mutex::new(initial_session)),
        })
    }

    pub fn load_session(path: &Path) -> Result<Option<StoredSession>, PresensiError> {
        if !path.exists() {
            return Ok(None);
        }

        let json_string = fs::read_to_string(path)
            .map_err(|e| io_context(e, format!("Failed to read session file: {:?}", path)))?;
        let stored: StoredSession = serde_json::from_str(&json_string)?;

        Ok(Some(stored))
    }

    fn save_session(&self, session: &StoredSession) -> Result<(), PresensiError> {
        let json_string = serde_json::to_string_pretty(session)?;

        if let Some(parent) = self.config.session_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    io_context(
                        e,
                        format!("Failed to create directory for session file: {:?}", parent),
                    )
                })?;
            }
        }

        let mut file = File::create(&self.config.session_file).map_err(|e| {
            io_context(
                e,
                format!(
                    "Failed to create session file: {:?}",
                    self.config.session_file
                ),
            )
        })?;
        file.write_all(json_string.as_bytes()).map_err(|e| {
            io_context(
                e,
                format!(
                    "Failed to write session file: {:?}",
                    self.config.session_file
                ),
            )
        })?;

        Ok(())
    }

    /// Authenticates with the configured credentials and persists the
    /// resulting session.
    pub async fn login(&self) -> Result<StoredSession, PresensiError> {
        info!(
            "Authenticating against {} as '{}'",
            self.config.base_url, self.config.username
        );

        let url = self.api_url("/api/auth/login")?;
        let response = self
            .http_client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&LoginRequest {
                username: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!("Login failed: Status={}, Body='{}'", status, body);
            let message = match serde_json::from_str::<ApiErrorPayload>(&body) {
                Ok(parsed) => parsed.message.unwrap_or(body),
                Err(_) => body,
            };
            return Err(PresensiError::ApiError { status, message });
        }

        let login: LoginResponse = response.json().await?;

        let expires_at = match jwt_expiry_unix(&login.token) {
            Some(exp) => exp,
            None => {
                warn!("Login token carries no exp claim; assuming fallback TTL");
                now_unix_secs()? + FALLBACK_SESSION_TTL_SECS
            }
        };

        let session = StoredSession {
            token: login.token,
            subject_id: login.user.id,
            subject_name: login.user.name,
            role: login.user.role,
            expires_at_unix_secs: expires_at,
        };
        self.save_session(&session)?;

        let mut guard = self.session.lock().await;
        *guard = Some(session.clone());

        info!(
            "Authenticated as subject '{}' (role: {})",
            session.subject_id, session.role
        );
        Ok(session)
    }

    /// Returns a usable bearer token, logging in when the stored session
    /// is absent or about to expire.
    pub async fn ensure_session(&self) -> Result<String, PresensiError> {
        {
            let guard = self.session.lock().await;
            if let Some(session) = &*guard {
                if !session.is_expired(SESSION_EXPIRY_BUFFER_SECS)? {
                    return Ok(session.token.clone());
                }
                debug!("Stored session expired or expiring; re-authenticating");
            }
        } // Release lock before login re-acquires it

        Ok(self.login().await?.token)
    }

    /// Drops the in-memory session and logs in again. Used after a 401.
    pub async fn force_relogin(&self) -> Result<(), PresensiError> {
        {
            let mut guard = self.session.lock().await;
            *guard = None;
        }
        self.login().await?;
        Ok(())
    }

    pub async fn session_role(&self) -> Option<Role> {
        self.session.lock().await.as_ref().map(|s| s.role)
    }

    fn api_url(&self, endpoint: &str) -> Result<Url, PresensiError> {
        let base = self.config.base_url.trim_end_matches('/');
        let joined = if endpoint.starts_with('/') {
            format!("{}{}", base, endpoint)
        } else {
            format!("{}/{}", base, endpoint)
        };
        Ok(Url::parse(&joined)?)
    }

    async fn build_request(
        &self,
        method: Method,
        endpoint: &str,
    ) -> Result<RequestBuilder, PresensiError> {
        let token = self.ensure_session().await?;
        let url = self.api_url(endpoint)?;

        Ok(self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json"))
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, PresensiError> {
        let request = request_builder.build()?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to {}", context_msg, request_url);

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        debug!(
            "Received response for '{}' ({}): Status={}",
            context_msg, request_url, status
        );

        if status.is_success() {
            let bytes = response.bytes().await?;
            serde_json::from_slice::<T>(&bytes).map_err(|e| {
                error!(
                    "JSON deserialization failed for '{}' ({}): {}",
                    context_msg, request_url, e
                );
                PresensiError::Json(e)
            })
        } else {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!(
                "API Error Response for '{}': Status={}, Body='{}'",
                context_msg, status, error_body
            );

            match status {
                StatusCode::UNAUTHORIZED => Err(PresensiError::Unauthorized),
                StatusCode::FORBIDDEN => Err(PresensiError::Forbidden),
                _ => {
                    let message = match serde_json::from_str::<ApiErrorPayload>(&error_body) {
                        Ok(parsed) => parsed.message.unwrap_or(error_body),
                        Err(_) => error_body,
                    };
                    Err(PresensiError::ApiError { status, message })
                }
            }
        }
    }

    /// Sends an authed request, re-authenticating once if the API rejects
    /// the stored session.
    async fn request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        context_msg: &str,
    ) -> Result<T, PresensiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        for attempt in 0..2 {
            let mut builder = self.build_request(method.clone(), endpoint).await?;
            if let Some(body) = body {
                builder = builder.json(body);
            }
            match self.send_and_deserialize::<T>(builder, context_msg).await {
                Err(PresensiError::Unauthorized) if attempt == 0 => {
                    warn!(
                        "Session rejected for '{}'; re-authenticating once",
                        context_msg
                    );
                    self.force_relogin().await?;
                }
                other => return other,
            }
        }
        Err(PresensiError::Unauthorized)
    }

    // --- Attendance Endpoints ---

    /// All subjects' records for one date. Admin-scoped on the server.
    pub async fn get_daily_records(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecordDto>, PresensiError> {
        let endpoint = format!("/api/attendance?date={}", date.format("%Y-%m-%d"));
        let response: AttendanceListResponse = self
            .request(Method::GET, &endpoint, NO_BODY, "Get Daily Attendance")
            .await?;
        Ok(response.data)
    }

    /// One subject's records over an inclusive date range. Admin-scoped.
    pub async fn get_subject_records(
        &self,
        subject_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecordDto>, PresensiError> {
        let endpoint = format!(
            "/api/attendance/{}?from={}&to={}",
            subject_id,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );
        let response: AttendanceListResponse = self
            .request(Method::GET, &endpoint, NO_BODY, "Get Subject Attendance")
            .await?;
        Ok(response.data)
    }

    /// The authenticated user's own records over an inclusive date range.
    pub async fn get_own_records(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecordDto>, PresensiError> {
        let endpoint = format!(
            "/api/attendance/me?from={}&to={}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );
        let response: AttendanceListResponse = self
            .request(Method::GET, &endpoint, NO_BODY, "Get Own Attendance")
            .await?;
        Ok(response.data)
    }

    /// Submits a check-in for the given slot; the server stamps the time.
    pub async fn submit_check_in(
        &self,
        slot: crate::schedule::Slot,
    ) -> Result<CheckInResponse, PresensiError> {
        let body = CheckInRequest {
            slot: slot.as_str(),
        };
        self.request(
            Method::POST,
            "/api/attendance/check-in",
            Some(&body),
            "Submit Check-In",
        )
        .await
    }

    pub async fn submit_leave_request(
        &self,
        payload: &LeaveRequestPayload,
    ) -> Result<LeaveRequestResponse, PresensiError> {
        self.request(
            Method::POST,
            "/api/leave-requests",
            Some(payload),
            "Submit Leave Request",
        )
        .await
    }

    // --- Other Endpoints ---

    pub async fn get_announcements(&self) -> Result<Vec<Announcement>, PresensiError> {
        let response: AnnouncementListResponse = self
            .request(Method::GET, "/api/announcements", NO_BODY, "Get Announcements")
            .await?;
        Ok(response.data)
    }

    /// Subject directory. Admin-scoped on the server.
    pub async fn get_subjects(&self) -> Result<Vec<SubjectInfo>, PresensiError> {
        let response: SubjectListResponse = self
            .request(Method::GET, "/api/users", NO_BODY, "Get Subjects")
            .await?;
        Ok(response.data)
    }
}

// --- Background Task ---

/// Keeps the session fresh while a long-lived command (`watch`) runs, so
/// the per-tick fetch never stalls on a mid-loop re-login.
pub async fn run_session_refresh(client: Arc<PresensiClient>) {
    info!("Starting background session refresh task");
    const REFRESH_CHECK_INTERVAL_SECS: u64 = 600;
    let sleep_duration = Duration::from_secs(REFRESH_CHECK_INTERVAL_SECS);

    loop {
        match client.ensure_session().await {
            Ok(_) => debug!(
                "Session verified; next check in {} seconds",
                sleep_duration.as_secs()
            ),
            Err(e) => error!("Background session refresh failed: {}", e),
        }
        sleep(sleep_duration).await;
    }
}
