//! Client for a hosted Supabase project: GoTrue for accounts, PostgREST for
//! rows. Sessions are cached per chat in memory.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::RwLock;

use super::{
    AssessmentRecord, AssessmentStore, ConsultationRequest, IdentityProvider, Session, SessionKey,
    SignUpOutcome, StoredAssessment, StoredConsultation, User,
};
use crate::error::BackendError;

const ASSESSMENTS_TABLE: &str = "prakriti_assessments";
const CONSULTATIONS_TABLE: &str = "consultation_requests";
const USER_AGENT: &str = concat!("prakriti-bot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|timestamp| DateTime::<Utc>::from_timestamp(timestamp, 0))
            .or_else(|| {
                self.expires_in
                    .map(|seconds| now + chrono::Duration::seconds(seconds))
            });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a session, or with just the user when the project
/// requires email confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

/// GoTrue and PostgREST disagree on error field names.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

async fn error_parts(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, error_message(&body))
}

fn rest_error(status: StatusCode, message: String) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED => BackendError::NotAuthenticated,
        StatusCode::BAD_REQUEST
        | StatusCode::FORBIDDEN
        | StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY => BackendError::Rejected(message),
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn sign_up_error(status: StatusCode, message: String) -> BackendError {
    let lowered = message.to_lowercase();
    if lowered.contains("already registered") || lowered.contains("already exists") {
        return BackendError::AlreadyRegistered;
    }
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::Rejected(message)
        }
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// GoTrue answers 400 both for wrong credentials and for accounts that are
/// not usable yet, such as an unconfirmed email.
fn sign_in_error(status: StatusCode, message: String) -> BackendError {
    if message.eq_ignore_ascii_case("invalid login credentials") {
        return BackendError::InvalidCredentials;
    }
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::Rejected(message)
        }
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// PostgREST answers inserts and filtered selects with an array of rows.
async fn first_row<T: DeserializeOwned>(response: Response) -> Result<Option<T>, BackendError> {
    let rows: Vec<T> = read_json(response).await?;
    Ok(rows.into_iter().next())
}

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            sessions: RwLock::new(HashMap::new()),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth(&self, path: &str) -> RequestBuilder {
        self.http
            .post(self.auth_url(path))
            .header("apikey", &self.anon_key)
    }

    fn rest(&self, method: Method, table: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, self.rest_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let response = self
            .auth("token?grant_type=refresh_token")
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let token: TokenResponse = read_json(response).await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        token: &str,
        row: &impl serde::Serialize,
    ) -> Result<T, BackendError> {
        let response = self
            .rest(Method::POST, table, token)
            .header("Prefer", "return=representation")
            .header(header::ACCEPT, "application/json")
            .json(row)
            .send()
            .await?;
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            log::warn!("Insert into {} failed with {}: {}", table, status, message);
            return Err(rest_error(status, message));
        }
        first_row(response)
            .await?
            .ok_or_else(|| BackendError::Rejected(format!("{} returned no row", table)))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn current_session(&self, key: SessionKey) -> Result<Option<Session>, BackendError> {
        let Some(session) = self.sessions.read().await.get(&key).cloned() else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let refreshed = match session.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token).await,
            None => Err(BackendError::NotAuthenticated),
        };
        match refreshed {
            Ok(refreshed) => {
                log::debug!("Refreshed session for chat {}", key.0);
                self.sessions.write().await.insert(key, refreshed.clone());
                Ok(Some(refreshed))
            }
            Err(err) => {
                log::warn!("Dropping expired session for chat {}: {}", key.0, err);
                self.sessions.write().await.remove(&key);
                Ok(None)
            }
        }
    }

    async fn sign_in(
        &self,
        key: SessionKey,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let response = self
            .auth("token?grant_type=password")
            .json(&serde_json::json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(sign_in_error(status, message));
        }

        let token: TokenResponse = read_json(response).await?;
        let session = token.into_session(Utc::now());
        self.sessions.write().await.insert(key, session.clone());
        Ok(session)
    }

    async fn sign_up(
        &self,
        key: SessionKey,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let response = self
            .auth("signup")
            .json(&serde_json::json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(sign_up_error(status, message));
        }

        match read_json::<SignUpResponse>(response).await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now());
                self.sessions.write().await.insert(key, session.clone());
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome::ConfirmationRequired(user)),
        }
    }

    async fn sign_out(&self, key: SessionKey) -> Result<(), BackendError> {
        let Some(session) = self.sessions.write().await.remove(&key) else {
            return Ok(());
        };

        // The local session is gone either way; a failed revoke only means
        // the token lives until it expires.
        let revoked = self
            .auth("logout")
            .bearer_auth(&session.access_token)
            .send()
            .await;
        match revoked {
            Ok(response) if !response.status().is_success() => {
                let (status, message) = error_parts(response).await;
                log::warn!("Sign out for chat {} returned {}: {}", key.0, status, message);
            }
            Err(err) => log::warn!("Sign out for chat {} failed: {}", key.0, err),
            Ok(_) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl AssessmentStore for SupabaseClient {
    async fn save_assessment(
        &self,
        session: &Session,
        record: &AssessmentRecord,
    ) -> Result<StoredAssessment, BackendError> {
        record.validate()?;
        self.insert(ASSESSMENTS_TABLE, &session.access_token, record)
            .await
    }

    async fn latest_assessment(
        &self,
        session: &Session,
    ) -> Result<Option<StoredAssessment>, BackendError> {
        let user_filter = format!("eq.{}", session.user.id);
        let response = self
            .rest(Method::GET, ASSESSMENTS_TABLE, &session.access_token)
            .query(&[
                ("select", "*"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.desc"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(rest_error(status, message));
        }
        first_row(response).await
    }

    async fn save_consultation(
        &self,
        session: Option<&Session>,
        request: &ConsultationRequest,
    ) -> Result<StoredConsultation, BackendError> {
        let token = session
            .map(|session| session.access_token.as_str())
            .unwrap_or(&self.anon_key);
        self.insert(CONSULTATIONS_TABLE, token, request).await
    }
}
