//! Identity and persistence collaborators. The bot only talks to the two
//! traits here; which backend sits behind them is decided at start-up.

pub mod memory;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use self::{memory::MemoryBackend, supabase::SupabaseClient};

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::quiz::{
    classifier::{Constitution, PrakritiResult},
    AnswerMap, Dosha,
};

/// Identifies whose session a call is about. One per Telegram chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(pub i64);

impl From<teloxide::types::ChatId> for SessionKey {
    fn from(chat_id: teloxide::types::ChatId) -> Self {
        Self(chat_id.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// The account exists but has to be confirmed by email before signing in.
    ConfirmationRequired(User),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self, key: SessionKey) -> Result<Option<User>, BackendError> {
        Ok(self.current_session(key).await?.map(|session| session.user))
    }

    /// A live session for `key`, refreshed first if it has expired.
    async fn current_session(&self, key: SessionKey) -> Result<Option<Session>, BackendError>;

    async fn sign_in(
        &self,
        key: SessionKey,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn sign_up(
        &self,
        key: SessionKey,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, BackendError>;

    async fn sign_out(&self, key: SessionKey) -> Result<(), BackendError>;
}

/// One completed questionnaire as it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub user_id: String,
    pub dominant_dosha: Dosha,
    pub constitution: Constitution,
    pub vata_score: u8,
    pub pitta_score: u8,
    pub kapha_score: u8,
    pub answers: AnswerMap,
    pub total_questions: usize,
}

impl AssessmentRecord {
    pub fn new(
        user: &User,
        result: &PrakritiResult,
        answers: AnswerMap,
        total_questions: usize,
    ) -> Result<Self, BackendError> {
        let record = Self {
            user_id: user.id.clone(),
            dominant_dosha: result.dominant,
            constitution: result.constitution,
            vata_score: result.vata,
            pitta_score: result.pitta,
            kapha_score: result.kapha,
            answers,
            total_questions,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        if self.user_id.trim().is_empty() {
            return Err(BackendError::InvalidRecord("missing user id".to_string()));
        }
        if self.total_questions == 0 {
            return Err(BackendError::InvalidRecord("total_questions is zero".to_string()));
        }
        if self.answers.is_empty() {
            return Err(BackendError::InvalidRecord("no answers".to_string()));
        }
        if self.answers.len() > self.total_questions {
            return Err(BackendError::InvalidRecord(format!(
                "{} answers for {} questions",
                self.answers.len(),
                self.total_questions
            )));
        }
        if [self.vata_score, self.pitta_score, self.kapha_score]
            .iter()
            .any(|score| *score > 100)
        {
            return Err(BackendError::InvalidRecord("score above 100".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAssessment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: AssessmentRecord,
}

/// A consultation booking from the call-to-action form. Built only from
/// values that already passed the phone/date/time inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub user_id: Option<String>,
    pub name: String,
    /// E.164, e.g. `+919876543210`
    pub phone: String,
    pub preferred_date: NaiveDate,
    /// 24-hour `HH:MM`
    pub preferred_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConsultation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub request: ConsultationRequest,
}

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn save_assessment(
        &self,
        session: &Session,
        record: &AssessmentRecord,
    ) -> Result<StoredAssessment, BackendError>;

    async fn latest_assessment(
        &self,
        session: &Session,
    ) -> Result<Option<StoredAssessment>, BackendError>;

    async fn save_consultation(
        &self,
        session: Option<&Session>,
        request: &ConsultationRequest,
    ) -> Result<StoredConsultation, BackendError>;
}

/// The collaborators handed to every bot handler.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn AssessmentStore>,
}

impl Services {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn AssessmentStore>) -> Self {
        Self { identity, store }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        match config {
            BackendConfig::Supabase {
                url,
                anon_key,
                timeout,
            } => {
                log::info!("Using Supabase backend at {}", url);
                let client = Arc::new(SupabaseClient::new(url.as_str(), anon_key.as_str(), *timeout)?);
                Ok(Self::new(client.clone(), client))
            }
            BackendConfig::Memory => {
                log::warn!("No hosted backend configured, accounts and results are kept in memory");
                let backend = Arc::new(MemoryBackend::new());
                Ok(Self::new(backend.clone(), backend))
            }
        }
    }

    /// Stores a finished quiz for whoever is signed in on `key`.
    pub async fn submit_assessment(
        &self,
        key: SessionKey,
        result: &PrakritiResult,
        answers: AnswerMap,
        total_questions: usize,
    ) -> Result<StoredAssessment, BackendError> {
        let session = self
            .identity
            .current_session(key)
            .await?
            .ok_or(BackendError::NotAuthenticated)?;
        let record = AssessmentRecord::new(&session.user, result, answers, total_questions)?;
        self.store.save_assessment(&session, &record).await
    }

    pub async fn latest_assessment(
        &self,
        key: SessionKey,
    ) -> Result<Option<StoredAssessment>, BackendError> {
        let session = self
            .identity
            .current_session(key)
            .await?
            .ok_or(BackendError::NotAuthenticated)?;
        self.store.latest_assessment(&session).await
    }

    /// Bookings do not need an account; a signed-in user gets linked.
    pub async fn book_consultation(
        &self,
        key: SessionKey,
        mut request: ConsultationRequest,
    ) -> Result<StoredConsultation, BackendError> {
        let session = self.identity.current_session(key).await?;
        request.user_id = session.as_ref().map(|session| session.user.id.clone());
        self.store.save_consultation(session.as_ref(), &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::classifier::classify;

    fn user() -> User {
        User {
            id: "d3f1c2aa".to_string(),
            email: Some("asha@example.com".to_string()),
        }
    }

    fn answers(labels: &[&str]) -> AnswerMap {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| (format!("q{}", i + 1), label.to_string()))
            .collect()
    }

    #[test]
    fn record_carries_the_result() {
        let answers = answers(&["Vata", "Vata", "Pitta", "Kapha"]);
        let result = classify(&answers);
        let record = AssessmentRecord::new(&user(), &result, answers.clone(), 12).unwrap();

        assert_eq!(record.user_id, "d3f1c2aa");
        assert_eq!(record.dominant_dosha, Dosha::Vata);
        assert_eq!(record.constitution, Constitution::Single(Dosha::Vata));
        assert_eq!((record.vata_score, record.pitta_score, record.kapha_score), (50, 25, 25));
        assert_eq!(record.answers, answers);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["dominant_dosha"], "Vata");
        assert_eq!(json["constitution"], "Vata");
        assert_eq!(json["answers"]["q3"], "Pitta");
        assert_eq!(json["total_questions"], 12);
    }

    #[test]
    fn nonconforming_records_are_rejected() {
        let answers = answers(&["Vata", "Pitta"]);
        let result = classify(&answers);

        let anonymous = User {
            id: " ".to_string(),
            email: None,
        };
        assert!(matches!(
            AssessmentRecord::new(&anonymous, &result, answers.clone(), 12),
            Err(BackendError::InvalidRecord(_))
        ));
        assert!(matches!(
            AssessmentRecord::new(&user(), &result, answers.clone(), 0),
            Err(BackendError::InvalidRecord(_))
        ));
        assert!(matches!(
            AssessmentRecord::new(&user(), &result, answers.clone(), 1),
            Err(BackendError::InvalidRecord(_))
        ));
        assert!(matches!(
            AssessmentRecord::new(&user(), &PrakritiResult::EMPTY, AnswerMap::new(), 12),
            Err(BackendError::InvalidRecord(_))
        ));
    }

    #[test]
    fn stored_rows_parse_from_backend_json() {
        let row = serde_json::json!({
            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "created_at": "2026-10-19T08:30:00.123456+00:00",
            "user_id": "d3f1c2aa",
            "dominant_dosha": "Pitta",
            "constitution": "Pitta-Kapha",
            "vata_score": 20,
            "pitta_score": 42,
            "kapha_score": 38,
            "answers": { "q1": "Pitta" },
            "total_questions": 12
        });
        let stored: StoredAssessment = serde_json::from_value(row).unwrap();
        assert_eq!(stored.record.dominant_dosha, Dosha::Pitta);
        assert_eq!(
            stored.record.constitution,
            Constitution::Dual(Dosha::Pitta, Dosha::Kapha)
        );
    }

    #[tokio::test]
    async fn memory_backend_without_hosted_config() {
        let services = Services::from_config(&BackendConfig::Memory).unwrap();
        assert_eq!(services.identity.current_user(SessionKey(1)).await.unwrap(), None);
        assert!(matches!(
            services.latest_assessment(SessionKey(1)).await,
            Err(BackendError::NotAuthenticated)
        ));
    }

    #[test]
    fn session_expiry() {
        let now = Utc::now();
        let mut session = Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: None,
            user: user(),
        };
        assert!(!session.is_expired(now));
        session.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(session.is_expired(now));
        session.expires_at = Some(now + chrono::Duration::seconds(60));
        assert!(!session.is_expired(now));
    }
}
