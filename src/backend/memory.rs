use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    AssessmentRecord, AssessmentStore, ConsultationRequest, IdentityProvider, Session, SessionKey,
    SignUpOutcome, StoredAssessment, StoredConsultation, User,
};
use crate::error::BackendError;

const MIN_PASSWORD_LEN: usize = 6;

/// Development stand-in only: the password is kept and compared as plain
/// text. Real accounts live in the hosted backend.
struct Account {
    user: User,
    password: String,
}

/// Accounts, sessions and rows kept in process memory. Used when no hosted
/// backend is configured; everything is gone after a restart.
#[derive(Default)]
pub struct MemoryBackend {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<SessionKey, Session>>,
    assessments: RwLock<Vec<StoredAssessment>>,
    consultations: RwLock<Vec<StoredConsultation>>,
}

fn random_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_session(user: User) -> Session {
        Session {
            access_token: random_id(),
            refresh_token: None,
            expires_at: None,
            user,
        }
    }

    /// Rows written with a token that is no longer signed in are refused,
    /// the same way the hosted backend refuses them.
    async fn check_live(&self, session: &Session) -> Result<(), BackendError> {
        let sessions = self.sessions.read().await;
        if sessions
            .values()
            .any(|live| live.access_token == session.access_token)
        {
            Ok(())
        } else {
            Err(BackendError::NotAuthenticated)
        }
    }

    #[cfg(test)]
    pub async fn assessment_count(&self) -> usize {
        self.assessments.read().await.len()
    }

    #[cfg(test)]
    pub async fn consultation_count(&self) -> usize {
        self.consultations.read().await.len()
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn current_session(&self, key: SessionKey) -> Result<Option<Session>, BackendError> {
        Ok(self.sessions.read().await.get(&key).cloned())
    }

    async fn sign_in(
        &self,
        key: SessionKey,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let email = email.trim().to_lowercase();
        let user = {
            let accounts = self.accounts.read().await;
            match accounts.get(&email) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return Err(BackendError::InvalidCredentials),
            }
        };

        let session = Self::new_session(user);
        self.sessions.write().await.insert(key, session.clone());
        log::debug!("Memory backend: signed in {} on chat {}", email, key.0);
        Ok(session)
    }

    async fn sign_up(
        &self,
        key: SessionKey,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let email = email.trim().to_lowercase();
        if password.len() < MIN_PASSWORD_LEN {
            return Err(BackendError::Rejected(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&email) {
                return Err(BackendError::AlreadyRegistered);
            }
            let user = User {
                id: random_id(),
                email: Some(email.clone()),
            };
            accounts.insert(
                email,
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
            user
        };

        let session = Self::new_session(user);
        self.sessions.write().await.insert(key, session.clone());
        Ok(SignUpOutcome::SignedIn(session))
    }

    async fn sign_out(&self, key: SessionKey) -> Result<(), BackendError> {
        self.sessions.write().await.remove(&key);
        Ok(())
    }
}

#[async_trait]
impl AssessmentStore for MemoryBackend {
    async fn save_assessment(
        &self,
        session: &Session,
        record: &AssessmentRecord,
    ) -> Result<StoredAssessment, BackendError> {
        self.check_live(session).await?;
        record.validate()?;
        if record.user_id != session.user.id {
            return Err(BackendError::Rejected(
                "record belongs to another user".to_string(),
            ));
        }

        let stored = StoredAssessment {
            id: random_id(),
            created_at: Utc::now(),
            record: record.clone(),
        };
        self.assessments.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn latest_assessment(
        &self,
        session: &Session,
    ) -> Result<Option<StoredAssessment>, BackendError> {
        self.check_live(session).await?;
        let assessments = self.assessments.read().await;
        // pushed in order, so the last match is the newest
        Ok(assessments
            .iter()
            .rev()
            .find(|stored| stored.record.user_id == session.user.id)
            .cloned())
    }

    async fn save_consultation(
        &self,
        session: Option<&Session>,
        request: &ConsultationRequest,
    ) -> Result<StoredConsultation, BackendError> {
        if let Some(session) = session {
            self.check_live(session).await?;
        }
        if request.name.trim().is_empty() {
            return Err(BackendError::InvalidRecord("missing name".to_string()));
        }

        let stored = StoredConsultation {
            id: random_id(),
            created_at: Utc::now(),
            request: request.clone(),
        };
        self.consultations.write().await.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Services;
    use crate::quiz::{classifier::classify, AnswerMap};
    use chrono::NaiveDate;
    use std::sync::Arc;

    const CHAT: SessionKey = SessionKey(42);

    fn services(backend: &Arc<MemoryBackend>) -> Services {
        Services::new(backend.clone(), backend.clone())
    }

    fn answers() -> AnswerMap {
        [("q1", "Pitta"), ("q2", "Pitta"), ("q3", "Kapha")]
            .into_iter()
            .map(|(q, a)| (q.to_string(), a.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn sign_up_then_in_and_out() {
        let backend = MemoryBackend::new();
        let outcome = backend.sign_up(CHAT, "Asha@Example.com", "secret1").await.unwrap();
        let SignUpOutcome::SignedIn(session) = outcome else {
            panic!("memory sign up should sign in");
        };
        assert_eq!(session.user.email.as_deref(), Some("asha@example.com"));
        assert_eq!(backend.current_user(CHAT).await.unwrap(), Some(session.user.clone()));

        backend.sign_out(CHAT).await.unwrap();
        assert_eq!(backend.current_session(CHAT).await.unwrap(), None);

        assert!(matches!(
            backend.sign_in(CHAT, "asha@example.com", "wrong").await,
            Err(BackendError::InvalidCredentials)
        ));
        let again = backend.sign_in(CHAT, " asha@example.com", "secret1").await.unwrap();
        assert_eq!(again.user, session.user);
        assert_ne!(again.access_token, session.access_token);
    }

    #[tokio::test]
    async fn duplicate_and_weak_sign_ups_fail() {
        let backend = MemoryBackend::new();
        backend.sign_up(CHAT, "a@b.co", "secret1").await.unwrap();
        assert!(matches!(
            backend.sign_up(SessionKey(7), "a@b.co", "secret2").await,
            Err(BackendError::AlreadyRegistered)
        ));
        assert!(matches!(
            backend.sign_up(SessionKey(7), "c@d.co", "123").await,
            Err(BackendError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn submitting_requires_a_session() {
        let backend = Arc::new(MemoryBackend::new());
        let services = services(&backend);
        let answers = answers();
        let result = classify(&answers);

        let err = services
            .submit_assessment(CHAT, &result, answers.clone(), 12)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotAuthenticated));
        assert_eq!(backend.assessment_count().await, 0);

        backend.sign_up(CHAT, "a@b.co", "secret1").await.unwrap();
        let stored = services
            .submit_assessment(CHAT, &result, answers.clone(), 12)
            .await
            .unwrap();
        assert_eq!(stored.record.constitution.to_string(), "Pitta");
        assert_eq!(stored.record.answers, answers);

        let latest = services.latest_assessment(CHAT).await.unwrap();
        assert_eq!(latest, Some(stored));
    }

    #[tokio::test]
    async fn signed_out_tokens_are_refused() {
        let backend = MemoryBackend::new();
        let SignUpOutcome::SignedIn(session) =
            backend.sign_up(CHAT, "a@b.co", "secret1").await.unwrap()
        else {
            panic!("expected a session");
        };
        let answers = answers();
        let record = AssessmentRecord::new(&session.user, &classify(&answers), answers, 12).unwrap();

        backend.sign_out(CHAT).await.unwrap();
        assert!(matches!(
            backend.save_assessment(&session, &record).await,
            Err(BackendError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn latest_assessment_is_per_user() {
        let backend = Arc::new(MemoryBackend::new());
        let services = services(&backend);
        backend.sign_up(SessionKey(1), "one@b.co", "secret1").await.unwrap();
        backend.sign_up(SessionKey(2), "two@b.co", "secret2").await.unwrap();

        let answers = answers();
        let result = classify(&answers);
        services
            .submit_assessment(SessionKey(1), &result, answers, 12)
            .await
            .unwrap();

        assert!(services.latest_assessment(SessionKey(2)).await.unwrap().is_none());
        assert!(services.latest_assessment(SessionKey(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bookings_link_the_signed_in_user() {
        let backend = Arc::new(MemoryBackend::new());
        let services = services(&backend);
        let request = ConsultationRequest {
            user_id: None,
            name: "Asha".to_string(),
            phone: "+919876543210".to_string(),
            preferred_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            preferred_time: "10:30".to_string(),
        };

        let anonymous = services.book_consultation(CHAT, request.clone()).await.unwrap();
        assert_eq!(anonymous.request.user_id, None);

        let SignUpOutcome::SignedIn(session) =
            backend.sign_up(CHAT, "a@b.co", "secret1").await.unwrap()
        else {
            panic!("expected a session");
        };
        let linked = services.book_consultation(CHAT, request).await.unwrap();
        assert_eq!(linked.request.user_id, Some(session.user.id));
        assert_eq!(backend.consultation_count().await, 2);
    }
}
