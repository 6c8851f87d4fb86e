//! In-memory port fakes shared by the core's unit tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::domain::{
    Message, ModelChoice, NewUser, ProfileFields, SearchSnippet, UserCredentials, UserProfile,
};
use crate::ports::{
    DatabaseService, LanguageModelService, PortError, PortResult, SearchService, TextStream,
};

/// Answers each request with the next scripted reply and records what it was sent.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<PortResult<String>>>,
    pub calls: Mutex<Vec<(ModelChoice, Vec<Message>)>>,
}

impl ScriptedLlm {
    pub fn new(replies: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: PortError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(ModelChoice, Vec<Message>)> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, model: ModelChoice, messages: &[Message]) -> PortResult<String> {
        self.calls.lock().unwrap().push((model, messages.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Unexpected("no scripted reply left".to_string())))
    }
}

#[async_trait]
impl LanguageModelService for ScriptedLlm {
    async fn complete(&self, model: ModelChoice, messages: &[Message]) -> PortResult<String> {
        self.next_reply(model, messages)
    }

    async fn complete_streaming(
        &self,
        model: ModelChoice,
        messages: &[Message],
    ) -> PortResult<TextStream> {
        let reply = self.next_reply(model, messages)?;
        let fragments: Vec<PortResult<String>> = reply
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}

/// Returns fixed results and counts how often it was asked.
#[derive(Default)]
pub struct CountingSearch {
    pub results: Vec<SearchSnippet>,
    pub queries: Mutex<Vec<String>>,
}

impl CountingSearch {
    pub fn with_results(results: Vec<SearchSnippet>) -> Self {
        Self {
            results,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchService for CountingSearch {
    async fn search(&self, query: &str) -> PortResult<Vec<SearchSnippet>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.results.clone())
    }
}

/// A `HashMap`-backed profile store.
#[derive(Default)]
pub struct MemoryDb {
    users: Mutex<HashMap<String, (UserProfile, String)>>,
    sessions: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    pub upserts: Mutex<Vec<(String, ProfileFields)>>,
}

impl MemoryDb {
    pub fn with_profile(profile: UserProfile) -> Self {
        let db = Self::default();
        db.users
            .lock()
            .unwrap()
            .insert(profile.email.clone(), (profile, String::new()));
        db
    }

    pub fn profile(&self, email: &str) -> Option<UserProfile> {
        self.users.lock().unwrap().get(email).map(|(p, _)| p.clone())
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn find_user(&self, email: &str) -> PortResult<Option<UserProfile>> {
        Ok(self.profile(email))
    }

    async fn create_user(&self, user: NewUser) -> PortResult<UserProfile> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.email) {
            return Err(PortError::AlreadyExists(user.email));
        }
        let profile = UserProfile {
            email: user.email.clone(),
            nickname: user.nickname,
            date_of_birth: Some(user.date_of_birth),
            recent_topic: None,
            topics_learned: Vec::new(),
            learning_style: None,
        };
        users.insert(user.email, (profile.clone(), user.password_hash));
        Ok(profile)
    }

    async fn update_details(
        &self,
        email: &str,
        nickname: &str,
        date_of_birth: NaiveDate,
    ) -> PortResult<UserProfile> {
        let mut users = self.users.lock().unwrap();
        let (profile, _) = users
            .get_mut(email)
            .ok_or_else(|| PortError::NotFound(email.to_string()))?;
        profile.nickname = nickname.to_string();
        profile.date_of_birth = Some(date_of_birth);
        Ok(profile.clone())
    }

    async fn upsert_profile(&self, email: &str, fields: &ProfileFields) -> PortResult<()> {
        let mut users = self.users.lock().unwrap();
        let (profile, _) = users
            .get_mut(email)
            .ok_or_else(|| PortError::NotFound(email.to_string()))?;
        if let Some(topic) = &fields.recent_topic {
            profile.recent_topic = Some(topic.clone());
        }
        if let Some(style) = &fields.learning_style {
            profile.learning_style = Some(style.clone());
        }
        if let Some(topics) = &fields.topics_learned {
            profile.topics_learned = topics.clone();
        }
        self.upserts
            .lock()
            .unwrap()
            .push((email.to_string(), fields.clone()));
        Ok(())
    }

    async fn get_credentials(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .lock()
            .unwrap()
            .get(email)
            .map(|(p, hash)| UserCredentials {
                email: p.email.clone(),
                password_hash: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(email.to_string()))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), (email.to_string(), expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        match self.sessions.lock().unwrap().get(session_id) {
            Some((email, expires_at)) if *expires_at > Utc::now() => Ok(email.clone()),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }
}
