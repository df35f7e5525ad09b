use std::sync::Arc;

use escalation_core::{PhoneCandidateGenerator, User};
use escalation_storage::{DocumentStore, Filter, USERS};
use tracing::{debug, info, warn};

/// Caller identity lookup. Users are only ever read here, never created.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    phones: Arc<dyn PhoneCandidateGenerator>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, phones: Arc<dyn PhoneCandidateGenerator>) -> Self {
        Self { store, phones }
    }

    pub async fn find_user_by_phone(&self, phone: &str) -> Option<User> {
        if phone.trim().is_empty() {
            return None;
        }
        let candidates = self.phones.candidates(phone);
        debug!(?candidates, "probing users by phone");
        for candidate in &candidates {
            let found = match self
                .store
                .find_one(USERS, &Filter::eq("phone", candidate.as_str()), &[])
                .await
            {
                Ok(found) => found,
                Err(err) => {
                    warn!(error = %err, "user lookup failed");
                    return None;
                }
            };
            let Some(doc) = found else { continue };
            match serde_json::from_value::<User>(doc) {
                Ok(user) => {
                    info!(user = user.display_name(), phone = %candidate, "caller identified");
                    return Some(user);
                }
                Err(err) => {
                    warn!(error = %err, phone = %candidate, "skipping malformed user record");
                }
            }
        }
        debug!(phone, "no user for phone");
        None
    }
}
