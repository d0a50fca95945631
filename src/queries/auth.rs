//! Authentication hooks.

use super::{check_input, Outcome, QueryClient, QueryError, QueryResult};
use crate::remote::{Session, SignUpOutcome, SignUpRequest};
use crate::schema::{SignInInput, SignUpInput};
use serde_json::json;

const SIGN_IN: Outcome = Outcome {
    action: "sign in",
    invalidates: &[],
    success: Some(("Welcome back!", "You have been signed in successfully.")),
    failure: Some(("Sign In Error", "Failed to sign in")),
};

const SIGN_UP: Outcome = Outcome {
    action: "sign up",
    invalidates: &[],
    success: Some((
        "Account Created!",
        "Please check your email to verify your account.",
    )),
    failure: Some(("Sign Up Error", "Failed to create account")),
};

const SIGN_OUT: Outcome = Outcome {
    action: "sign out",
    invalidates: &[],
    success: Some(("Signed Out", "You have been successfully signed out.")),
    failure: Some(("Sign Out Error", "Failed to sign out")),
};

impl QueryClient {
    pub async fn sign_in(&self, input: &SignInInput) -> QueryResult<Session> {
        let result: QueryResult<Session> = async {
            let input = check_input(input)?;
            Ok(self
                .auth
                .sign_in_with_password(&input.email, &input.password)
                .await?)
        }
        .await;
        self.settle(&SIGN_IN, result).await
    }

    /// Register a new account. The name and role travel as identity metadata;
    /// `redirect_to` is where the confirmation email points back to.
    pub async fn sign_up(
        &self,
        input: &SignUpInput,
        redirect_to: Option<String>,
    ) -> QueryResult<SignUpOutcome> {
        let result: QueryResult<SignUpOutcome> = async {
            let input = check_input(input)?;
            let request = SignUpRequest {
                email: input.email,
                password: input.password,
                data: json!({
                    "first_name": input.first_name,
                    "last_name": input.last_name,
                    "role": input.role,
                }),
                redirect_to,
            };
            Ok(self.auth.sign_up(request).await?)
        }
        .await;
        self.settle(&SIGN_UP, result).await
    }

    /// Sign out and drop every cached query. An already expired session
    /// counts as signed out.
    pub async fn sign_out(&self) -> QueryResult<()> {
        let result = match self.auth.sign_out().await {
            Ok(()) => Ok(()),
            Err(err) if err.is_session_not_found() => {
                tracing::debug!("Session already gone on sign-out");
                Ok(())
            }
            Err(err) => Err(QueryError::from(err)),
        };
        if result.is_ok() {
            self.cache.clear();
        }
        self.settle(&SIGN_OUT, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{QueryKey, QueryScope};
    use crate::remote::{AuthOperation, MemoryBackend, RemoteError};
    use crate::schema::AppRole;
    use crate::test_helpers::*;

    fn sign_up_input(email: &str) -> SignUpInput {
        SignUpInput {
            email: email.into(),
            password: "secret1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: AppRole::ProjectManager,
        }
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_toasts() {
        let mut h = Harness::new();
        h.backend.add_account("ada@x.com", "secret1", json!({})).await;
        let input = SignInInput {
            email: "ada@x.com".into(),
            password: "wrong-one".into(),
        };
        let err = h.queries.sign_in(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        let toasts = h.drain_toasts();
        assert_eq!(toasts[0].title, "Sign In Error");
        assert!(toasts[0].is_destructive());
    }

    #[tokio::test]
    async fn test_sign_up_sends_metadata_and_creates_profile() {
        let mut h = Harness::new();
        let outcome = h
            .queries
            .sign_up(&sign_up_input("ada@x.com"), None)
            .await
            .unwrap();
        assert_eq!(outcome.user.first_name(), Some("Ada"));
        assert!(outcome.session.is_some());

        let profile = h.queries.load_profile(outcome.user.id).await.unwrap().unwrap();
        assert_eq!(profile.role, AppRole::ProjectManager);
        assert_eq!(h.drain_toasts()[0].title, "Account Created!");
    }

    #[tokio::test]
    async fn test_sign_up_with_confirmation_has_no_session() {
        let h = Harness::with_backend(MemoryBackend::new().with_email_confirmation());
        let outcome = h
            .queries
            .sign_up(&sign_up_input("ada@x.com"), Some("https://app.example.co/".into()))
            .await
            .unwrap();
        assert!(outcome.session.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_every_cached_query() {
        let mut h = Harness::new();
        h.queries.list_tasks().await.unwrap();
        h.queries.list_projects().await.unwrap();

        // No session held: still counts as signed out
        h.queries.sign_out().await.unwrap();
        assert!(!h.queries.cache().contains(&QueryKey::all(QueryScope::Tasks)).await);
        assert!(!h.queries.cache().contains(&QueryKey::all(QueryScope::Projects)).await);
        assert_eq!(h.drain_toasts()[0].title, "Signed Out");
    }

    #[tokio::test]
    async fn test_sign_out_failure_keeps_cache() {
        let mut h = Harness::new();
        h.queries.list_tasks().await.unwrap();
        h.backend
            .fail_auth(
                AuthOperation::SignOut,
                RemoteError::new("network unreachable").with_status(503),
            )
            .await;

        assert!(h.queries.sign_out().await.is_err());
        assert!(h.queries.cache().contains(&QueryKey::all(QueryScope::Tasks)).await);
        assert_eq!(h.drain_toasts()[0].title, "Sign Out Error");
    }
}
