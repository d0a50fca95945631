//! Profile hooks: user administration and the signed-in user's own profile.

use super::{check_input, keep_row, parse_row, Outcome, QueryClient, QueryError, QueryResult};
use crate::cache::{QueryKey, QueryScope};
use crate::events::{CrudAction, EntityType};
use crate::remote::{AuthUser, Collection, SelectQuery};
use crate::schema::{avatar_url, CreateUserInput, Profile, ProfilePatch};
use serde_json::json;
use uuid::Uuid;

const CREATE_USER: Outcome = Outcome {
    action: "create user",
    invalidates: &[QueryScope::Profiles],
    success: Some(("Success", "User created successfully")),
    failure: Some(("Error", "Failed to create user")),
};

const UPDATE_USER: Outcome = Outcome {
    action: "update user",
    invalidates: &[QueryScope::Profiles, QueryScope::Profile],
    success: Some(("Success", "User updated successfully")),
    failure: Some(("Error", "Failed to update user")),
};

const DELETE_USER: Outcome = Outcome {
    action: "delete user",
    invalidates: &[QueryScope::Profiles, QueryScope::Profile],
    success: Some(("Success", "User deleted successfully")),
    failure: Some(("Error", "Failed to delete user")),
};

const UPDATE_PROFILE: Outcome = Outcome {
    action: "update profile",
    invalidates: &[QueryScope::Profile, QueryScope::Profiles],
    success: Some((
        "Profile Updated",
        "Your profile has been updated successfully.",
    )),
    failure: Some(("Update Error", "Failed to update profile")),
};

impl QueryClient {
    /// All profiles, newest first
    pub async fn list_profiles(&self) -> QueryResult<Vec<Profile>> {
        self.fetch_list(
            QueryKey::all(QueryScope::Profiles),
            Collection::Profiles,
            SelectQuery::newest_first(),
            keep_row,
        )
        .await
    }

    /// Administrative user creation: inserts a profile row with a fresh id and
    /// a generated avatar seeded with the email address.
    pub async fn create_user(&self, input: &CreateUserInput, actor: Option<&AuthUser>) -> QueryResult<Profile> {
        let result: QueryResult<Profile> = async {
            let input = check_input(input)?;
            let row = json!({
                "id": Uuid::new_v4().to_string(),
                "first_name": input.first_name,
                "last_name": input.last_name,
                "role": input.role,
                "avatar_url": avatar_url(&input.email),
            });
            let stored = self.store.insert(Collection::Profiles, row).await?;
            parse_row::<Profile>(&stored)
        }
        .await;

        let profile = self.settle(&CREATE_USER, result).await?;
        tracing::info!(user_id = %profile.id, role = %profile.role, "User created");
        self.publish(
            EntityType::Profile,
            CrudAction::Created,
            profile.id,
            Some(&profile),
            actor.map(|a| a.id),
        );
        Ok(profile)
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        patch: &ProfilePatch,
        actor: Option<&AuthUser>,
    ) -> QueryResult<Profile> {
        let result = self.patch_profile(id, patch).await;
        let profile = self.settle(&UPDATE_USER, result).await?;
        self.publish(
            EntityType::Profile,
            CrudAction::Updated,
            profile.id,
            Some(&profile),
            actor.map(|a| a.id),
        );
        Ok(profile)
    }

    pub async fn delete_user(&self, id: Uuid, actor: Option<&AuthUser>) -> QueryResult<Uuid> {
        let result = self
            .store
            .delete(Collection::Profiles, id)
            .await
            .map(|_| id)
            .map_err(QueryError::from);
        let id = self.settle(&DELETE_USER, result).await?;
        self.publish::<Profile>(
            EntityType::Profile,
            CrudAction::Deleted,
            id,
            None,
            actor.map(|a| a.id),
        );
        Ok(id)
    }

    /// A user's profile through the cache; `None` when the user has no profile row
    pub async fn fetch_profile(&self, user_id: Uuid) -> QueryResult<Option<Profile>> {
        self.cache
            .get_or_fetch(QueryKey::scoped(QueryScope::Profile, user_id), || {
                self.load_profile(user_id)
            })
            .await
    }

    /// A user's profile straight from the backend, bypassing the cache.
    ///
    /// A missing row is `Ok(None)`, not an error.
    pub async fn load_profile(&self, user_id: Uuid) -> QueryResult<Option<Profile>> {
        match self.store.select_single(Collection::Profiles, user_id).await {
            Ok(row) => parse_row::<Profile>(&row).map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The signed-in user editing their own profile
    pub async fn update_profile(&self, user_id: Uuid, patch: &ProfilePatch) -> QueryResult<Profile> {
        let result = self.patch_profile(user_id, patch).await;
        let profile = self.settle(&UPDATE_PROFILE, result).await?;
        self.publish(
            EntityType::Profile,
            CrudAction::Updated,
            profile.id,
            Some(&profile),
            Some(user_id),
        );
        Ok(profile)
    }

    async fn patch_profile(&self, id: Uuid, patch: &ProfilePatch) -> QueryResult<Profile> {
        let patch = check_input(patch)?;
        let body = serde_json::to_value(&patch)?;
        let stored = self.store.update(Collection::Profiles, id, body).await?;
        parse_row::<Profile>(&stored)
    }
}
