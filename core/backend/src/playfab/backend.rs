//! PlayFab implementation of the identity and file backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use pftoolkit_common::{Credential, EntityKey, Error, Result, TitleId};

use crate::provider::{
    FileBackend, FileListing, IdentityBackend, InitiatedUpload, LoginResult, RemoteFile,
    UploadSlot,
};

use super::client::{PlayFabClient, RequestAuth};
use super::session::EntityTokenGrant;

const LOGIN_WITH_EMAIL: &str = "/Client/LoginWithEmailAddress";
const REGISTER_USER: &str = "/Client/RegisterPlayFabUser";
const LOGIN_WITH_CUSTOM_ID: &str = "/Client/LoginWithCustomID";
const SEND_RECOVERY_EMAIL: &str = "/Client/SendAccountRecoveryEmail";
const GET_ENTITY_TOKEN: &str = "/Authentication/GetEntityToken";
const INITIATE_UPLOADS: &str = "/File/InitiateFileUploads";
const FINALIZE_UPLOADS: &str = "/File/FinalizeFileUploads";
const GET_FILES: &str = "/File/GetFiles";
const DELETE_FILES: &str = "/File/DeleteFiles";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InfoRequestParameters {
    get_player_profile: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginWithEmailAddressRequest<'a> {
    title_id: &'a str,
    email: &'a str,
    password: &'a str,
    info_request_parameters: InfoRequestParameters,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegisterPlayFabUserRequest<'a> {
    title_id: &'a str,
    email: &'a str,
    password: &'a str,
    display_name: &'a str,
    require_both_username_and_email: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoginWithCustomIdRequest<'a> {
    title_id: &'a str,
    custom_id: &'a str,
    create_account: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendAccountRecoveryEmailRequest<'a> {
    email: &'a str,
    title_id: &'a str,
}

#[derive(Serialize)]
struct GetEntityTokenRequest {}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FileNamesRequest<'a> {
    entity: &'a EntityKey,
    file_names: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_version: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetFilesRequest<'a> {
    entity: &'a EntityKey,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EntityTokenResponse {
    entity_token: String,
    #[serde(default)]
    token_expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    entity: Option<EntityKey>,
}

impl EntityTokenResponse {
    fn into_grant(self) -> Option<EntityTokenGrant> {
        let entity = self.entity?;
        Some(EntityTokenGrant {
            token: Credential::new(self.entity_token),
            entity,
            expires_at: self.token_expiration,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlayerProfile {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InfoResultPayload {
    #[serde(default)]
    player_profile: Option<PlayerProfile>,
}

/// Shared shape of login and registration replies.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginResponse {
    play_fab_id: String,
    #[serde(default)]
    session_ticket: Option<String>,
    #[serde(default)]
    newly_created: bool,
    #[serde(default)]
    entity_token: Option<EntityTokenResponse>,
    #[serde(default)]
    info_result_payload: Option<InfoResultPayload>,
}

#[derive(Debug, Deserialize)]
struct EmptyResponse {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UploadDetail {
    file_name: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateFileUploadsResponse {
    #[serde(default)]
    profile_version: Option<i64>,
    #[serde(default)]
    upload_details: Vec<UploadDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetFileMetadata {
    #[serde(default)]
    checksum: Option<String>,
    download_url: String,
    #[serde(default)]
    size: u64,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetFilesResponse {
    #[serde(default)]
    metadata: Option<HashMap<String, GetFileMetadata>>,
    #[serde(default)]
    profile_version: Option<i64>,
}

/// PlayFab backend.
///
/// Implements both [`IdentityBackend`] and [`FileBackend`] over a single
/// [`PlayFabClient`], so credentials obtained by logging in are used by
/// the file calls that follow.
pub struct PlayFabBackend {
    client: Arc<PlayFabClient>,
}

impl PlayFabBackend {
    /// Create a backend for `title_id`, optionally against a custom endpoint.
    pub fn new(title_id: TitleId, endpoint: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: Arc::new(PlayFabClient::new(title_id, endpoint)?),
        })
    }

    /// The underlying API client.
    pub fn client(&self) -> &Arc<PlayFabClient> {
        &self.client
    }

    async fn start_session(&self, response: LoginResponse) -> LoginResult {
        let display_name = response
            .info_result_payload
            .and_then(|payload| payload.player_profile)
            .and_then(|profile| profile.display_name);
        let grant = response.entity_token.and_then(EntityTokenResponse::into_grant);

        self.client
            .session()
            .begin(response.session_ticket.map(Credential::new), grant)
            .await;

        LoginResult {
            playfab_id: response.play_fab_id,
            display_name,
            newly_created: response.newly_created,
        }
    }
}

#[async_trait]
impl IdentityBackend for PlayFabBackend {
    fn name(&self) -> &str {
        "playfab"
    }

    async fn login_with_email(
        &self,
        email: &str,
        password: &str,
        with_profile: bool,
    ) -> Result<LoginResult> {
        let request = LoginWithEmailAddressRequest {
            title_id: self.client.title_id().as_str(),
            email,
            password,
            info_request_parameters: InfoRequestParameters {
                get_player_profile: with_profile,
            },
        };
        let response: LoginResponse = self
            .client
            .post(LOGIN_WITH_EMAIL, &request, RequestAuth::None)
            .await?;
        Ok(self.start_session(response).await)
    }

    async fn register_with_email(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<LoginResult> {
        let request = RegisterPlayFabUserRequest {
            title_id: self.client.title_id().as_str(),
            email,
            password,
            display_name,
            require_both_username_and_email: false,
        };
        let response: LoginResponse = self
            .client
            .post(REGISTER_USER, &request, RequestAuth::None)
            .await?;
        let mut result = self.start_session(response).await;
        result.newly_created = true;
        Ok(result)
    }

    async fn login_with_custom_id(
        &self,
        custom_id: &str,
        create_account: bool,
    ) -> Result<LoginResult> {
        let request = LoginWithCustomIdRequest {
            title_id: self.client.title_id().as_str(),
            custom_id,
            create_account,
        };
        let response: LoginResponse = self
            .client
            .post(LOGIN_WITH_CUSTOM_ID, &request, RequestAuth::None)
            .await?;
        Ok(self.start_session(response).await)
    }

    async fn send_account_recovery_email(&self, email: &str) -> Result<()> {
        let request = SendAccountRecoveryEmailRequest {
            email,
            title_id: self.client.title_id().as_str(),
        };
        let _: EmptyResponse = self
            .client
            .post(SEND_RECOVERY_EMAIL, &request, RequestAuth::None)
            .await?;
        Ok(())
    }

    async fn get_entity_token(&self) -> Result<EntityKey> {
        let response: EntityTokenResponse = self
            .client
            .post(GET_ENTITY_TOKEN, &GetEntityTokenRequest {}, RequestAuth::SessionTicket)
            .await?;
        let grant = response.into_grant().ok_or_else(|| {
            Error::Serialization(format!("{} response has no entity", GET_ENTITY_TOKEN))
        })?;
        let entity = grant.entity.clone();
        self.client.session().update_entity_token(grant).await;
        Ok(entity)
    }

    async fn is_logged_in(&self) -> bool {
        self.client.session().is_active().await
    }

    async fn forget_credentials(&self) {
        self.client.session().clear().await;
    }
}

#[async_trait]
impl FileBackend for PlayFabBackend {
    async fn initiate_uploads(
        &self,
        entity: &EntityKey,
        names: &[String],
    ) -> Result<InitiatedUpload> {
        let request = FileNamesRequest {
            entity,
            file_names: names,
            profile_version: None,
        };
        let response: InitiateFileUploadsResponse = self
            .client
            .post(INITIATE_UPLOADS, &request, RequestAuth::EntityToken)
            .await?;

        Ok(InitiatedUpload {
            slots: response
                .upload_details
                .into_iter()
                .map(|detail| UploadSlot {
                    file_name: detail.file_name,
                    upload_url: detail.upload_url,
                })
                .collect(),
            profile_version: response.profile_version,
        })
    }

    async fn finalize_uploads(
        &self,
        entity: &EntityKey,
        names: &[String],
        profile_version: Option<i64>,
    ) -> Result<()> {
        let request = FileNamesRequest {
            entity,
            file_names: names,
            profile_version,
        };
        let _: serde_json::Value = self
            .client
            .post(FINALIZE_UPLOADS, &request, RequestAuth::EntityToken)
            .await?;
        Ok(())
    }

    async fn get_files(&self, entity: &EntityKey) -> Result<FileListing> {
        let response: GetFilesResponse = self
            .client
            .post(GET_FILES, &GetFilesRequest { entity }, RequestAuth::EntityToken)
            .await?;
        Ok(listing_from_response(response))
    }

    async fn delete_files(&self, entity: &EntityKey, names: &[String]) -> Result<()> {
        let request = FileNamesRequest {
            entity,
            file_names: names,
            profile_version: None,
        };
        let _: serde_json::Value = self
            .client
            .post(DELETE_FILES, &request, RequestAuth::EntityToken)
            .await?;
        Ok(())
    }
}

fn listing_from_response(response: GetFilesResponse) -> FileListing {
    let files = response
        .metadata
        .unwrap_or_default()
        .into_iter()
        .map(|(name, meta)| {
            (
                name,
                RemoteFile {
                    download_url: meta.download_url,
                    size: meta.size,
                    last_modified: meta.last_modified,
                    checksum: meta.checksum,
                },
            )
        })
        .collect();

    FileListing {
        files,
        profile_version: response.profile_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_wire_names() {
        let request = LoginWithEmailAddressRequest {
            title_id: "T1",
            email: "player@example.com",
            password: "abc123",
            info_request_parameters: InfoRequestParameters {
                get_player_profile: true,
            },
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["TitleId"], "T1");
        assert_eq!(json["Email"], "player@example.com");
        assert_eq!(json["InfoRequestParameters"]["GetPlayerProfile"], true);
    }

    #[test]
    fn test_register_request_does_not_require_username() {
        let request = RegisterPlayFabUserRequest {
            title_id: "T1",
            email: "player@example.com",
            password: "abc123",
            display_name: "Player_1",
            require_both_username_and_email: false,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["RequireBothUsernameAndEmail"], false);
        assert_eq!(json["DisplayName"], "Player_1");
    }

    #[test]
    fn test_file_request_omits_missing_profile_version() {
        let entity = EntityKey::new("E1", "title_player_account").unwrap();
        let names = vec!["save_001".to_string()];
        let request = FileNamesRequest {
            entity: &entity,
            file_names: &names,
            profile_version: None,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["Entity"]["Id"], "E1");
        assert_eq!(json["Entity"]["Type"], "title_player_account");
        assert_eq!(json["FileNames"][0], "save_001");
        assert!(json.get("ProfileVersion").is_none());
    }

    #[test]
    fn test_login_response_extracts_profile_and_entity() {
        let json = r#"{
            "PlayFabId": "ABC123",
            "SessionTicket": "ticket",
            "NewlyCreated": true,
            "EntityToken": {
                "EntityToken": "token",
                "TokenExpiration": "2030-01-01T00:00:00Z",
                "Entity": {"Id": "E1", "Type": "title_player_account", "TypeString": "title_player_account"}
            },
            "InfoResultPayload": {"PlayerProfile": {"DisplayName": "Hero"}}
        }"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.play_fab_id, "ABC123");
        assert!(response.newly_created);
        let grant = response.entity_token.unwrap().into_grant().unwrap();
        assert_eq!(grant.entity.id, "E1");
        assert_eq!(
            response
                .info_result_payload
                .unwrap()
                .player_profile
                .unwrap()
                .display_name
                .as_deref(),
            Some("Hero")
        );
    }

    #[test]
    fn test_get_files_response_mapping() {
        let json = r#"{
            "Entity": {"Id": "E1", "Type": "title_player_account"},
            "Metadata": {
                "save_001": {
                    "Checksum": "abc",
                    "DownloadUrl": "https://blob/save_001",
                    "FileName": "save_001",
                    "LastModified": "2024-01-01T10:00:00.000Z",
                    "Size": 42
                }
            },
            "ProfileVersion": 7
        }"#;
        let response: GetFilesResponse = serde_json::from_str(json).unwrap();
        let listing = listing_from_response(response);

        assert_eq!(listing.profile_version, Some(7));
        let file = &listing.files["save_001"];
        assert_eq!(file.size, 42);
        assert_eq!(file.download_url, "https://blob/save_001");
        assert_eq!(file.checksum.as_deref(), Some("abc"));
    }

    #[test]
    fn test_get_files_without_metadata_is_empty() {
        let response: GetFilesResponse =
            serde_json::from_str(r#"{"Entity": {"Id": "E1", "Type": "title_player_account"}}"#)
                .unwrap();
        assert!(listing_from_response(response).files.is_empty());
    }

    #[tokio::test]
    async fn test_file_calls_require_entity_token() {
        let backend = PlayFabBackend::new(TitleId::new("T1").unwrap(), None).unwrap();
        let entity = EntityKey::new("E1", "title_player_account").unwrap();

        let result = backend.get_files(&entity).await;
        assert!(matches!(result, Err(Error::NotAuthenticated(_))));
    }

    #[tokio::test]
    async fn test_forget_credentials_without_session() {
        let backend = PlayFabBackend::new(TitleId::new("T1").unwrap(), None).unwrap();
        assert!(!backend.is_logged_in().await);
        backend.forget_credentials().await;
        assert!(!backend.is_logged_in().await);
    }
}
