//! Authentication API client methods

use super::{ApiRequest, ClientError, MoimClient};
use crate::types::{LoginRequest, MessageResponse, RegisterRequest, TokenResponse};
use tracing::info;

impl MoimClient {
    /// Exchange credentials for an access token and store it
    ///
    /// The server also sets the refresh cookie used by later reissues.
    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, ClientError> {
        let req = ApiRequest::post("/auth/login").json(&request)?;
        let response: TokenResponse = self.execute(req).await?;

        let token = response.access_token().ok_or(ClientError::MissingToken)?;
        self.store.set(token);
        info!("Logged in");
        Ok(response)
    }

    /// Create an account
    pub async fn register(&self, request: RegisterRequest) -> Result<MessageResponse, ClientError> {
        let req = ApiRequest::post("/auth/register").json(&request)?;
        self.execute(req).await
    }

    /// Reissue the access token now instead of waiting for a 401
    ///
    /// Failure expires the session exactly like an automatic reissue.
    pub async fn reissue(&self) -> Result<String, ClientError> {
        self.renew(self.refresh.epoch()).await
    }

    /// Invalidate the session on the server and drop the local token
    ///
    /// The local token is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<String, ClientError> {
        let result = self.execute_text(ApiRequest::post("/auth/logout")).await;
        self.store.clear();
        info!("Logged out");
        result
    }
}
