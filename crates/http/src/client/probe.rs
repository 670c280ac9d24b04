//! Role authorization probes

use super::{ApiRequest, ClientError, MoimClient};
use crate::types::{ProbeRole, WhoAmI};

impl MoimClient {
    /// Call `/test/{role}`; succeeds only if the current user holds `role`
    pub async fn probe(&self, role: ProbeRole) -> Result<String, ClientError> {
        self.execute_text(ApiRequest::get(format!("/test/{role}")))
            .await
    }

    /// Who the server thinks we are
    pub async fn me(&self) -> Result<WhoAmI, ClientError> {
        self.execute(ApiRequest::get("/test/me")).await
    }
}
