//! Meeting API client methods

use super::{ApiRequest, ClientError, MoimClient};
use crate::types::{MeetingCreateRequest, MeetingDetail};

impl MoimClient {
    /// Create a meeting, returning its id
    pub async fn create_meeting(&self, request: &MeetingCreateRequest) -> Result<i64, ClientError> {
        let req = ApiRequest::post("/meetings").json(request)?;
        self.execute(req).await
    }

    /// List meetings
    pub async fn list_meetings(&self) -> Result<Vec<MeetingDetail>, ClientError> {
        self.execute(ApiRequest::get("/meetings")).await
    }

    /// Get a meeting by id
    pub async fn get_meeting(&self, id: i64) -> Result<MeetingDetail, ClientError> {
        self.execute(ApiRequest::get(format!("/meetings/{id}"))).await
    }
}
