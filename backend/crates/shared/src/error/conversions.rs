//! HTTP conversion for [`AppError`] (behind the `axum` feature)

#[cfg(feature = "axum")]
mod response {
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use serde::Serialize;

    use crate::error::app_error::AppError;

    /// RFC 7807 problem body
    #[derive(Serialize)]
    struct Problem<'a> {
        #[serde(rename = "type")]
        problem_type: String,
        title: &'static str,
        status: u16,
        detail: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<&'a str>,
    }

    impl<'a> From<&'a AppError> for Problem<'a> {
        fn from(err: &'a AppError) -> Self {
            Self {
                problem_type: format!("https://httpstatuses.io/{}", err.status_code()),
                title: err.kind().as_str(),
                status: err.status_code(),
                detail: err.message(),
                action: err.action(),
            }
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status =
                StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(Problem::from(&self))).into_response()
        }
    }

}
