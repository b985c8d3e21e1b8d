use axum::{
    extract::Query,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::{DataResponse, Markdown};
use crate::domain::assessment::{ParseReportRequest, ReportFormatQuery};
use crate::error::{ApiError, ApiResult};
use crate::parser::{parse_report, project, render_markdown};

/// Structure arbitrary response text.
///
/// POST /reports/parse[?format=markdown]
pub async fn parse(
    Query(query): Query<ReportFormatQuery>,
    Json(req): Json<ParseReportRequest>,
) -> ApiResult<Response> {
    let sections = parse_report(&req.text);
    let view = project(&req.text, &sections);

    match query.format.as_deref() {
        None | Some("json") => Ok(DataResponse::new(view).into_response()),
        Some("markdown") => Ok(Markdown(render_markdown(&view)).into_response()),
        Some(other) => Err(ApiError::BadRequest(format!(
            "Unsupported format: {}",
            other
        ))),
    }
}
