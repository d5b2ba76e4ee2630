//! Central error taxonomy (`spec.md` §7). One variant per named kind; the
//! `Responder` impl maps each to the HTTP status the `http` module should
//! return, mirroring the teacher's `rocket_util::Error`-derived enums
//! (`cal::Error`, `http::PageError`) without depending on the fork crate
//! that derive ships from.

use rocket::{
    Request,
    http::Status,
    response::{self, Responder},
    serde::json::Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("upstream returned 401 and re-authentication failed")]
    AuthExpired,

    #[error("upstream rejected the request: {status} {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("token acquisition failed: {0}")]
    TokenAcquisitionFailed(String),

    #[error("refresh rate limited, retry after {retry_after_secs}s")]
    RefreshRateLimited { retry_after_secs: u64 },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// A read that required data found the store empty (`spec.md` §7's
    /// `SnapshotEmpty`). Not a variant of its own: callers surface it as an
    /// empty result plus a `stale=true` hint rather than an error, per spec,
    /// so this is a helper rather than something that ever gets raised.
    pub fn is_fatal_for_scrape(&self) -> bool {
        !matches!(self, Self::RefreshRateLimited { .. } | Self::InvalidFilter(_))
    }

    fn status(&self) -> Status {
        match self {
            Self::StoreUnavailable(_) => Status::ServiceUnavailable,
            Self::AuthExpired | Self::TokenAcquisitionFailed(_) => Status::BadGateway,
            Self::UpstreamRejected { .. } | Self::UpstreamUnreachable(_) => Status::BadGateway,
            Self::RefreshRateLimited { .. } => Status::TooManyRequests,
            Self::InvalidFilter(_) => Status::BadRequest,
            Self::Sql(_) => Status::ServiceUnavailable,
            Self::Reqwest(_) => Status::BadGateway,
            Self::UrlParse(_) => Status::BadRequest,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl Error {
    fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::AuthExpired => "AuthExpired",
            Self::UpstreamRejected { .. } => "UpstreamRejected",
            Self::UpstreamUnreachable(_) => "UpstreamUnreachable",
            Self::TokenAcquisitionFailed(_) => "TokenAcquisitionFailed",
            Self::RefreshRateLimited { .. } => "RefreshRateLimited",
            Self::InvalidFilter(_) => "InvalidFilter",
            Self::Sql(_) => "StoreUnavailable",
            Self::Reqwest(_) => "UpstreamUnreachable",
            Self::UrlParse(_) => "InvalidFilter",
        }
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let retry_after = if let Self::RefreshRateLimited { retry_after_secs } = &self {
            Some(*retry_after_secs)
        } else {
            None
        };
        let body = ErrorBody { kind: self.kind(), message: self.to_string() };
        let mut response = Json(body).respond_to(request)?;
        response.set_status(status);
        if let Some(secs) = retry_after {
            response.set_raw_header("Retry-After", secs.to_string());
        }
        Ok(response)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
