use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::str::FromStr;

use crate::ApiError;

/// Response encoding selected by the path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bin,
    Hex,
    Json,
}

impl FromStr for Format {
    type Err = ApiError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        match ext {
            "bin" => Ok(Format::Bin),
            "hex" => Ok(Format::Hex),
            "json" => Ok(Format::Json),
            other => Err(ApiError::BadRequest(format!("Invalid extension: {other}"))),
        }
    }
}

impl Format {
    /// Encode `data` for this format. JSON bodies are not served.
    pub fn respond(self, data: impl AsRef<[u8]>) -> Result<Response, ApiError> {
        match self {
            Format::Bin => Ok((
                [(header::CONTENT_TYPE, "application/octet-stream")],
                data.as_ref().to_vec(),
            )
                .into_response()),
            Format::Hex => Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                hex::encode(data),
            )
                .into_response()),
            Format::Json => Err(ApiError::NotImplemented),
        }
    }
}

/// Split `{id}.{ext}` at the last dot. The extension is only parsed once the
/// data is found, so a bad identifier is reported before a bad extension.
pub fn split_extension(segment: &str) -> Result<(&str, &str), ApiError> {
    segment.rsplit_once('.').ok_or(ApiError::NoRoute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert!(matches!(split_extension("abc.bin"), Ok(("abc", "bin"))));
        assert!(matches!(split_extension("1.2.hex"), Ok(("1.2", "hex"))));
        assert!(matches!(split_extension("abc"), Err(ApiError::NoRoute)));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("bin".parse::<Format>().unwrap(), Format::Bin);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert!(matches!(
            "xml".parse::<Format>(),
            Err(ApiError::BadRequest(message)) if message == "Invalid extension: xml"
        ));
    }
}
