#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// Reading the response body failed mid-stream.
#[derive(Debug, PartialEq, Eq)]
pub struct BodyError(pub String);

/// The bytes of a streamed response, as they arrive.
pub enum Body {
    Http(Response),
    #[cfg(test)]
    Canned(VecDeque<Bytes>),
}

impl From<Response> for Body {
    #[inline]
    fn from(response: Response) -> Self {
        Body::Http(response)
    }
}

impl Body {
    /// Returns the next piece of the body, or `None` at its end.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, BodyError> {
        match self {
            Body::Http(response) => response
                .chunk()
                .await
                .map_err(|err| BodyError(err.to_string())),
            #[cfg(test)]
            Body::Canned(chunks) => Ok(chunks.pop_front()),
        }
    }
}
