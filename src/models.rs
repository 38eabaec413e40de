use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ImagesQuery {
    pub url: Option<String>,
}

/// One image that passed the size policy, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub src: String,
}

/// Raw `<img>` record read from the rendered DOM, before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedImage {
    pub src: String,
    pub natural_width: u32,
    pub natural_height: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
