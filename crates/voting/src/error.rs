// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    InvalidInput(String),
    InvalidConfig(String),
    InvalidShape(String),
    ResizeImageBuffer(fast_image_resize::ImageBufferError),
    Resize(fast_image_resize::ResizeError),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::InvalidShape(format!("{err}"))
    }
}

impl From<fast_image_resize::ImageBufferError> for Error {
    fn from(err: fast_image_resize::ImageBufferError) -> Self {
        Error::ResizeImageBuffer(err)
    }
}

impl From<fast_image_resize::ResizeError> for Error {
    fn from(err: fast_image_resize::ResizeError) -> Self {
        Error::Resize(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::InvalidShape(msg) => write!(f, "Invalid shape: {}", msg),
            Error::ResizeImageBuffer(e) => write!(f, "Resize image buffer error: {}", e),
            Error::Resize(e) => write!(f, "Resize error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Yaml(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ResizeImageBuffer(e) => Some(e),
            Error::Resize(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Yaml(e) => Some(e),
            _ => None,
        }
    }
}
