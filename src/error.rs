use wasm_bindgen::JsValue;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Failure reported by the hosted backend, message kept verbatim.
    #[error("{message}")]
    Backend { message: String },

    #[error("Javascript error {0}")]
    Js(String),

    #[error("Decode error {0}")]
    Decode(String),

    #[error("Missing configuration {0}")]
    MissingConfig(&'static str),

    #[error("Url error {0}")]
    Url(#[from] url::ParseError),

    #[error("Email and password are required")]
    MissingCredentials,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

impl From<JsValue> for Error {
    fn from(value: JsValue) -> Self {
        let message = value
            .as_string()
            .or_else(|| {
                js_sys::Reflect::get(&value, &JsValue::from_str("message"))
                    .ok()
                    .and_then(|message| message.as_string())
            })
            .unwrap_or_else(|| format!("{value:?}"));
        Self::Js(message)
    }
}

impl From<serde_wasm_bindgen::Error> for Error {
    fn from(value: serde_wasm_bindgen::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
