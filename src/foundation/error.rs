pub type StripfxResult<T> = Result<T, StripfxError>;

#[derive(thiserror::Error, Debug)]
pub enum StripfxError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("font error: {0}")]
    Font(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StripfxError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            StripfxError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(StripfxError::render("x").to_string().contains("render error:"));
        assert!(StripfxError::font("x").to_string().contains("font error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = StripfxError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
