//! Rendering the token into outbound markup.

use crate::token::CsrfToken;
use formguard_core::escape_attribute;
use std::fmt;

/// Hidden form input carrying the authenticity token.
///
/// ```
/// use formguard_csrf::{CsrfToken, HiddenField};
///
/// let field = HiddenField::new("authenticity_token", &CsrfToken::new("abc"));
/// assert_eq!(
///     field.to_html(),
///     r#"<input type="hidden" name="authenticity_token" value="abc" autocomplete="off">"#
/// );
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct HiddenField {
    pub name: String,
    pub value: String,
}

impl HiddenField {
    pub fn new(name: impl Into<String>, token: &CsrfToken) -> Self {
        Self {
            name: name.into(),
            value: token.as_str().to_string(),
        }
    }

    /// `(name, value)` pair for building urlencoded bodies.
    pub fn as_pair(&self) -> (&str, &str) {
        (&self.name, &self.value)
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}" autocomplete="off">"#,
            escape_attribute(&self.name),
            escape_attribute(&self.value)
        )
    }
}

impl fmt::Display for HiddenField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

impl fmt::Debug for HiddenField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HiddenField")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// `<meta>` pair exposing the field name and token to scripts that submit
/// forms themselves and echo the token in a header.
#[derive(Clone)]
pub struct MetaTags {
    pub param: String,
    pub token: String,
}

impl MetaTags {
    pub fn new(param: impl Into<String>, token: &CsrfToken) -> Self {
        Self {
            param: param.into(),
            token: token.as_str().to_string(),
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            "<meta name=\"csrf-param\" content=\"{}\">\n<meta name=\"csrf-token\" content=\"{}\">",
            escape_attribute(&self.param),
            escape_attribute(&self.token)
        )
    }
}

impl fmt::Display for MetaTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}
