//! Announcement templating
//!
//! Announcements are rendered by a [`TemplateRenderer`]. The bundled
//! [`FieldTemplateRenderer`] understands field actions only:
//!
//! ```text
//! {{.User}} is live: {{ .StreamTitle }} ({{.URL}})
//! ```

use std::collections::BTreeMap;
use streamwatch_types::MemberFact;

const ZERO_WIDTH_SPACE: char = '\u{200b}';

/// Template errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// `{{` without a closing `}}`
    #[error("unterminated action at byte {0}")]
    Unterminated(usize),

    /// Action is not a `.Field` reference
    #[error("unsupported action: {0}")]
    Unsupported(String),

    /// Field is not in the context
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Neutralise `@everyone` and `@here` so announcements cannot mass-ping
#[must_use]
pub fn escape_special_mentions(text: &str) -> String {
    text.replace("@everyone", &format!("@{ZERO_WIDTH_SPACE}everyone"))
        .replace("@here", &format!("@{ZERO_WIDTH_SPACE}here"))
}

/// Named values available to a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    data: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Announcement context for a streaming member
    ///
    /// Fields: `URL`, `url`, `Game`, `StreamTitle`, `User` (a mention) and
    /// `UserName`. Member-controlled values are escaped.
    #[must_use]
    pub fn for_member(member: &MemberFact) -> Self {
        let activity = member.activity.clone().unwrap_or_default();
        let url = escape_special_mentions(&activity.url);
        let user_name = member
            .display_name
            .as_deref()
            .map_or_else(|| member.member_id.to_string(), escape_special_mentions);

        Self::new()
            .with("URL", url.clone())
            .with("url", url)
            .with("Game", escape_special_mentions(&activity.details))
            .with("StreamTitle", escape_special_mentions(&activity.name))
            .with("User", format!("<@{}>", member.member_id))
            .with("UserName", user_name)
    }

    /// With an extra field
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    /// Field value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Renders announcement templates
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` against `ctx`
    ///
    /// # Errors
    /// Renderer-specific; the dispatcher logs and skips the announcement.
    fn render(&self, ctx: &TemplateContext, template: &str) -> Result<String, TemplateError>;
}

/// `{{.Field}}` substitution renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldTemplateRenderer;

impl FieldTemplateRenderer {
    /// Create renderer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for FieldTemplateRenderer {
    fn render(&self, ctx: &TemplateContext, template: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let body_start = start + 2;
            let Some(len) = rest[body_start..].find("}}") else {
                return Err(TemplateError::Unterminated(offset + start));
            };

            let action = rest[body_start..body_start + len].trim();
            let field = action
                .strip_prefix('.')
                .filter(|f| !f.is_empty() && f.chars().all(|c| c.is_alphanumeric() || c == '_'))
                .ok_or_else(|| TemplateError::Unsupported(action.to_string()))?;
            let value = ctx
                .get(field)
                .ok_or_else(|| TemplateError::UnknownField(field.to_string()))?;
            out.push_str(value);

            let consumed = body_start + len + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
