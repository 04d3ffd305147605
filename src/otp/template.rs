//! Placeholder substitution for OTP messages.
//!
//! Bodies must carry `{{code}}` and `{{purpose}}` exactly once each. Rendering is one left to
//! right scan, so substituted values are never scanned again.

use thiserror::Error;

use super::Purpose;
use crate::delivery::EmailMessage;

pub const CODE_PLACEHOLDER: &str = "{{code}}";
pub const PURPOSE_PLACEHOLDER: &str = "{{purpose}}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Subject must not be empty")]
    EmptySubject,
    #[error("The {body} template must contain {placeholder} exactly once (found {found})")]
    Placeholder {
        body: &'static str,
        placeholder: &'static str,
        found: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    subject: String,
    html: String,
    text: String,
}

impl Template {
    /// Build a caller-supplied template.
    ///
    /// # Errors
    /// Returns `TemplateError` when the subject is blank or a body does not carry each
    /// placeholder exactly once.
    pub fn new(
        subject: impl Into<String>,
        html: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let template = Self {
            subject: subject.into(),
            html: html.into(),
            text: text.into(),
        };
        if template.subject.trim().is_empty() {
            return Err(TemplateError::EmptySubject);
        }
        check_placeholders("html", &template.html)?;
        check_placeholders("text", &template.text)?;
        Ok(template)
    }

    /// Built-in template for a purpose.
    #[must_use]
    pub fn default_for(purpose: Purpose) -> Self {
        let (subject, intro) = match purpose {
            Purpose::Login => ("Your SporeHub sign-in code", "Use this code to sign in."),
            Purpose::PasswordReset => (
                "Reset your SporeHub password",
                "Use this code to choose a new password.",
            ),
            Purpose::Verification => (
                "Verify your SporeHub email",
                "Use this code to confirm your email address.",
            ),
            Purpose::Registration => (
                "Finish your SporeHub registration",
                "Use this code to finish creating your account.",
            ),
        };
        Self {
            subject: subject.to_string(),
            html: format!(
                "<p>{intro}</p><p>Your {PURPOSE_PLACEHOLDER} code is \
                 <strong>{CODE_PLACEHOLDER}</strong>.</p>\
                 <p>If you did not request it, you can ignore this email.</p>"
            ),
            text: format!(
                "{intro}\n\nYour {PURPOSE_PLACEHOLDER} code is {CODE_PLACEHOLDER}.\n\n\
                 If you did not request it, you can ignore this email."
            ),
        }
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Render the message for `to`.
    #[must_use]
    pub fn render(&self, to: &str, code: &str, purpose: Purpose) -> EmailMessage {
        let label = purpose.label();
        EmailMessage {
            to: to.to_string(),
            subject: substitute(&self.subject, code, label),
            html: substitute(&self.html, code, label),
            text: substitute(&self.text, code, label),
        }
    }
}

fn check_placeholders(body: &'static str, template: &str) -> Result<(), TemplateError> {
    for placeholder in [CODE_PLACEHOLDER, PURPOSE_PLACEHOLDER] {
        let found = template.matches(placeholder).count();
        if found != 1 {
            return Err(TemplateError::Placeholder {
                body,
                placeholder,
                found,
            });
        }
    }
    Ok(())
}

fn substitute(template: &str, code: &str, label: &str) -> String {
    let mut out = String::with_capacity(template.len() + code.len() + label.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix(CODE_PLACEHOLDER) {
            out.push_str(code);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(PURPOSE_PLACEHOLDER) {
            out.push_str(label);
            rest = after;
        } else {
            // Advance one brace so a placeholder starting inside a brace run still matches.
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_placeholders() {
        let template = Template::new(
            "Code for {{purpose}}",
            "<b>{{code}}</b> for {{purpose}}",
            "{{purpose}}: {{code}}",
        )
        .expect("valid template");
        let message = template.render("a@b.com", "482913", Purpose::PasswordReset);
        assert_eq!(message.to, "a@b.com");
        assert_eq!(message.subject, "Code for password reset");
        assert_eq!(message.html, "<b>482913</b> for password reset");
        assert_eq!(message.text, "password reset: 482913");
    }

    #[test]
    fn rejects_missing_or_repeated_placeholders() {
        let missing = Template::new("s", "no code here {{purpose}}", "{{code}} {{purpose}}");
        assert_eq!(
            missing,
            Err(TemplateError::Placeholder {
                body: "html",
                placeholder: CODE_PLACEHOLDER,
                found: 0,
            })
        );

        let repeated = Template::new("s", "{{code}} {{purpose}}", "{{code}} {{code}} {{purpose}}");
        assert_eq!(
            repeated,
            Err(TemplateError::Placeholder {
                body: "text",
                placeholder: CODE_PLACEHOLDER,
                found: 2,
            })
        );

        assert_eq!(
            Template::new("  ", "{{code}}{{purpose}}", "{{code}}{{purpose}}"),
            Err(TemplateError::EmptySubject)
        );
    }

    #[test]
    fn substitution_is_single_pass() {
        // A label or code that looks like a placeholder must stay literal.
        assert_eq!(
            substitute("{{code}}|{{purpose}}", "{{purpose}}", "{{code}}"),
            "{{purpose}}|{{code}}"
        );
        assert_eq!(substitute("{{other}} {{code}}", "1", "x"), "{{other}} 1");
        assert_eq!(substitute("trailing {{", "1", "x"), "trailing {{");
        assert_eq!(substitute("Code {{{code}}}", "1", "x"), "Code {1}");
        assert_eq!(substitute("{{{{purpose}}", "1", "x"), "{{x");
    }

    #[test]
    fn braced_placeholders_are_rendered() {
        let template = Template::new(
            "Code",
            "Code {{{code}}} for {{{{purpose}}",
            "{{{code}}} {{purpose}}",
        )
        .expect("exactly one of each placeholder");
        let message = template.render("a@b.com", "482913", Purpose::Login);
        assert_eq!(message.html, "Code {482913} for {{login");
        assert_eq!(message.text, "{482913} login");
    }

    #[test]
    fn default_templates_are_valid_for_every_purpose() {
        for purpose in Purpose::ALL {
            let template = Template::default_for(purpose);
            let checked = Template::new(
                template.subject.clone(),
                template.html.clone(),
                template.text.clone(),
            );
            assert_eq!(checked.as_ref(), Ok(&template), "{purpose}");

            let message = template.render("a@b.com", "123456", purpose);
            assert!(message.text.contains("123456"));
            assert!(message.html.contains(purpose.label()));
        }
    }
}
