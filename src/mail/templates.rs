use serde::Serialize;

const BRAND: &str = "Eventor";

/// Transactional templates and their variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "template", rename_all = "camelCase")]
pub enum MailTemplate {
    #[serde(rename_all = "camelCase")]
    ReserveEvent { event: String, event_link: String },
    ForgotPassword { link: String },
}

impl MailTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            MailTemplate::ReserveEvent { .. } => "reserveEvent",
            MailTemplate::ForgotPassword { .. } => "forgotPassword",
        }
    }

    pub fn render_html(&self) -> String {
        let body = match self {
            MailTemplate::ReserveEvent { event, event_link } => format!(
                r#"<h2 style="color: #2563eb;">You're in!</h2>
        <p>Your seat for <strong>{event}</strong> is reserved.</p>
        <p style="margin: 30px 0;">
            <a href="{event_link}"
               style="display: inline-block; background-color: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">
                View event
            </a>
        </p>"#,
                event = escape(event),
                event_link = escape(event_link),
            ),
            MailTemplate::ForgotPassword { link } => format!(
                r#"<h2 style="color: #dc2626;">Reset your password</h2>
        <p>Click the link below to choose a new password. The link expires in 24 hours.</p>
        <p style="margin: 30px 0;">
            <a href="{link}"
               style="display: inline-block; background-color: #dc2626; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">
                Reset password
            </a>
        </p>
        <p style="color: #666; font-size: 14px;">
            If you didn't request this email, you can safely ignore it.
        </p>"#,
                link = escape(link),
            ),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <p style="font-weight: bold;">{BRAND}</p>
        {body}
        <p style="color: #666; font-size: 12px; margin-top: 40px;">Sent by {BRAND}</p>
    </div>
</body>
</html>"#
        )
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_names() {
        let reserve = MailTemplate::ReserveEvent {
            event: "Rust meetup".into(),
            event_link: "http://localhost:3000/events/1".into(),
        };
        assert_eq!(reserve.name(), "reserveEvent");
        assert_eq!(
            MailTemplate::ForgotPassword { link: String::new() }.name(),
            "forgotPassword"
        );
    }

    #[test]
    fn variables_are_escaped_into_the_body() {
        let html = MailTemplate::ReserveEvent {
            event: "<Rust & friends>".into(),
            event_link: "http://localhost:3000/events/1".into(),
        }
        .render_html();

        assert!(html.contains("&lt;Rust &amp; friends&gt;"));
        assert!(html.contains("http://localhost:3000/events/1"));
    }

    #[test]
    fn serializes_variables_with_template_tag() {
        let json = serde_json::to_value(MailTemplate::ReserveEvent {
            event: "Rust meetup".into(),
            event_link: "x".into(),
        })
        .unwrap();
        assert_eq!(json["template"], "reserveEvent");
        assert_eq!(json["eventLink"], "x");
    }
}
