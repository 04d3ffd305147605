use super::handlers::{admin, health, me, messaging, otp};
use utoipa::openapi::{
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Routes open to anyone.
pub(crate) fn public_routes() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(health::health))
}

/// Unauthenticated routes counted against the admission window.
pub(crate) fn admitted_routes() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(otp::request_otp))
        .routes(routes!(otp::verify_otp))
}

/// Routes for any authenticated caller.
pub(crate) fn member_routes() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(me::me))
}

/// Routes restricted to the admin role.
pub(crate) fn admin_routes() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(admin::issue_otp))
        .routes(routes!(admin::resend_otp))
        .routes(routes!(admin::admission_status))
        .routes(routes!(messaging::send_email))
        .routes(routes!(messaging::send_chat))
}

/// Every documented route in one router, used for the `OpenAPI` document.
///
/// The server serves the same groups but wraps each with its own gate.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .merge(public_routes())
        .merge(admitted_routes())
        .merge(member_routes())
        .merge(admin_routes());

    let tags = [
        ("health", "Service health"),
        ("otp", "One-time code request and verification"),
        ("identity", "Authenticated caller"),
        ("admin", "Admin-only OTP and admission operations"),
        ("messaging", "Direct email and chat delivery"),
    ]
    .into_iter()
    .map(|(name, description)| {
        let mut tag = Tag::new(name);
        tag.description = Some(description.to_string());
        tag
    })
    .collect();

    let openapi = router.get_openapi_mut();
    openapi.tags = Some(tags);
    openapi
        .components
        .get_or_insert_with(Components::new)
        .add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            optional_str(name),
            optional_str(email.trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact.expect("contact from Cargo authors");
        assert_eq!(contact.name.as_deref(), Some("Team Sporehub"));
        assert_eq!(contact.email.as_deref(), Some("team@sporehub.dev"));

        let license = spec.info.license.expect("license from Cargo metadata");
        assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
    }

    #[test]
    fn openapi_documents_every_route() {
        let spec = openapi();
        for path in [
            "/health",
            "/v1/otp/request",
            "/v1/otp/verify",
            "/api/v1/me",
            "/api/v1/otp/issue",
            "/api/v1/otp/resend",
            "/api/v1/mailer/send",
            "/api/v1/whatsapp/send",
            "/api/v1/admin/admission",
        ] {
            assert!(spec.paths.paths.contains_key(path), "{path}");
        }
        let tags = spec.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "otp"));
        let schemes = spec.components.map(|c| c.security_schemes).unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
    }

    #[test]
    fn parse_author_splits_name_and_email() {
        assert_eq!(
            parse_author("Team Sporehub <team@sporehub.dev>"),
            (Some("Team Sporehub"), Some("team@sporehub.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author(""), (None, None));
    }
}
