use super::handlers::{health, resend};
use utoipa::openapi::{Contact, License, Tag};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(health::health, resend::resend_verification),
    components(schemas(
        health::Health,
        resend::ResendRequest,
        resend::ResendResponse,
        resend::ErrorBody
    ))
)]
struct ApiDoc;

/// `OpenAPI` document for the served endpoints, with info taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut openapi = ApiDoc::openapi();

    openapi.info.title = env!("CARGO_PKG_NAME").to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    openapi.info.contact = cargo_contact();
    openapi.info.license = cargo_license();

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and build information".to_string());

    let mut verification_tag = Tag::new("verification");
    verification_tag.description = Some("Email verification resend".to_string());

    openapi.tags = Some(vec![health_tag, verification_tag]);
    openapi
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

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

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}
