//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the QRCert verification API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{EnrollResponse, HealthResponse, ReadyResponse, VerifyResponse};

/// QRCert API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "QRCert - Certificate Verification API",
        version = "0.1.0",
        description = r#"
## Hospital Certificate QR Verification

QRCert decides whether an uploaded certificate image is genuine:

1. **Enroll** the genuine certificate image once via `POST /enroll`
2. **Verify** uploads via `POST /verify`
3. Any byte-level change to the image is reported as `tampered`
4. Otherwise the QR code's URL is checked against known-good URLs,
   shortened links are followed, and a classifier labels the URL `real` or `fake`
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Enrollment", description = "Register the reference certificate image"),
        (name = "Verification", description = "Verify uploaded certificate images"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::enroll::enroll_handler,
        crate::handlers::verify::verify_handler,
    ),
    components(schemas(EnrollResponse, HealthResponse, ReadyResponse, VerifyResponse)),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the bearer scheme used by the enrollment endpoint.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
