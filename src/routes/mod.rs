/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// so access control is applied explicitly at the module level (via Axum
/// layers) rather than rediscovered per handler. Everything except the root
/// health check is mounted under the `/api/v1` prefix.

/// Routes accessible without a session: health, the credential gateway
/// (login/register) and the read-only mood catalog.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated bearer token.
pub mod authenticated;
