/// Router Module Index
///
/// Routes are grouped by audience so access control is attached once per group as an Axum
/// layer instead of inside every handler.

/// Country-filtered delivery routes and login. No authentication.
pub mod public;

/// Routes that need any valid bearer token.
pub mod authenticated;

/// The `/api/admin` tree. Wrapped in the admin middleware by `create_router`.
pub mod admin;
