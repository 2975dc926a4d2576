/// Router Module Index
///
/// Organizes the routes by the access class the gatekeeper assigns to their paths. The
/// gatekeeper itself is a single layer over the whole router (see `create_router`); this
/// split keeps the route table readable and makes it obvious which handlers may assume a
/// `CurrentIdentity`.

/// Routes whose paths are on the public list. No session is looked up for them.
pub mod public;

/// Routes that require any active, logged-in account.
pub mod authenticated;

/// Routes whose paths are on the admin lists.
pub mod admin;
