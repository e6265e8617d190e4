use diesel::{ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl};

use crate::database::models::CREATOR_APPROVED;

/// Read-only projection of the creator-approval subsystem. Gift transfer only
/// checks it; applications and reviews live elsewhere.
pub fn is_approved_creator(conn: &mut PgConnection, req_user_id: &str) -> Result<bool, diesel::result::Error> {
    use crate::schema::creator_profiles::dsl::*;
    creator_profiles
        .filter(user_id.eq(req_user_id))
        .select(status)
        .first::<String>(conn)
        .optional()
        .map(|s| s.as_deref() == Some(CREATOR_APPROVED))
}
