use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        ComponentInfo,
        LegacyId,
        RegistrationValidation,
        UnregistrationValidation,
        UserId,
        PHASE_STATUS_OPEN,
        PROJECT_INFO_COMPONENT_ID,
        PROJECT_INFO_FORUM_CATEGORY,
        REGISTRATION_PHASE_TYPE_ID,
        SUBMITTER_LEGACY_ROLE_ID,
    },
    traits::NewComponentInquiry,
};
use super::sequences;

pub async fn check_user_activated(user_id: UserId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let activated: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user WHERE user_id = $1 AND status = 'A')")
            .bind(user_id)
            .fetch_one(conn)
            .await?;
    Ok(activated)
}

pub async fn user_handle(user_id: UserId, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let handle = sqlx::query_scalar("SELECT handle FROM user WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(handle)
}

/// Returns `Some(is_studio)` when the challenge is present in the legacy store.
pub async fn challenge_exists(project_id: LegacyId, conn: &mut SqliteConnection) -> Result<Option<bool>, sqlx::Error> {
    let studio: Option<bool> =
        sqlx::query_scalar("SELECT project_studio_spec_id IS NOT NULL FROM project WHERE project_id = $1")
            .bind(project_id)
            .fetch_optional(conn)
            .await?;
    Ok(studio)
}

pub async fn challenge_group_restrictions(
    project_id: LegacyId,
    conn: &mut SqliteConnection,
) -> Result<Vec<i64>, sqlx::Error> {
    let groups = sqlx::query_scalar("SELECT group_id FROM contest_eligibility WHERE contest_id = $1")
        .bind(project_id)
        .fetch_all(conn)
        .await?;
    Ok(groups)
}

pub async fn user_in_any_group(
    user_id: UserId,
    groups: &[i64],
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    if groups.is_empty() {
        return Ok(false);
    }
    let mut builder = QueryBuilder::new("SELECT EXISTS(SELECT 1 FROM user_group_xref WHERE login_id = ");
    builder.push_bind(user_id);
    builder.push(" AND group_id IN (");
    let mut group_list = builder.separated(", ");
    for group in groups {
        group_list.push_bind(*group);
    }
    builder.push("))");
    let found: bool = builder.build_query_scalar().fetch_one(conn).await?;
    Ok(found)
}

/// Assembles every registration pre-check in one round trip per concern.
pub async fn validate_registration(
    project_id: LegacyId,
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<RegistrationValidation, sqlx::Error> {
    let project_category_id: i64 = sqlx::query_scalar("SELECT project_category_id FROM project WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(&mut *conn)
        .await?;
    let registration_open: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM project_phase WHERE project_id = $1 AND phase_type_id = $2 AND phase_status_id = $3)",
    )
    .bind(project_id)
    .bind(REGISTRATION_PHASE_TYPE_ID)
    .bind(PHASE_STATUS_OPEN)
    .fetch_one(&mut *conn)
    .await?;
    let user_registered: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM resource WHERE project_id = $1 AND user_id = $2 AND resource_role_id = $3)",
    )
    .bind(project_id)
    .bind(user_id)
    .bind(SUBMITTER_LEGACY_ROLE_ID)
    .fetch_one(&mut *conn)
    .await?;
    let user_row: Option<(bool, Option<String>)> =
        sqlx::query_as("SELECT suspended <> 0, country_name FROM user WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    let (user_suspended, country) = user_row.unwrap_or((false, None));
    let user_country_missing = country.as_deref().map_or(true, |c| c.trim().is_empty());
    let user_country_banned = match &country {
        Some(c) => {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM banned_country WHERE country_name = $1)")
                .bind(c)
                .fetch_one(&mut *conn)
                .await?
        },
        None => false,
    };
    let user_is_copilot = is_copilot(user_id, conn).await?;
    Ok(RegistrationValidation {
        project_category_id,
        registration_open,
        user_registered,
        user_suspended,
        user_country_banned,
        user_country_missing,
        user_is_copilot,
    })
}

/// True when no required terms-of-use document for the role on this challenge is missing from the
/// user's agreements.
pub async fn all_terms_agreed(
    project_id: LegacyId,
    user_id: UserId,
    legacy_role_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let agreed: bool = sqlx::query_scalar(
        r#"
        SELECT NOT EXISTS(
            SELECT 1 FROM project_role_terms_of_use_xref x
            WHERE x.project_id = $1 AND x.resource_role_id = $2
              AND x.terms_of_use_id NOT IN
                (SELECT terms_of_use_id FROM user_terms_of_use_xref WHERE user_id = $3)
        )
        "#,
    )
    .bind(project_id)
    .bind(legacy_role_id)
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(agreed)
}

pub async fn is_copilot(user_id: UserId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let copilot: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM copilot_profile WHERE user_id = $1 AND copilot_profile_status_id = 1)",
    )
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(copilot)
}

pub async fn component_info(
    project_id: LegacyId,
    conn: &mut SqliteConnection,
) -> Result<Option<ComponentInfo>, sqlx::Error> {
    let info = sqlx::query_as(
        r#"
        SELECT cv.component_id, cv.comp_vers_id, cv.phase_id, cv.version,
               COALESCE(cv.comments, '') AS comments, p.project_category_id
        FROM project p
        JOIN project_info pi ON pi.project_id = p.project_id AND pi.project_info_type_id = $2
        JOIN comp_versions cv ON cv.component_id = CAST(pi.value AS INTEGER)
        WHERE p.project_id = $1
        LIMIT 1
        "#,
    )
    .bind(project_id)
    .bind(PROJECT_INFO_COMPONENT_ID)
    .fetch_optional(conn)
    .await?;
    Ok(info)
}

pub async fn user_rating(
    user_id: UserId,
    phase_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, sqlx::Error> {
    let rating = sqlx::query_scalar("SELECT rating FROM user_rating WHERE user_id = $1 AND phase_id = $2")
        .bind(user_id)
        .bind(phase_id)
        .fetch_optional(conn)
        .await?;
    Ok(rating)
}

pub async fn user_reliability(
    user_id: UserId,
    phase_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<f64>, sqlx::Error> {
    let reliability = sqlx::query_scalar("SELECT rating FROM user_reliability WHERE user_id = $1 AND phase_id = $2")
        .bind(user_id)
        .bind(phase_id)
        .fetch_optional(conn)
        .await?;
    Ok(reliability)
}

pub async fn insert_component_inquiry(
    inquiry: &NewComponentInquiry,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let inquiry_id = sequences::next_val(sequences::COMPONENT_INQUIRY_ID_SEQ, &mut *conn).await?;
    sqlx::query(
        r#"
        INSERT INTO component_inquiry
            (component_inquiry_id, component_id, user_id, comment, agreed_to_terms, rating, phase, tc_user_id, version, project_id)
        VALUES ($1, $2, $3, $4, 1, $5, $6, $3, $7, $8)
        "#,
    )
    .bind(inquiry_id)
    .bind(inquiry.component_id)
    .bind(inquiry.user_id)
    .bind(&inquiry.comment)
    .bind(inquiry.rating)
    .bind(inquiry.phase)
    .bind(inquiry.version)
    .bind(inquiry.project_id)
    .execute(conn)
    .await?;
    Ok(inquiry_id)
}

pub async fn insert_challenge_result(
    project_id: LegacyId,
    user_id: UserId,
    rating: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO project_result (project_id, user_id, rating_ind, valid_submission_ind, old_rating)
        VALUES ($1, $2, 0, 0, $3)
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(rating)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_registration_rows(
    project_id: LegacyId,
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM project_result WHERE project_id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM component_inquiry WHERE project_id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn validate_unregistration(
    project_id: LegacyId,
    user_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<UnregistrationValidation>, sqlx::Error> {
    let validation = sqlx::query_as(
        r#"
        SELECT p.project_id,
               EXISTS(SELECT 1 FROM project_phase ph
                      WHERE ph.project_id = p.project_id AND ph.phase_type_id = $2 AND ph.phase_status_id = $3)
                   AS registration_open,
               EXISTS(SELECT 1 FROM resource r
                      WHERE r.project_id = p.project_id AND r.user_id = $4 AND r.resource_role_id = $5)
                   AS user_registered,
               p.project_studio_spec_id IS NOT NULL AS studio
        FROM project p
        WHERE p.project_id = $1
        "#,
    )
    .bind(project_id)
    .bind(REGISTRATION_PHASE_TYPE_ID)
    .bind(PHASE_STATUS_OPEN)
    .bind(user_id)
    .bind(SUBMITTER_LEGACY_ROLE_ID)
    .fetch_optional(conn)
    .await?;
    Ok(validation)
}

pub async fn active_forum_category(component_id: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let category = sqlx::query_scalar(
        r#"
        SELECT x.jive_category_id
        FROM comp_jive_category_xref x
        JOIN comp_versions cv ON cv.comp_vers_id = x.comp_vers_id
        WHERE cv.component_id = $1
        LIMIT 1
        "#,
    )
    .bind(component_id)
    .fetch_optional(conn)
    .await?;
    Ok(category)
}

pub async fn challenge_forum_category(
    project_id: LegacyId,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, sqlx::Error> {
    let category = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM project_info WHERE project_id = $1 AND project_info_type_id = $2",
    )
    .bind(project_id)
    .bind(PROJECT_INFO_FORUM_CATEGORY)
    .fetch_optional(conn)
    .await?;
    Ok(category)
}
