use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::instrument;

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ServiceError,
    model::member::Member,
    registry::{MemberInput, Registry},
    store::Store,
};

fn registry<'a>(store: &'a web::Data<dyn Store>, config: &Config) -> Registry<'a> {
    Registry::new(store.get_ref(), config.family_id_attempts)
}

/// Register a member
///
/// Heads of family get a family id allocated; dependents must name an
/// existing head through `familyId` or `familyHead`.
#[utoipa::path(
    post,
    path = "/api/members",
    request_body = MemberInput,
    responses(
        (status = 201, description = "Member registered", body = Member),
        (status = 400, description = "Missing required field"),
        (status = 409, description = "Family id conflict or exhausted"),
        (status = 422, description = "Referenced family head does not exist", body = Object, example = json!({
            "error": "No family head found with familyId MS5678",
            "code": "reference_not_found"
        }))
    ),
    tag = "Member",
    security(("bearer_auth" = []))
)]
#[instrument(name = "member_create", skip_all, fields(admin = %auth.username))]
pub async fn create_member(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    body: web::Json<MemberInput>,
) -> Result<HttpResponse, ServiceError> {
    let member = registry(&store, &config).register(&body).await?;
    Ok(HttpResponse::Created().json(member))
}

#[utoipa::path(
    get,
    path = "/api/members",
    responses((status = 200, description = "All members ordered by name", body = [Member])),
    tag = "Member",
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(registry(&store, &config).list().await?))
}

#[utoipa::path(
    get,
    path = "/api/members/heads",
    responses((status = 200, description = "Heads of family", body = [Member])),
    tag = "Member",
    security(("bearer_auth" = []))
)]
pub async fn list_heads(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(registry(&store, &config).heads().await?))
}

#[utoipa::path(
    get,
    path = "/api/members/family/{family_id}",
    params(("family_id", Path, description = "Family ID")),
    responses((status = 200, description = "Members sharing the family id, head first", body = [Member])),
    tag = "Member",
    security(("bearer_auth" = []))
)]
pub async fn family_members(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let members = registry(&store, &config).family(&path).await?;
    Ok(HttpResponse::Ok().json(members))
}

#[utoipa::path(
    get,
    path = "/api/members/{member_id}",
    params(("member_id", Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member found", body = Member),
        (status = 404, description = "Member not found")
    ),
    tag = "Member",
    security(("bearer_auth" = []))
)]
pub async fn get_member(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    let member = registry(&store, &config).get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(member))
}

/// Update a member
///
/// Changing a head's `familyId` moves every member of the family along.
#[utoipa::path(
    put,
    path = "/api/members/{member_id}",
    params(("member_id", Path, description = "Member ID")),
    request_body = MemberInput,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Family id already in use"),
        (status = 422, description = "Referenced family head does not exist")
    ),
    tag = "Member",
    security(("bearer_auth" = []))
)]
#[instrument(name = "member_update", skip(auth, store, config, body), fields(admin = %auth.username))]
pub async fn update_member(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: web::Json<MemberInput>,
) -> Result<HttpResponse, ServiceError> {
    let member = registry(&store, &config)
        .update(path.into_inner(), &body)
        .await?;
    Ok(HttpResponse::Ok().json(member))
}

#[utoipa::path(
    delete,
    path = "/api/members/{member_id}",
    params(("member_id", Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member deleted", body = Object, example = json!({
            "message": "Member deleted successfully"
        })),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Head still has family members", body = Object, example = json!({
            "error": "Family MS5678 still has 1 other member(s); remove them first",
            "code": "dependents_exist"
        }))
    ),
    tag = "Member",
    security(("bearer_auth" = []))
)]
#[instrument(name = "member_delete", skip(auth, store, config), fields(admin_id = auth.admin_id))]
pub async fn delete_member(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ServiceError> {
    registry(&store, &config).delete(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({"message": "Member deleted successfully"})))
}
