//! Directory lookup helpers.
//!
//! Resolution over the directory's entity graph. Lookups are always one level deep: an entity
//! comes back with its memberships (or members) populated, but those related entities carry no
//! further relations. Nothing here recurses.
//!
//! A lookup that finds nothing is not an error, whether the service answers with an empty set
//! or with a `NOT_FOUND` failure.

use crate::services::DirectoryClient;
use courier_proto::directory::{
    ContactType, Entity, EntityInformation, EntityStatus, EntityType, FailureReason,
    LookupBy, LookupEntitiesByContactRequest, LookupEntitiesRequest, RequestedInformation,
};
use courier_types::PhoneNumber;
use tonic::{Code, Status};

/// Relations requested for contact lookups.
const CONTACT_LOOKUP_INFORMATION: &[EntityInformation] = &[
    EntityInformation::Memberships,
    EntityInformation::Contacts,
    EntityInformation::ExternalIds,
];

pub fn requested_information(depth: i64, info: &[EntityInformation]) -> RequestedInformation {
    RequestedInformation {
        depth,
        entity_information: info.iter().map(|i| *i as i32).collect(),
    }
}

/// Active entities holding `contact_value` as one of their contacts.
pub async fn lookup_by_contact(
    client: &dyn DirectoryClient,
    contact_value: &str,
) -> Result<Vec<Entity>, Status> {
    let req = LookupEntitiesByContactRequest {
        contact_value: contact_value.to_string(),
        requested_information: Some(requested_information(1, CONTACT_LOOKUP_INFORMATION)),
        statuses: vec![EntityStatus::Active as i32],
    };

    match client.lookup_entities_by_contact(req).await {
        Ok(res) => match res.failure {
            Some(failure) if failure.reason() == FailureReason::NotFound => Ok(Vec::new()),
            Some(failure) => Err(Status::internal(format!(
                "contact lookup failed: {}",
                failure.message
            ))),
            None => Ok(res.entities),
        },
        Err(status) if status.code() == Code::NotFound => Ok(Vec::new()),
        Err(status) => Err(status),
    }
}

/// Looks up a single entity by its id.
pub async fn lookup_by_id(
    client: &dyn DirectoryClient,
    entity_id: &str,
    depth: i64,
    info: &[EntityInformation],
) -> Result<Option<Entity>, Status> {
    let entities = lookup(client, LookupBy::EntityId, entity_id, depth, info).await?;
    Ok(entities.into_iter().next())
}

/// Entities carrying `external_id` in their external ids.
pub async fn lookup_by_external_id(
    client: &dyn DirectoryClient,
    external_id: &str,
    info: &[EntityInformation],
) -> Result<Vec<Entity>, Status> {
    lookup(client, LookupBy::ExternalId, external_id, 1, info).await
}

async fn lookup(
    client: &dyn DirectoryClient,
    lookup_by: LookupBy,
    id: &str,
    depth: i64,
    info: &[EntityInformation],
) -> Result<Vec<Entity>, Status> {
    let req = LookupEntitiesRequest {
        lookup_by: lookup_by as i32,
        id: id.to_string(),
        requested_information: Some(requested_information(depth, info)),
        statuses: Vec::new(),
    };

    match client.lookup_entities(req).await {
        Ok(res) => Ok(res.entities),
        Err(status) if status.code() == Code::NotFound => Ok(Vec::new()),
        Err(status) => Err(status),
    }
}

/// The organization an entity belongs to.
///
/// An organization is its own organization. Otherwise the first organization among its
/// memberships is returned.
pub fn organization_of(entity: &Entity) -> Option<&Entity> {
    if entity.r#type() == EntityType::Organization {
        return Some(entity);
    }
    entity
        .memberships
        .iter()
        .find(|m| m.r#type() == EntityType::Organization)
}

/// The first organization or internal entity owning `contact_value`. External entities are
/// skipped.
pub fn provider_or_org<'a>(entities: &'a [Entity], contact_value: &str) -> Option<&'a Entity> {
    entities.iter().find(|e| {
        matches!(e.r#type(), EntityType::Organization | EntityType::Internal)
            && e
                .contacts
                .iter()
                .any(|c| c.value.eq_ignore_ascii_case(contact_value))
    })
}

/// The first external entity that is a member of `org_id`.
pub fn external_member<'a>(entities: &'a [Entity], org_id: &str) -> Option<&'a Entity> {
    external_members(entities, org_id).into_iter().next()
}

/// Every external entity that is a member of `org_id`.
pub fn external_members<'a>(entities: &'a [Entity], org_id: &str) -> Vec<&'a Entity> {
    entities
        .iter()
        .filter(|e| {
            e.r#type() == EntityType::External && e.memberships.iter().any(|m| m.id == org_id)
        })
        .collect()
}

/// Name to show for a party reached on `channel_id`.
///
/// Prefers the entity's display name, then a prettified phone number for phone contacts, and
/// finally the raw channel id.
pub fn display_name(channel_id: &str, contact_type: ContactType, entity: Option<&Entity>) -> String {
    if let Some(name) = entity
        .and_then(|e| e.info.as_ref())
        .map(|info| info.display_name.trim())
        .filter(|name| !name.is_empty())
    {
        return name.to_string();
    }

    if contact_type == ContactType::Phone {
        if let Ok(number) = PhoneNumber::parse(channel_id) {
            return number.pretty();
        }
    }

    channel_id.to_string()
}
