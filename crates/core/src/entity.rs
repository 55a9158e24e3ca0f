//! Entity materialization (spec §3 "Entity (derived)", algorithm specified
//! under C9 §4.9 but the shape itself is a data-model concept shared by
//! the shard's wire responses and the executor's ref-expansion — kept
//! here so both layers build on one definition instead of duplicating it).

use crate::ids::{EntityId, DEFAULT_ENTITY_TYPE, TYPE_PREDICATE};
use crate::object::TypedObject;
use crate::triple::Triple;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One or many values for a field: a repeated predicate becomes an ordered
/// sequence (spec §3/§4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(TypedObject),
    Many(Vec<TypedObject>),
}

/// A materialized view of the triples sharing one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "$type")]
    pub entity_type: String,
    #[serde(rename = "$context", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Build an entity from the latest, non-tombstoned triples for one
/// subject. `triples` need not be pre-filtered to the latest version —
/// this groups by predicate and keeps the greatest-timestamp value(s)
/// itself is the caller's job when multiple versions are present; callers
/// normally pass already-resolved latest triples from the store.
pub fn materialize(subject: &EntityId, triples: &[Triple]) -> Entity {
    let mut by_predicate: BTreeMap<String, Vec<TypedObject>> = BTreeMap::new();
    for t in triples {
        if t.subject != *subject || t.is_tombstone_value() {
            continue;
        }
        by_predicate
            .entry(t.predicate.as_str().to_string())
            .or_default()
            .push(t.object.clone());
    }

    let entity_type = by_predicate
        .get(TYPE_PREDICATE)
        .and_then(|vs| vs.first())
        .and_then(|v| match v {
            TypedObject::String(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_ENTITY_TYPE.to_string());

    let context = by_predicate
        .get("$context")
        .and_then(|vs| vs.first())
        .and_then(|v| match v {
            TypedObject::String(s) => Some(s.clone()),
            _ => None,
        });

    let mut fields = BTreeMap::new();
    for (predicate, mut values) in by_predicate {
        if predicate == TYPE_PREDICATE || predicate == "$context" {
            continue;
        }
        let value = if values.len() == 1 {
            FieldValue::Single(values.pop().unwrap())
        } else {
            FieldValue::Many(values)
        };
        fields.insert(predicate, value);
    }

    Entity {
        id: subject.clone(),
        entity_type,
        context,
        fields,
    }
}

/// Group triples by subject and materialize one entity per subject
/// (order of the returned vec follows first-appearance order of subjects
/// in `triples`).
pub fn materialize_all(triples: &[Triple]) -> Vec<Entity> {
    let mut order: Vec<EntityId> = Vec::new();
    let mut grouped: BTreeMap<EntityId, Vec<Triple>> = BTreeMap::new();
    for t in triples {
        if !grouped.contains_key(&t.subject) {
            order.push(t.subject.clone());
        }
        grouped.entry(t.subject.clone()).or_default().push(t.clone());
    }
    order
        .into_iter()
        .map(|id| {
            let group = &grouped[&id];
            materialize(&id, group)
        })
        .collect()
}

/// `$id`, `$type`, `$context` are always retained; other fields only if
/// named (spec §4.9 "Field projection").
pub fn project_fields(entity: &Entity, fields: &[String]) -> Entity {
    let wanted: std::collections::HashSet<&str> = fields.iter().map(|s| s.as_str()).collect();
    Entity {
        id: entity.id.clone(),
        entity_type: entity.entity_type.clone(),
        context: entity.context.clone(),
        fields: entity
            .fields
            .iter()
            .filter(|(k, _)| wanted.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

/// A field value after `expand_refs`: either the original scalar/array
/// value, a single REF resolved into a nested entity, or a REF_ARRAY/
/// repeated-ref field resolved element-by-element (unresolved or
/// depth-cut elements fall back to their original `TypedObject`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExpandedField {
    Value(TypedObject),
    Entity(Box<ExpandedEntity>),
    List(Vec<ExpandedField>),
}

/// An entity with REF fields inlined up to some bounded depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedEntity {
    pub id: EntityId,
    #[serde(rename = "$type")]
    pub entity_type: String,
    #[serde(rename = "$context", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub fields: BTreeMap<String, ExpandedField>,
}

/// Result of `expand_refs`: the expanded entity plus how deep the
/// expansion actually went and whether `max_depth` cut off further refs.
#[derive(Debug, Clone, PartialEq)]
pub struct RefExpansion {
    pub entity: ExpandedEntity,
    pub actual_depth: u32,
    pub max_depth_reached: bool,
}

/// Recursively resolve REF/REF_ARRAY fields into nested entities, up to
/// `max_depth` hops (spec §4.9/§9: cycles are prevented by the depth bound
/// alone — `resolver` returns freshly materialized values each call, so
/// there is no shared state across branches that could loop without
/// making depth progress). `max_depth = 0` resolves nothing.
pub fn expand_refs<F>(entity: &Entity, resolver: F, max_depth: u32) -> RefExpansion
where
    F: Fn(&EntityId) -> Option<Entity>,
{
    let mut actual_depth = 0u32;
    let mut max_depth_reached = false;
    let expanded = expand_entity(entity, &resolver, 0, max_depth, &mut actual_depth, &mut max_depth_reached);
    RefExpansion { entity: expanded, actual_depth, max_depth_reached }
}

fn expand_entity<F>(
    entity: &Entity,
    resolver: &F,
    depth: u32,
    max_depth: u32,
    actual_depth: &mut u32,
    max_depth_reached: &mut bool,
) -> ExpandedEntity
where
    F: Fn(&EntityId) -> Option<Entity>,
{
    let fields = entity
        .fields
        .iter()
        .map(|(name, value)| {
            let expanded = match value {
                FieldValue::Single(obj) => expand_object(obj, resolver, depth, max_depth, actual_depth, max_depth_reached),
                FieldValue::Many(objs) => ExpandedField::List(
                    objs.iter()
                        .map(|o| expand_object(o, resolver, depth, max_depth, actual_depth, max_depth_reached))
                        .collect(),
                ),
            };
            (name.clone(), expanded)
        })
        .collect();

    ExpandedEntity {
        id: entity.id.clone(),
        entity_type: entity.entity_type.clone(),
        context: entity.context.clone(),
        fields,
    }
}

fn expand_object<F>(
    obj: &TypedObject,
    resolver: &F,
    depth: u32,
    max_depth: u32,
    actual_depth: &mut u32,
    max_depth_reached: &mut bool,
) -> ExpandedField
where
    F: Fn(&EntityId) -> Option<Entity>,
{
    match obj {
        TypedObject::Ref(id) => expand_ref(id, resolver, depth, max_depth, actual_depth, max_depth_reached)
            .map(|e| ExpandedField::Entity(Box::new(e)))
            .unwrap_or_else(|| ExpandedField::Value(obj.clone())),
        TypedObject::RefArray(ids) => ExpandedField::List(
            ids.iter()
                .map(|id| {
                    expand_ref(id, resolver, depth, max_depth, actual_depth, max_depth_reached)
                        .map(|e| ExpandedField::Entity(Box::new(e)))
                        .unwrap_or_else(|| ExpandedField::Value(TypedObject::Ref(id.clone())))
                })
                .collect(),
        ),
        other => ExpandedField::Value(other.clone()),
    }
}

/// Resolve one hop past `id`, or `None` if `max_depth` forbids it or the
/// resolver has nothing for that id. Updates `actual_depth` to the
/// deepest level actually reached and flags `max_depth_reached` whenever
/// a ref exists at the boundary that expansion declined to follow.
fn expand_ref<F>(
    id: &EntityId,
    resolver: &F,
    depth: u32,
    max_depth: u32,
    actual_depth: &mut u32,
    max_depth_reached: &mut bool,
) -> Option<ExpandedEntity>
where
    F: Fn(&EntityId) -> Option<Entity>,
{
    if depth >= max_depth {
        *max_depth_reached = true;
        return None;
    }
    let resolved = resolver(id)?;
    let next_depth = depth + 1;
    if next_depth > *actual_depth {
        *actual_depth = next_depth;
    }
    Some(expand_entity(&resolved, resolver, next_depth, max_depth, actual_depth, max_depth_reached))
}
