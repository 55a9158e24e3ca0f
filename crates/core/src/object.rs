//! `ObjectType` tag set (0..17) and the `TypedObject` sum type that carries
//! the associated payload variant for each tag (spec §3, design note in
//! §9: "the target implementation must use a sum type with exhaustive
//! pattern handling, rejecting mismatches between tag and payload at the
//! construction site, not the read site").

use crate::error::{Error, ValidationKind};
use crate::geo::{validate_linestring, validate_polygon, GeoPoint};
use crate::ids::EntityId;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Discriminant tag for a typed object value. Values are part of the
/// on-wire/on-disk format and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectType {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 4,
    String = 5,
    Binary = 6,
    Timestamp = 7,
    Date = 8,
    Duration = 9,
    Ref = 10,
    RefArray = 11,
    Json = 12,
    GeoPoint = 13,
    GeoPolygon = 14,
    GeoLineString = 15,
    Url = 16,
    Vector = 17,
}

impl ObjectType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        use ObjectType::*;
        Some(match tag {
            0 => Null,
            1 => Bool,
            2 => Int32,
            3 => Int64,
            4 => Float64,
            5 => String,
            6 => Binary,
            7 => Timestamp,
            8 => Date,
            9 => Duration,
            10 => Ref,
            11 => RefArray,
            12 => Json,
            13 => GeoPoint,
            14 => GeoPolygon,
            15 => GeoLineString,
            16 => Url,
            17 => Vector,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// A closed exterior ring plus optional hole rings for `GEO_POLYGON`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<GeoPoint>,
    pub holes: Vec<Vec<GeoPoint>>,
}

/// The payload-carrying sum type. Construction always goes through
/// `TypedObject::new_*` or `from_tag_and_json`, which validate tag/payload
/// agreement; there is no way to build a mismatched value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum TypedObject {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(i64),
    Date(String),
    Duration(String),
    Ref(EntityId),
    RefArray(Vec<EntityId>),
    Json(serde_json::Value),
    GeoPoint(GeoPoint),
    GeoPolygon(Polygon),
    GeoLineString(Vec<GeoPoint>),
    Url(String),
    Vector(Vec<f32>),
}

/// Wire representation used by the shard's JSON endpoints (`lookup`,
/// `filter`, `expand`) and by materialized entities generally: each
/// variant serializes to its natural JSON shape rather than the
/// externally-tagged `{"Variant": payload}` a plain derive would produce,
/// since entity fields are meant to read as plain values (spec §4.9's
/// worked example: `age: 30`, not `age: {"Int64": 30}`). `REF`/`REF_ARRAY`
/// are the one case with no "natural" JSON primitive, so they're exposed
/// as `{"@ref": "<id>"}` / `{"@ref": ["<id>", ...]}` per spec §4.9.
impl Serialize for TypedObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TypedObject::Null => serializer.serialize_none(),
            TypedObject::Bool(b) => serializer.serialize_bool(*b),
            TypedObject::Int32(v) => serializer.serialize_i32(*v),
            TypedObject::Int64(v) => serializer.serialize_i64(*v),
            TypedObject::Float64(v) => serializer.serialize_f64(*v),
            TypedObject::String(s) => serializer.serialize_str(s),
            TypedObject::Binary(b) => serializer.serialize_str(&crate::base64::encode(b)),
            TypedObject::Timestamp(v) => serializer.serialize_i64(*v),
            TypedObject::Date(s) => serializer.serialize_str(s),
            TypedObject::Duration(s) => serializer.serialize_str(s),
            TypedObject::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("@ref", id.as_str())?;
                map.end()
            }
            TypedObject::RefArray(ids) => {
                let refs: Vec<&str> = ids.iter().map(EntityId::as_str).collect();
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("@ref", &refs)?;
                map.end()
            }
            TypedObject::Json(v) => v.serialize(serializer),
            TypedObject::GeoPoint(p) => p.serialize(serializer),
            TypedObject::GeoPolygon(poly) => poly.serialize(serializer),
            TypedObject::GeoLineString(points) => points.serialize(serializer),
            TypedObject::Url(s) => serializer.serialize_str(s),
            TypedObject::Vector(v) => v.serialize(serializer),
        }
    }
}

impl TypedObject {
    pub fn object_type(&self) -> ObjectType {
        match self {
            TypedObject::Null => ObjectType::Null,
            TypedObject::Bool(_) => ObjectType::Bool,
            TypedObject::Int32(_) => ObjectType::Int32,
            TypedObject::Int64(_) => ObjectType::Int64,
            TypedObject::Float64(_) => ObjectType::Float64,
            TypedObject::String(_) => ObjectType::String,
            TypedObject::Binary(_) => ObjectType::Binary,
            TypedObject::Timestamp(_) => ObjectType::Timestamp,
            TypedObject::Date(_) => ObjectType::Date,
            TypedObject::Duration(_) => ObjectType::Duration,
            TypedObject::Ref(_) => ObjectType::Ref,
            TypedObject::RefArray(_) => ObjectType::RefArray,
            TypedObject::Json(_) => ObjectType::Json,
            TypedObject::GeoPoint(_) => ObjectType::GeoPoint,
            TypedObject::GeoPolygon(_) => ObjectType::GeoPolygon,
            TypedObject::GeoLineString(_) => ObjectType::GeoLineString,
            TypedObject::Url(_) => ObjectType::Url,
            TypedObject::Vector(_) => ObjectType::Vector,
        }
    }

    /// Construct a `GEO_POINT` value, validating bounds at the
    /// construction site (spec invariant 1).
    pub fn geo_point(lat: f64, lng: f64) -> Result<Self, Error> {
        Ok(TypedObject::GeoPoint(GeoPoint::new(lat, lng)?))
    }

    pub fn geo_polygon(exterior: Vec<GeoPoint>, holes: Vec<Vec<GeoPoint>>) -> Result<Self, Error> {
        validate_polygon(&exterior, &holes)?;
        Ok(TypedObject::GeoPolygon(Polygon { exterior, holes }))
    }

    pub fn geo_linestring(points: Vec<GeoPoint>) -> Result<Self, Error> {
        validate_linestring(&points)?;
        Ok(TypedObject::GeoLineString(points))
    }

    /// Whether this value is the tombstone marker: a `NULL` object.
    /// Tombstone-ness additionally requires it to be the *latest* version
    /// for `(subject, predicate)`, which is a property of the store, not
    /// of the value alone.
    pub fn is_null(&self) -> bool {
        matches!(self, TypedObject::Null)
    }

    /// True for variants the numeric comparators (`<`,`<=`,`>`,`>=`) accept.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            TypedObject::Int32(v) => Some(*v as f64),
            TypedObject::Int64(v) => Some(*v as f64),
            TypedObject::Float64(v) => Some(*v),
            TypedObject::Timestamp(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Reject a (tag, payload) pair that disagree — used by the codec decoder,
/// which must be strict about it (spec §4.2).
pub fn validate_tag_payload_agreement(tag: ObjectType, obj: &TypedObject) -> Result<(), Error> {
    if tag != obj.object_type() {
        return Err(Error::codec(format!(
            "object tag {:?} disagrees with payload variant {:?}",
            tag,
            obj.object_type()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip_all_variants() {
        for tag in 0..=17u8 {
            let ot = ObjectType::from_tag(tag).expect("valid tag");
            assert_eq!(ot.tag(), tag);
        }
        assert!(ObjectType::from_tag(18).is_none());
    }

    #[test]
    fn geo_point_rejects_out_of_range() {
        assert!(TypedObject::geo_point(91.0, 0.0).is_err());
    }

    #[test]
    fn tag_payload_agreement_checked() {
        let obj = TypedObject::Int64(42);
        assert!(validate_tag_payload_agreement(ObjectType::Int64, &obj).is_ok());
        assert!(validate_tag_payload_agreement(ObjectType::String, &obj).is_err());
    }

    #[test]
    fn numeric_projection() {
        assert_eq!(TypedObject::Int32(5).as_numeric(), Some(5.0));
        assert_eq!(TypedObject::String("x".into()).as_numeric(), None);
    }

    #[test]
    fn scalars_serialize_to_plain_json_values() {
        assert_eq!(serde_json::to_string(&TypedObject::Int64(30)).unwrap(), "30");
        assert_eq!(serde_json::to_string(&TypedObject::String("Alice".into())).unwrap(), "\"Alice\"");
        assert_eq!(serde_json::to_string(&TypedObject::Bool(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&TypedObject::Null).unwrap(), "null");
    }

    #[test]
    fn ref_serializes_to_at_ref_object() {
        let obj = TypedObject::Ref(EntityId::new("https://e.com/bob").unwrap());
        assert_eq!(serde_json::to_string(&obj).unwrap(), r#"{"@ref":"https://e.com/bob"}"#);
    }

    #[test]
    fn ref_array_serializes_to_at_ref_array() {
        let obj = TypedObject::RefArray(vec![
            EntityId::new("https://e.com/bob").unwrap(),
            EntityId::new("https://e.com/carol").unwrap(),
        ]);
        assert_eq!(
            serde_json::to_string(&obj).unwrap(),
            r#"{"@ref":["https://e.com/bob","https://e.com/carol"]}"#
        );
    }
}
