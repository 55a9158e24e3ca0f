//! GraphCol: a columnar binary format for ordered batches of triples
//! belonging to one namespace (spec §4.2).
//!
//! Frame layout:
//! ```text
//! magic(4) version(1) namespace(varint-len + utf8) count(varint)
//! dict_len(varint) [dict_entry: varint-len + utf8]*
//! [subject_dict_idx: varint]*count
//! [predicate_dict_idx: varint]*count
//! [tag: u8]*count
//! [timestamp: svarint]*count
//! [tx_id: 26 raw bytes]*count
//! [payload: tag-dependent]*count
//! crc32(4)  -- over every byte above
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use graphdb_core::crc32::crc32;
use graphdb_core::error::Error;
use graphdb_core::geo::GeoPoint;
use graphdb_core::ids::{EntityId, Namespace, Predicate, TransactionId};
use graphdb_core::object::{ObjectType, Polygon, TypedObject};
use graphdb_core::triple::Triple;
use graphdb_core::varint::{decode_svarint, decode_varint, encode_svarint, encode_varint};
use std::collections::HashMap;
use std::io::Cursor;

const MAGIC: &[u8; 4] = b"GCOL";
const VERSION: u8 = 1;

/// A dictionary of repeated strings built in first-occurrence order, so
/// re-encoding the same logical batch is deterministic.
#[derive(Default)]
struct DictBuilder {
    entries: Vec<String>,
    index: HashMap<String, u32>,
}

impl DictBuilder {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.entries.len() as u32;
        self.entries.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    encode_varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

fn read_len_prefixed<'a>(buf: &'a [u8], pos: &mut usize) -> Result<&'a [u8], Error> {
    let (len, used) = decode_varint(&buf[*pos..])?;
    *pos += used;
    let end = *pos + len as usize;
    if end > buf.len() {
        return Err(Error::codec("truncated length-prefixed field"));
    }
    let slice = &buf[*pos..end];
    *pos = end;
    Ok(slice)
}

fn write_geo_point(out: &mut Vec<u8>, p: &GeoPoint) {
    out.write_f64::<LittleEndian>(p.lat).unwrap();
    out.write_f64::<LittleEndian>(p.lng).unwrap();
}

fn read_geo_point(buf: &[u8], pos: &mut usize) -> Result<GeoPoint, Error> {
    if *pos + 16 > buf.len() {
        return Err(Error::codec("truncated geo point"));
    }
    let mut cur = Cursor::new(&buf[*pos..*pos + 16]);
    let lat = cur.read_f64::<LittleEndian>().unwrap();
    let lng = cur.read_f64::<LittleEndian>().unwrap();
    *pos += 16;
    GeoPoint::new(lat, lng).map_err(|_| Error::codec("invalid geo point in frame"))
}

fn write_points(out: &mut Vec<u8>, points: &[GeoPoint]) {
    encode_varint(points.len() as u64, out);
    for p in points {
        write_geo_point(out, p);
    }
}

fn read_points(buf: &[u8], pos: &mut usize) -> Result<Vec<GeoPoint>, Error> {
    let (n, used) = decode_varint(&buf[*pos..])?;
    *pos += used;
    let mut out = Vec::with_capacity(n as usize);
    for _ in 0..n {
        out.push(read_geo_point(buf, pos)?);
    }
    Ok(out)
}

/// Encode a batch of triples into a GraphCol frame. Preserves input order
/// exactly; `decode(encode(triples, ns))` round-trips every field including
/// the `ObjectType` tag (spec §4.2 contract, §8 invariant).
pub fn encode(triples: &[Triple], namespace: &Namespace) -> Vec<u8> {
    let mut dict = DictBuilder::default();

    struct Row {
        subject_idx: u32,
        predicate_idx: u32,
        tag: u8,
        timestamp: i64,
        tx_id: [u8; 26],
        payload: Vec<u8>,
    }

    let mut rows = Vec::with_capacity(triples.len());
    for t in triples {
        let subject_idx = dict.intern(t.subject.as_str());
        let predicate_idx = dict.intern(t.predicate.as_str());
        let mut tx_bytes = [0u8; 26];
        tx_bytes.copy_from_slice(t.tx_id.as_str().as_bytes());

        let mut payload = Vec::new();
        match &t.object {
            TypedObject::Null => {}
            TypedObject::Bool(b) => payload.push(*b as u8),
            TypedObject::Int32(v) => encode_svarint(*v as i64, &mut payload),
            TypedObject::Int64(v) => encode_svarint(*v, &mut payload),
            TypedObject::Float64(v) => payload.write_f64::<LittleEndian>(*v).unwrap(),
            TypedObject::String(s) => encode_varint(dict.intern(s) as u64, &mut payload),
            TypedObject::Binary(b) => write_len_prefixed(&mut payload, b),
            TypedObject::Timestamp(v) => encode_svarint(*v, &mut payload),
            TypedObject::Date(s) => encode_varint(dict.intern(s) as u64, &mut payload),
            TypedObject::Duration(s) => encode_varint(dict.intern(s) as u64, &mut payload),
            TypedObject::Ref(r) => encode_varint(dict.intern(r.as_str()) as u64, &mut payload),
            TypedObject::RefArray(refs) => {
                encode_varint(refs.len() as u64, &mut payload);
                for r in refs {
                    encode_varint(dict.intern(r.as_str()) as u64, &mut payload);
                }
            }
            TypedObject::Json(v) => {
                let text = v.to_string();
                write_len_prefixed(&mut payload, text.as_bytes());
            }
            TypedObject::GeoPoint(p) => write_geo_point(&mut payload, p),
            TypedObject::GeoPolygon(poly) => {
                write_points(&mut payload, &poly.exterior);
                encode_varint(poly.holes.len() as u64, &mut payload);
                for hole in &poly.holes {
                    write_points(&mut payload, hole);
                }
            }
            TypedObject::GeoLineString(points) => write_points(&mut payload, points),
            TypedObject::Url(s) => encode_varint(dict.intern(s) as u64, &mut payload),
            TypedObject::Vector(v) => {
                encode_varint(v.len() as u64, &mut payload);
                for f in v {
                    payload.write_f32::<LittleEndian>(*f).unwrap();
                }
            }
        }

        rows.push(Row {
            subject_idx,
            predicate_idx,
            tag: t.object.object_type().tag(),
            timestamp: t.timestamp,
            tx_id: tx_bytes,
            payload,
        });
    }

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    write_len_prefixed(&mut out, namespace.as_str().as_bytes());
    encode_varint(rows.len() as u64, &mut out);

    encode_varint(dict.entries.len() as u64, &mut out);
    for entry in &dict.entries {
        write_len_prefixed(&mut out, entry.as_bytes());
    }

    for r in &rows {
        encode_varint(r.subject_idx as u64, &mut out);
    }
    for r in &rows {
        encode_varint(r.predicate_idx as u64, &mut out);
    }
    for r in &rows {
        out.push(r.tag);
    }
    for r in &rows {
        encode_svarint(r.timestamp, &mut out);
    }
    for r in &rows {
        out.extend_from_slice(&r.tx_id);
    }
    for r in &rows {
        out.extend_from_slice(&r.payload);
    }

    let checksum = crc32(&out);
    out.write_u32::<LittleEndian>(checksum).unwrap();
    out
}

/// Decoded frame: the namespace it was encoded for plus the triples, in
/// original order.
pub struct DecodedFrame {
    pub namespace: Namespace,
    pub triples: Vec<Triple>,
}

/// Decode a GraphCol frame. Strict: mismatched CRC, unknown version, or
/// tag/payload disagreement all raise `Error::Codec` (spec §4.2 contract).
pub fn decode(bytes: &[u8]) -> Result<DecodedFrame, Error> {
    if bytes.len() < 4 + 1 + 4 {
        return Err(Error::codec("frame too short"));
    }
    let body = &bytes[..bytes.len() - 4];
    let stored_crc = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
    let computed_crc = crc32(body);
    if stored_crc != computed_crc {
        return Err(Error::codec("CRC32 mismatch"));
    }

    let mut pos = 0usize;
    if &bytes[0..4] != MAGIC {
        return Err(Error::codec("bad magic"));
    }
    pos += 4;
    let version = bytes[pos];
    pos += 1;
    if version != VERSION {
        return Err(Error::codec(format!("unsupported version {version}")));
    }

    let ns_bytes = read_len_prefixed(bytes, &mut pos)?;
    let ns_str = std::str::from_utf8(ns_bytes).map_err(|_| Error::codec("namespace not utf8"))?;
    let namespace = Namespace::new(ns_str).map_err(|_| Error::codec("invalid namespace in frame"))?;

    let (count, used) = decode_varint(&bytes[pos..])?;
    pos += used;
    let count = count as usize;

    let (dict_len, used) = decode_varint(&bytes[pos..])?;
    pos += used;
    let mut dict = Vec::with_capacity(dict_len as usize);
    for _ in 0..dict_len {
        let entry_bytes = read_len_prefixed(bytes, &mut pos)?;
        let s = std::str::from_utf8(entry_bytes)
            .map_err(|_| Error::codec("dictionary entry not utf8"))?
            .to_string();
        dict.push(s);
    }
    let dict_get = |idx: u32, what: &str| -> Result<&String, Error> {
        dict.get(idx as usize)
            .ok_or_else(|| Error::codec(format!("dictionary index out of range for {what}")))
    };

    let mut subject_idx = Vec::with_capacity(count);
    for _ in 0..count {
        let (v, used) = decode_varint(&bytes[pos..])?;
        pos += used;
        subject_idx.push(v as u32);
    }
    let mut predicate_idx = Vec::with_capacity(count);
    for _ in 0..count {
        let (v, used) = decode_varint(&bytes[pos..])?;
        pos += used;
        predicate_idx.push(v as u32);
    }
    let mut tags = Vec::with_capacity(count);
    for _ in 0..count {
        if pos >= bytes.len() {
            return Err(Error::codec("truncated tag column"));
        }
        tags.push(bytes[pos]);
        pos += 1;
    }
    let mut timestamps = Vec::with_capacity(count);
    for _ in 0..count {
        let (v, used) = decode_svarint(&bytes[pos..])?;
        pos += used;
        timestamps.push(v);
    }
    let mut tx_ids = Vec::with_capacity(count);
    for _ in 0..count {
        if pos + 26 > bytes.len() {
            return Err(Error::codec("truncated tx_id column"));
        }
        let s = std::str::from_utf8(&bytes[pos..pos + 26])
            .map_err(|_| Error::codec("tx_id not utf8"))?;
        let tx = TransactionId::new(s).map_err(|_| Error::codec("invalid tx_id in frame"))?;
        tx_ids.push(tx);
        pos += 26;
    }

    let mut triples = Vec::with_capacity(count);
    for i in 0..count {
        let tag = ObjectType::from_tag(tags[i]).ok_or_else(|| Error::codec("unknown object tag"))?;
        let object = match tag {
            ObjectType::Null => TypedObject::Null,
            ObjectType::Bool => {
                let b = bytes.get(pos).copied().ok_or_else(|| Error::codec("truncated bool"))?;
                pos += 1;
                TypedObject::Bool(b != 0)
            }
            ObjectType::Int32 => {
                let (v, used) = decode_svarint(&bytes[pos..])?;
                pos += used;
                TypedObject::Int32(v as i32)
            }
            ObjectType::Int64 => {
                let (v, used) = decode_svarint(&bytes[pos..])?;
                pos += used;
                TypedObject::Int64(v)
            }
            ObjectType::Float64 => {
                if pos + 8 > bytes.len() {
                    return Err(Error::codec("truncated f64"));
                }
                let mut cur = Cursor::new(&bytes[pos..pos + 8]);
                let v = cur.read_f64::<LittleEndian>().unwrap();
                pos += 8;
                TypedObject::Float64(v)
            }
            ObjectType::String => {
                let (idx, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                TypedObject::String(dict_get(idx as u32, "String")?.clone())
            }
            ObjectType::Binary => {
                let b = read_len_prefixed(bytes, &mut pos)?.to_vec();
                TypedObject::Binary(b)
            }
            ObjectType::Timestamp => {
                let (v, used) = decode_svarint(&bytes[pos..])?;
                pos += used;
                TypedObject::Timestamp(v)
            }
            ObjectType::Date => {
                let (idx, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                TypedObject::Date(dict_get(idx as u32, "Date")?.clone())
            }
            ObjectType::Duration => {
                let (idx, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                TypedObject::Duration(dict_get(idx as u32, "Duration")?.clone())
            }
            ObjectType::Ref => {
                let (idx, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                let s = dict_get(idx as u32, "Ref")?.clone();
                TypedObject::Ref(EntityId::new(&s).map_err(|_| Error::codec("invalid ref entity id"))?)
            }
            ObjectType::RefArray => {
                let (n, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                let mut refs = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let (idx, used) = decode_varint(&bytes[pos..])?;
                    pos += used;
                    let s = dict_get(idx as u32, "RefArray")?.clone();
                    refs.push(EntityId::new(&s).map_err(|_| Error::codec("invalid ref entity id"))?);
                }
                TypedObject::RefArray(refs)
            }
            ObjectType::Json => {
                let text_bytes = read_len_prefixed(bytes, &mut pos)?;
                let text = std::str::from_utf8(text_bytes).map_err(|_| Error::codec("json not utf8"))?;
                let value: serde_json::Value =
                    serde_json::from_str(text).map_err(|_| Error::codec("invalid json payload"))?;
                TypedObject::Json(value)
            }
            ObjectType::GeoPoint => TypedObject::GeoPoint(read_geo_point(bytes, &mut pos)?),
            ObjectType::GeoPolygon => {
                let exterior = read_points(bytes, &mut pos)?;
                let (n_holes, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                let mut holes = Vec::with_capacity(n_holes as usize);
                for _ in 0..n_holes {
                    holes.push(read_points(bytes, &mut pos)?);
                }
                TypedObject::GeoPolygon(Polygon { exterior, holes })
            }
            ObjectType::GeoLineString => TypedObject::GeoLineString(read_points(bytes, &mut pos)?),
            ObjectType::Url => {
                let (idx, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                TypedObject::Url(dict_get(idx as u32, "Url")?.clone())
            }
            ObjectType::Vector => {
                let (n, used) = decode_varint(&bytes[pos..])?;
                pos += used;
                let mut v = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    if pos + 4 > bytes.len() {
                        return Err(Error::codec("truncated vector element"));
                    }
                    let mut cur = Cursor::new(&bytes[pos..pos + 4]);
                    v.push(cur.read_f32::<LittleEndian>().unwrap());
                    pos += 4;
                }
                TypedObject::Vector(v)
            }
        };

        let subject_str = dict_get(subject_idx[i], "subject")?.clone();
        let predicate_str = dict_get(predicate_idx[i], "predicate")?.clone();
        let subject = EntityId::new(&subject_str).map_err(|_| Error::codec("invalid subject in frame"))?;
        let predicate =
            Predicate::new(&predicate_str).map_err(|_| Error::codec("invalid predicate in frame"))?;

        triples.push(
            Triple::new(subject, predicate, object, timestamps[i], tx_ids[i].clone())
                .map_err(|_| Error::codec("invalid triple in frame"))?,
        );
    }

    Ok(DecodedFrame { namespace, triples })
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphdb_core::ids::{EntityId, Predicate, TransactionId};

    fn sample_triples() -> Vec<Triple> {
        let tx = |n: u64| TransactionId::generate(n, [7; 10]);
        vec![
            Triple::new(
                EntityId::new("https://e.com/alice").unwrap(),
                Predicate::new("name").unwrap(),
                TypedObject::String("Alice".into()),
                1,
                tx(1),
            )
            .unwrap(),
            Triple::new(
                EntityId::new("https://e.com/alice").unwrap(),
                Predicate::new("age").unwrap(),
                TypedObject::Int64(30),
                2,
                tx(2),
            )
            .unwrap(),
            Triple::new(
                EntityId::new("https://e.com/alice").unwrap(),
                Predicate::new("follows").unwrap(),
                TypedObject::Ref(EntityId::new("https://e.com/bob").unwrap()),
                3,
                tx(3),
            )
            .unwrap(),
            Triple::new(
                EntityId::new("https://e.com/alice").unwrap(),
                Predicate::new("home").unwrap(),
                TypedObject::geo_point(37.5, -122.3).unwrap(),
                4,
                tx(4),
            )
            .unwrap(),
            Triple::new(
                EntityId::new("https://e.com/alice").unwrap(),
                Predicate::new("deleted_field").unwrap(),
                TypedObject::Null,
                5,
                tx(5),
            )
            .unwrap(),
        ]
    }

    #[test]
    fn roundtrip_preserves_order_and_fields() {
        let triples = sample_triples();
        let ns = Namespace::new("https://e.com").unwrap();
        let bytes = encode(&triples, &ns);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.namespace, ns);
        assert_eq!(decoded.triples, triples);
    }

    #[test]
    fn crc_mismatch_rejected() {
        let triples = sample_triples();
        let ns = Namespace::new("https://e.com").unwrap();
        let mut bytes = encode(&triples, &ns);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn unknown_version_rejected() {
        let triples = sample_triples();
        let ns = Namespace::new("https://e.com").unwrap();
        let mut bytes = encode(&triples, &ns);
        bytes[4] = 99;
        // recompute crc so we isolate the version check
        let body = &bytes[..bytes.len() - 4];
        let crc = crc32(body);
        let len = bytes.len();
        bytes[len - 4..].copy_from_slice(&crc.to_le_bytes());
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn empty_batch_roundtrips() {
        let ns = Namespace::new("https://e.com").unwrap();
        let bytes = encode(&[], &ns);
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.triples.is_empty());
    }

    #[test]
    fn dictionary_dedupes_repeated_subject() {
        let triples = sample_triples();
        let ns = Namespace::new("https://e.com").unwrap();
        let bytes = encode(&triples, &ns);
        // All five triples share subject "https://e.com/alice"; the naive
        // per-row encoding would store it 5 times. Dictionary encoding
        // should keep total size well under that.
        assert!(bytes.len() < 5 * "https://e.com/alice".len() * 2);
    }
}
