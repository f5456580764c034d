use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, Order, SortSpec};

#[must_use]
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op: CmpOp::Ne, value } => {
            !get_path(doc, path).is_some_and(|v| compare_bson(v, value) == Ordering::Equal)
        }
        Filter::Cmp { path, op, value } => get_path(doc, path).is_some_and(|v| {
            let c = compare_bson(v, value);
            match op {
                CmpOp::Eq => c == Ordering::Equal,
                CmpOp::Gt => c == Ordering::Greater,
                CmpOp::Gte => c != Ordering::Less,
                CmpOp::Lt => c == Ordering::Less,
                CmpOp::Lte => c != Ordering::Greater,
                CmpOp::Ne => c != Ordering::Equal,
            }
        }),
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| compare_bson(v, x) == Ordering::Equal)
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

/// Total order over BSON values: numbers compare numerically across widths,
/// strings and booleans natively, anything else by type rank.
#[allow(clippy::cast_precision_loss)]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    fn as_f64_num(x: &Bson) -> Option<f64> {
        match x {
            Bson::Int32(i) => Some(f64::from(*i)),
            Bson::Int64(i) => Some(*i as f64),
            Bson::Double(f) => Some(*f),
            _ => None,
        }
    }
    if let (Bson::Int64(x), Bson::Int64(y)) = (a, b) {
        return x.cmp(y);
    }
    if let (Some(x), Some(y)) = (as_f64_num(a), as_f64_num(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Null, Bson::Null) => Ordering::Equal,
        _ if type_rank(a) == type_rank(b) => {
            if a == b { Ordering::Equal } else { format!("{a}").cmp(&format!("{b}")) }
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Mongo's cross-type sort order.
fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}

/// Keeps `_id` plus the listed fields; dotted paths keep their nesting.
pub fn project_include(doc: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut out = BsonDocument::new();
    if let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for f in fields {
        if let Some(v) = get_path(doc, f) {
            insert_path(&mut out, f, v.clone());
        }
    }
    out
}

pub fn project_exclude(doc: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut out = doc.clone();
    for f in fields {
        remove_path(&mut out, f);
    }
    out
}

fn insert_path(doc: &mut BsonDocument, path: &str, val: Bson) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return };
    let mut cur = doc;
    for key in parts {
        if !matches!(cur.get(key), Some(Bson::Document(_))) {
            cur.insert(key, BsonDocument::new());
        }
        match cur.get_mut(key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return,
        }
    }
    cur.insert(last, val);
}

fn remove_path(doc: &mut BsonDocument, path: &str) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return };
    if parts.len() >= MAX_PATH_DEPTH {
        return;
    }
    let mut cur = doc;
    for key in parts {
        match cur.get_mut(key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return,
        }
    }
    cur.remove(last);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numeric_widths_compare_equal() {
        assert_eq!(compare_bson(&Bson::Int32(3), &Bson::Int64(3)), Ordering::Equal);
        assert_eq!(compare_bson(&Bson::Double(2.5), &Bson::Int32(3)), Ordering::Less);
    }

    #[test]
    fn ne_matches_missing_field() {
        let d = doc! {"a": 1};
        let f = Filter::Cmp { path: "b".into(), op: CmpOp::Ne, value: Bson::Int32(1) };
        assert!(eval_filter(&d, &f));
    }

    #[test]
    fn dotted_paths_resolve() {
        let d = doc! {"info": {"visits": 4}};
        assert_eq!(get_path(&d, "info.visits"), Some(&Bson::Int32(4)));
        assert_eq!(get_path(&d, "info.missing"), None);
        assert_eq!(get_path(&d, "info.visits.deeper"), None);
    }

    #[test]
    fn dotted_projection_keeps_nesting() {
        let d = doc! {"_id": 1, "name": "ada", "info": {"visits": 4, "city": "x"}};
        let fields = vec!["info.visits".to_string(), "info.city".to_string()];
        assert_eq!(project_include(&d, &fields), doc! {"_id": 1, "info": {"visits": 4, "city": "x"}});
        let out = project_exclude(&d, &["info.visits".to_string(), "nope.deep".to_string()]);
        assert_eq!(out, doc! {"_id": 1, "name": "ada", "info": {"city": "x"}});
    }
}
