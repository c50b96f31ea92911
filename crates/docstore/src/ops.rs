//! Operation descriptors
//!
//! One value type per operation, carrying exactly the inputs that operation
//! needs. Descriptors are built by the caller for each call.

use crate::Result;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::FindOptions as DriverFindOptions;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

fn parse_id(id: &str) -> Result<ObjectId> {
    Ok(ObjectId::parse_str(id)?)
}

/// `Some(fields)` when a projection was requested
pub(crate) fn projection(fields: &Document) -> Option<Document> {
    if fields.is_empty() {
        None
    } else {
        Some(fields.clone())
    }
}

/// Whether `doc` is made of update operators (`$set`, `$inc`, ...)
pub fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

/// Operator form of `data` for multi-document updates
///
/// A plain document is applied as `{"$set": data}`.
pub(crate) fn operator_form(data: &Document) -> Document {
    if is_operator_document(data) {
        data.clone()
    } else {
        doc! { "$set": data.clone() }
    }
}

/// Decode documents returned by a find into `T`
pub fn decode<T: DeserializeOwned>(documents: Vec<Document>) -> Result<Vec<T>> {
    documents
        .into_iter()
        .map(|document| Ok(bson::from_document(document)?))
        .collect()
}

/// Insert one document
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// Document to insert
    pub data: Document,
}

impl Insert {
    /// Insert `data`
    pub fn new(data: Document) -> Self {
        Self { data }
    }

    /// Insert any serializable value
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::new(bson::to_document(value)?))
    }
}

/// Insert many documents in one unordered batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkInsert {
    /// Documents to insert
    pub data: Vec<Document>,
}

impl BulkInsert {
    /// Insert `data`
    pub fn new(data: Vec<Document>) -> Self {
        Self { data }
    }

    /// Insert a sequence of serializable values
    pub fn from_serialize<'a, T, I>(values: I) -> Result<Self>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let data = values
            .into_iter()
            .map(bson::to_document)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(data))
    }
}

/// Replace (or operator-update) the document with a given id
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Hex encoded object id
    pub id: String,
    /// Replacement document, or an operator document
    pub data: Document,
}

impl Update {
    /// Update document `id` with `data`
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Parsed object id
    pub fn object_id(&self) -> Result<ObjectId> {
        parse_id(&self.id)
    }
}

/// Replace the document with a given id, inserting it when absent
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    /// Hex encoded object id
    pub id: String,
    /// Replacement document, or an operator document
    pub data: Document,
}

impl Upsert {
    /// Upsert document `id` with `data`
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Parsed object id
    pub fn object_id(&self) -> Result<ObjectId> {
        parse_id(&self.id)
    }
}

/// Update every document matching a filter
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAll {
    /// Filter
    pub query: Document,
    /// Operator document, or fields to `$set`
    pub data: Document,
}

impl UpdateAll {
    /// Update documents matching `query` with `data`
    pub fn new(query: Document, data: Document) -> Self {
        Self { query, data }
    }
}

/// Update every document matching a filter, inserting one when none match
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertAll {
    /// Filter
    pub query: Document,
    /// Operator document, or fields to `$set`
    pub data: Document,
}

impl UpsertAll {
    /// Upsert documents matching `query` with `data`
    pub fn new(query: Document, data: Document) -> Self {
        Self { query, data }
    }
}

/// Fetch one document by id
#[derive(Debug, Clone, PartialEq)]
pub struct FindById {
    /// Hex encoded object id
    pub id: String,
    /// Projection; empty returns every field
    pub fields: Document,
}

impl FindById {
    /// Find document `id` with every field
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Document::new(),
        }
    }

    /// Restrict the returned fields
    pub fn with_fields(mut self, fields: Document) -> Self {
        self.fields = fields;
        self
    }

    /// Parsed object id
    pub fn object_id(&self) -> Result<ObjectId> {
        parse_id(&self.id)
    }
}

/// Optional skip and limit for [`Find`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Matches to skip before returning documents
    pub skip: Option<u64>,
    /// Maximum number of documents to return; zero means no limit
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Skip the first `skip` matches
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Return at most `limit` documents
    ///
    /// A limit of zero is treated as absent, so every match is returned.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Read the `"skip"` and `"limit"` keys of an options map
    ///
    /// Negative values are ignored; other keys are ignored.
    pub fn from_map(map: &HashMap<String, i64>) -> Self {
        let value = |key: &str| map.get(key).and_then(|v| u64::try_from(*v).ok());
        Self {
            skip: value("skip"),
            limit: value("limit"),
        }
    }

    /// Fold skip, then limit, onto driver options
    ///
    /// Nothing is set for an absent field or a zero limit.
    pub(crate) fn apply(&self, options: &mut DriverFindOptions) {
        if let Some(skip) = self.skip {
            options.skip = Some(skip);
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
    }
}

/// Fetch documents matching a filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Find {
    /// Filter
    pub query: Document,
    /// Projection; empty returns every field
    pub fields: Document,
    /// Skip and limit
    pub options: FindOptions,
}

impl Find {
    /// Find documents matching `query`
    pub fn new(query: Document) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    /// Restrict the returned fields
    pub fn with_fields(mut self, fields: Document) -> Self {
        self.fields = fields;
        self
    }

    /// Set skip and limit
    pub fn with_options(mut self, options: FindOptions) -> Self {
        self.options = options;
        self
    }
}

/// Fetch every document in the collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAll {
    /// Projection; empty returns every field
    pub fields: Document,
}

impl FindAll {
    /// Find everything, every field
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the returned fields
    pub fn with_fields(mut self, fields: Document) -> Self {
        self.fields = fields;
        self
    }
}

/// Remove the first document matching a filter
#[derive(Debug, Clone, PartialEq)]
pub struct Remove {
    /// Filter
    pub query: Document,
}

impl Remove {
    /// Remove a document matching `query`
    pub fn new(query: Document) -> Self {
        Self { query }
    }

    /// Remove the document with a given hex id
    pub fn by_id(id: &str) -> Result<Self> {
        Ok(Self::new(doc! { "_id": parse_id(id)? }))
    }
}

/// Remove every document in the collection
///
/// Irreversible. Only constructible through [`RemoveAll::confirmed`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveAll {
    _confirmed: (),
}

impl RemoveAll {
    /// Acknowledge that the whole collection will be emptied
    pub fn confirmed() -> Self {
        Self { _confirmed: () }
    }
}

/// Matched, modified and removed counts of a write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeInfo {
    /// Documents matched by the filter
    pub matched: u64,
    /// Documents changed
    pub modified: u64,
    /// Documents removed
    pub removed: u64,
    /// Id of the document inserted by an upsert
    pub upserted_id: Option<Bson>,
}

impl ChangeInfo {
    /// Whether an upsert inserted a new document
    pub fn upserted(&self) -> bool {
        self.upserted_id.is_some()
    }
}

/// One document rejected from a bulk insert
#[derive(Debug, Clone, PartialEq)]
pub struct BulkFailure {
    /// Position of the document in the batch
    pub index: usize,
    /// Server error code
    pub code: i32,
    /// Server error message
    pub message: String,
}

/// Outcome of a bulk insert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResult {
    /// Documents inserted
    pub inserted: u64,
    /// Documents rejected
    pub failures: Vec<BulkFailure>,
}

impl BulkResult {
    /// Whether every document was inserted
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_options_fold() {
        let cases = [
            (FindOptions::default(), None, None),
            (FindOptions::default().skip(5), Some(5), None),
            (FindOptions::default().limit(10), None, Some(10)),
            (FindOptions::default().skip(5).limit(10), Some(5), Some(10)),
        ];

        for (window, skip, limit) in cases {
            let mut options = DriverFindOptions::default();
            window.apply(&mut options);
            assert_eq!(options.skip, skip);
            assert_eq!(options.limit, limit);
        }
    }

    #[test]
    fn test_find_options_limit_saturates() {
        let mut options = DriverFindOptions::default();
        FindOptions::default().limit(u64::MAX).apply(&mut options);
        assert_eq!(options.limit, Some(i64::MAX));
    }

    #[test]
    fn test_find_options_zero_limit_is_unbounded() {
        let mut options = DriverFindOptions::default();
        FindOptions::default().skip(2).limit(0).apply(&mut options);
        assert_eq!(options.skip, Some(2));
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_find_options_from_map() {
        let mut map = HashMap::new();
        map.insert("limit".to_string(), 20);
        map.insert("skip".to_string(), 3);
        map.insert("sort".to_string(), 1);
        assert_eq!(
            FindOptions::from_map(&map),
            FindOptions::default().skip(3).limit(20)
        );

        map.insert("skip".to_string(), -1);
        assert_eq!(FindOptions::from_map(&map).skip, None);
    }

    #[test]
    fn test_operator_detection() {
        assert!(is_operator_document(&doc! { "$set": { "age": 27 } }));
        assert!(!is_operator_document(&doc! { "name": "a", "$weird": 1 }));
        assert!(!is_operator_document(&Document::new()));
    }

    #[test]
    fn test_operator_form_wraps_plain_documents() {
        let plain = doc! { "age": 30 };
        assert_eq!(operator_form(&plain), doc! { "$set": { "age": 30 } });

        let ops = doc! { "$inc": { "age": 1 } };
        assert_eq!(operator_form(&ops), ops);
    }

    #[test]
    fn test_projection_empty_is_none() {
        assert_eq!(projection(&Document::new()), None);
        assert_eq!(projection(&doc! { "name": 1 }), Some(doc! { "name": 1 }));
    }

    #[test]
    fn test_object_id_parsing() {
        let id = ObjectId::new();
        assert_eq!(FindById::new(id.to_hex()).object_id().unwrap(), id);
        assert!(Update::new("zz", Document::new()).object_id().is_err());
        assert!(Remove::by_id("123").is_err());
        assert_eq!(
            Remove::by_id(&id.to_hex()).unwrap().query,
            doc! { "_id": id }
        );
    }

    #[test]
    fn test_decode() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Person {
            name: String,
        }

        let people: Vec<Person> = decode(vec![doc! { "name": "Ada", "_id": 1 }]).unwrap();
        assert_eq!(people, vec![Person { name: "Ada".into() }]);

        let err = decode::<Person>(vec![doc! { "age": 3 }]).unwrap_err();
        assert!(matches!(err, crate::DocStoreError::Deserialization(_)));
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Person {
            first_name: String,
            age: i32,
        }

        let people = vec![
            Person { first_name: "Ada".into(), age: 36 },
            Person { first_name: "Alan".into(), age: 41 },
        ];

        let insert = Insert::from_serialize(&people[0]).unwrap();
        assert_eq!(insert.data, doc! { "first_name": "Ada", "age": 36 });

        let bulk = BulkInsert::from_serialize(&people).unwrap();
        assert_eq!(bulk.data.len(), 2);
    }
}
