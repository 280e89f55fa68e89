//! An in-memory datastore used only by this crate's own test suite,
//! grounded on the shape of [`super::Keyspace`]/[`super::Indexer`]/
//! [`super::Index`] rather than on any real storage engine (spec §6
//! leaves the datastore itself out of scope).
use super::{Capability, Index, Indexer, Keyspace};
use crate::err::Error;
use crate::expr::Expression;
use crate::planner::span::SargSpans;
use crate::value::{AnnotatedValue, Value};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

pub struct MockIndex {
	id: String,
	keys: Vec<Expression>,
	capabilities: Vec<Capability>,
}

impl MockIndex {
	pub fn new(id: &str, keys: Vec<Expression>, capabilities: Vec<Capability>) -> Self {
		Self {
			id: id.to_string(),
			keys,
			capabilities,
		}
	}
}

pub struct MockKeyspace {
	namespace: String,
	name: String,
	documents: RwLock<Vec<Value>>,
	indexer: MockIndexer,
}

pub struct MockIndexer {
	indexes: Vec<MockIndex>,
}

impl MockKeyspace {
	pub fn new(namespace: &str, name: &str, documents: Vec<Value>, indexes: Vec<MockIndex>) -> Self {
		Self {
			namespace: namespace.to_string(),
			name: name.to_string(),
			documents: RwLock::new(documents),
			indexer: MockIndexer {
				indexes,
			},
		}
	}

	fn docs_matching(&self, index: &MockIndex, spans: &SargSpans) -> Vec<AnnotatedValue> {
		use crate::expr::EvalContext;
		struct NoParams;
		impl EvalContext for NoParams {
			fn positional_arg(&self, _: usize) -> Option<&Value> {
				None
			}
			fn named_arg(&self, _: &str) -> Option<&Value> {
				None
			}
		}
		let key = &index.keys[0];
		self.documents
			.read()
			.unwrap()
			.iter()
			.filter_map(|doc| {
				let item = AnnotatedValue::new(doc.clone());
				let key_value = key.evaluate(&item, &NoParams).ok()?;
				if spans.contains(&key_value) {
					Some(item)
				} else {
					None
				}
			})
			.collect()
	}
}

impl Index for MockIndex {
	fn id(&self) -> &str {
		&self.id
	}

	fn range_key(&self) -> &[Expression] {
		&self.keys
	}

	fn condition(&self) -> Option<&Expression> {
		None
	}

	fn supports(&self, capability: Capability) -> bool {
		self.capabilities.contains(&capability)
	}

	fn scan(&self, _spans: &SargSpans, _exact: bool) -> Result<Vec<AnnotatedValue>, Error> {
		// The owning keyspace does the actual document walk (it alone
		// holds the document set); this method exists to satisfy the
		// trait surface used by planner-facing code paths that hold
		// only a `&dyn Index`, none of which this mock's tests exercise
		// directly.
		Err(Error::runtime("MockIndex::scan is not reachable from tests; use MockKeyspace::fetch"))
	}

	fn scan_count(&self, _spans: &SargSpans, _distinct: bool) -> Result<u64, Error> {
		Err(Error::runtime("MockIndex::scan_count is not reachable from tests"))
	}
}

impl Indexer for MockIndexer {
	fn indexes(&self) -> Vec<&dyn Index> {
		self.indexes.iter().map(|i| i as &dyn Index).collect()
	}

	fn index_by_id(&self, id: &str) -> Option<&dyn Index> {
		self.indexes.iter().find(|i| i.id == id).map(|i| i as &dyn Index)
	}

	fn index_by_name(&self, name: &str) -> Option<&dyn Index> {
		self.index_by_id(name)
	}
}

impl Keyspace for MockKeyspace {
	fn namespace(&self) -> &str {
		&self.namespace
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn indexer(&self, _using: &str) -> Option<&dyn Indexer> {
		Some(&self.indexer)
	}

	fn fetch(&self, spans: &SargSpans) -> Result<Vec<AnnotatedValue>, Error> {
		if let Some(index) = self.indexer.indexes.first() {
			return Ok(self.docs_matching(index, spans));
		}
		Ok(self.documents.read().unwrap().iter().cloned().map(AnnotatedValue::new).collect())
	}

	fn insert(&self, doc: Value) -> Result<(), Error> {
		self.documents.write().unwrap().push(doc);
		Ok(())
	}

	fn update(&self, key: &Value, doc: Value) -> Result<(), Error> {
		let mut docs = self.documents.write().unwrap();
		if let Some(slot) = docs.iter_mut().find(|d| d.get_field("id") == *key) {
			*slot = doc;
		}
		Ok(())
	}

	fn delete(&self, key: &Value) -> Result<(), Error> {
		self.documents.write().unwrap().retain(|d| d.get_field("id") != *key);
		Ok(())
	}
}

#[derive(Default)]
pub struct MockCatalog {
	keyspaces: Mutex<HashMap<(String, String), MockKeyspace>>,
}

impl MockCatalog {
	pub fn register(&self, keyspace: MockKeyspace) {
		let key = (keyspace.namespace.clone(), keyspace.name.clone());
		self.keyspaces.lock().unwrap().insert(key, keyspace);
	}
}

// `Catalog::keyspace` must hand back a `&dyn Keyspace` borrowed from
// `self`; a `Mutex<HashMap<_, MockKeyspace>>` cannot yield that without
// holding the lock open, so tests build the catalog once up front and
// read through `with_keyspace` instead of the `Catalog` trait directly.
impl MockCatalog {
	pub fn with_keyspace<R>(&self, namespace: &str, name: &str, f: impl FnOnce(&dyn Keyspace) -> R) -> Option<R> {
		let guard = self.keyspaces.lock().unwrap();
		guard.get(&(namespace.to_string(), name.to_string())).map(|ks| f(ks))
	}
}
