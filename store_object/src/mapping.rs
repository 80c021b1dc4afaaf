//! Type mappings
//!
//! A [`TypeMapping`] bundles the put, get and delete resolvers of one value
//! type. [`TypeMappings`] is the registry the storage consults when an
//! operation is prepared without an explicit resolver.

use crate::resolvers::{DeleteResolver, GetResolver, PutResolver};
use crate::validation::quote_identifier;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct TypeMapping<T: Send + Sync + 'static> {
    put_resolver: Arc<dyn PutResolver<T>>,
    get_resolver: Arc<dyn GetResolver<T>>,
    delete_resolver: Arc<dyn DeleteResolver<T>>,
}

impl<T: Send + Sync + 'static> TypeMapping<T> {
    pub fn new<P, G, D>(put_resolver: P, get_resolver: G, delete_resolver: D) -> Self
    where
        P: PutResolver<T> + 'static,
        G: GetResolver<T> + 'static,
        D: DeleteResolver<T> + 'static,
    {
        Self {
            put_resolver: Arc::new(put_resolver),
            get_resolver: Arc::new(get_resolver),
            delete_resolver: Arc::new(delete_resolver),
        }
    }

    pub fn put_resolver(&self) -> Arc<dyn PutResolver<T>> {
        Arc::clone(&self.put_resolver)
    }

    pub fn get_resolver(&self) -> Arc<dyn GetResolver<T>> {
        Arc::clone(&self.get_resolver)
    }

    pub fn delete_resolver(&self) -> Arc<dyn DeleteResolver<T>> {
        Arc::clone(&self.delete_resolver)
    }
}

impl<T: Send + Sync + 'static> Clone for TypeMapping<T> {
    fn clone(&self) -> Self {
        Self {
            put_resolver: Arc::clone(&self.put_resolver),
            get_resolver: Arc::clone(&self.get_resolver),
            delete_resolver: Arc::clone(&self.delete_resolver),
        }
    }
}

/// A value type stored in one table. Usually derived with
/// `#[derive(StorageType)]`.
pub trait StorageType: Sized + Send + Sync + 'static {
    fn table_name() -> &'static str;

    fn column_names() -> &'static [&'static str];

    fn create_table_sql() -> String;

    fn drop_table_sql() -> String {
        format!("DROP TABLE IF EXISTS {}", quote_identifier(Self::table_name()))
    }

    fn type_mapping() -> TypeMapping<Self>;
}

/// Registry of type mappings keyed by value type
#[derive(Clone, Default)]
pub struct TypeMappings {
    mappings: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    names: Vec<&'static str>,
}

impl TypeMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the mapping a [`StorageType`] provides for itself
    pub fn with<T: StorageType>(self) -> Self {
        self.with_mapping(T::type_mapping())
    }

    pub fn with_mapping<T: Send + Sync + 'static>(mut self, mapping: TypeMapping<T>) -> Self {
        self.insert(mapping);
        self
    }

    /// Registering a type twice replaces the earlier mapping
    pub fn insert<T: Send + Sync + 'static>(&mut self, mapping: TypeMapping<T>) {
        let previous = self.mappings.insert(TypeId::of::<T>(), Arc::new(mapping));
        if previous.is_none() {
            self.names.push(std::any::type_name::<T>());
        }
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&TypeMapping<T>> {
        self.mappings
            .get(&TypeId::of::<T>())
            .and_then(|mapping| mapping.downcast_ref::<TypeMapping<T>>())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.mappings.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn type_names(&self) -> &[&'static str] {
        &self.names
    }
}

impl fmt::Debug for TypeMappings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMappings").field("types", &self.names).finish()
    }
}
