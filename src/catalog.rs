//! Schema catalog: entity and field descriptors
//!
//! Each entity exposes a fixed set of logical fields. A descriptor maps
//! them to physical column expressions, declares their types and says
//! which of them may be filtered or sorted on. Descriptors are declared
//! explicitly with a builder and registered once per entity in a
//! [`SchemaCatalog`], which is then shared for concurrent reads.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

use crate::error::{FilterError, Result};
use crate::sql::sanitize::{to_snake_case, validate_identifier};
use crate::types::FieldType;

/// Junction table backing a many-to-many field
///
/// For `User.roleIds` stored in `user_roles(user_id, role_id)` the owner
/// column is `user_id` and the related column is `role_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Junction {
    pub table: String,
    /// Column referencing the root entity's identity
    pub owner_column: String,
    /// Column holding the related identifier being filtered on
    pub related_column: String,
}

impl Junction {
    pub fn new(
        table: impl Into<String>,
        owner_column: impl Into<String>,
        related_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            owner_column: owner_column.into(),
            related_column: related_column.into(),
        }
    }
}

/// Metadata for a single logical field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    /// Logical name used in filter and sort text
    pub name: String,
    /// Physical column or SQL expression, e.g. `u.first_name` or
    /// `CONCAT(u.first_name, ' ', u.last_name)`
    pub column: String,
    pub field_type: FieldType,
    pub filterable: bool,
    pub sortable: bool,
    /// Set when the field's values live in a junction table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junction: Option<Junction>,
}

impl FieldDescriptor {
    /// Create a filterable, sortable field whose column is the snake_case
    /// form of its name
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            column: to_snake_case(&name),
            name,
            field_type,
            filterable: true,
            sortable: true,
            junction: None,
        }
    }

    /// Create a many-valued field stored in a junction table
    ///
    /// Junction fields are filterable but not sortable.
    pub fn junction(name: impl Into<String>, element_type: FieldType, junction: Junction) -> Self {
        Self {
            sortable: false,
            junction: Some(junction),
            ..Self::new(name, FieldType::collection(element_type))
        }
    }

    /// Set the physical column or expression
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn not_filterable(self) -> Self {
        self.filterable(false)
    }

    pub fn not_sortable(self) -> Self {
        self.sortable(false)
    }

    pub fn is_junction(&self) -> bool {
        self.junction.is_some()
    }
}

/// Metadata for an entity: its table and ordered fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescriptor {
    identity: String,
    table_name: String,
    id_column: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    /// Start declaring the descriptor for an entity
    ///
    /// # Example
    /// ```
    /// use runtara_filter::{EntityDescriptor, FieldDescriptor, FieldType, Junction};
    ///
    /// let users = EntityDescriptor::builder("User")
    ///     .id_column("u.user_id")
    ///     .field(FieldDescriptor::new("userId", FieldType::Integer).column("u.user_id"))
    ///     .field(FieldDescriptor::new("firstName", FieldType::String).column("u.first_name"))
    ///     .field(FieldDescriptor::junction(
    ///         "roleIds",
    ///         FieldType::Integer,
    ///         Junction::new("user_roles", "user_id", "role_id"),
    ///     ))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(users.table_name(), "users");
    /// assert_eq!(users.column_name("firstName"), Some("u.first_name"));
    /// assert!(!users.is_sortable("roleIds"));
    /// ```
    pub fn builder(identity: impl Into<String>) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder::new(identity)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Root identity expression, used by junction subqueries
    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_filterable(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.filterable)
    }

    pub fn is_sortable(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.sortable)
    }

    pub fn column_name(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.column.as_str())
    }

    pub fn filterable_fields(&self) -> BTreeSet<&str> {
        self.fields
            .iter()
            .filter(|f| f.filterable)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn sortable_fields(&self) -> BTreeSet<&str> {
        self.fields
            .iter()
            .filter(|f| f.sortable)
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Builder for EntityDescriptor
#[derive(Debug)]
pub struct EntityDescriptorBuilder {
    identity: String,
    table_name: Option<String>,
    id_column: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl EntityDescriptorBuilder {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            table_name: None,
            id_column: None,
            fields: Vec::new(),
        }
    }

    /// Set the table or view name (default: pluralized snake_case identity)
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Set the root identity expression, required when any field is
    /// junction-backed
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Build the descriptor, checking field names and column mappings
    pub fn build(self) -> Result<EntityDescriptor> {
        let identity = self.identity.trim().to_string();
        if identity.is_empty() {
            return Err(FilterError::invalid_descriptor(
                "Entity identity cannot be empty",
            ));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(FilterError::invalid_descriptor(format!(
                    "Entity '{}' has a field with an empty name",
                    identity
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(FilterError::invalid_descriptor(format!(
                    "Duplicate field '{}' in entity '{}'",
                    field.name, identity
                )));
            }
            if field.filterable && field.column.trim().is_empty() {
                return Err(FilterError::invalid_descriptor(format!(
                    "Filterable field '{}' in entity '{}' has no column",
                    field.name, identity
                )));
            }
            if let Some(junction) = &field.junction {
                for part in [
                    &junction.table,
                    &junction.owner_column,
                    &junction.related_column,
                ] {
                    validate_identifier(part).map_err(FilterError::invalid_descriptor)?;
                }
                if self.id_column.is_none() {
                    return Err(FilterError::invalid_descriptor(format!(
                        "Junction field '{}' requires entity '{}' to declare an id column",
                        field.name, identity
                    )));
                }
            }
        }

        let table_name = self
            .table_name
            .unwrap_or_else(|| pluralize(&to_snake_case(&identity)));

        Ok(EntityDescriptor {
            identity,
            table_name,
            id_column: self.id_column,
            fields: self.fields,
        })
    }
}

/// English plural of a snake_case table stem
fn pluralize(word: &str) -> String {
    let consonant_y = word.len() > 1
        && word.ends_with('y')
        && !word[..word.len() - 1].ends_with(['a', 'e', 'i', 'o', 'u']);

    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if word.ends_with(['s', 'x', 'z']) || word.ends_with("ch") || word.ends_with("sh") {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// A type that declares its own entity descriptor
///
/// The catalog builds the descriptor on first use and keeps it.
pub trait Describe {
    /// Identity the descriptor is registered under
    const ENTITY: &'static str;

    fn descriptor() -> Result<EntityDescriptor>;
}

/// Registry of entity descriptors, populated at most once per entity
///
/// Construct one at startup and share it (usually behind an `Arc`);
/// lookups after population are lock-free reads on the map shards.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    entities: DashMap<String, Arc<EntityDescriptor>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its identity
    ///
    /// Registering the same identity twice is an error.
    pub fn register(&self, descriptor: EntityDescriptor) -> Result<Arc<EntityDescriptor>> {
        match self.entities.entry(descriptor.identity.clone()) {
            Entry::Occupied(_) => Err(FilterError::invalid_descriptor(format!(
                "Entity '{}' is already registered",
                descriptor.identity
            ))),
            Entry::Vacant(slot) => {
                let descriptor = Arc::new(descriptor);
                slot.insert(Arc::clone(&descriptor));
                tracing::debug!(
                    entity = %descriptor.identity,
                    fields = descriptor.fields.len(),
                    "Registered entity descriptor"
                );
                Ok(descriptor)
            }
        }
    }

    /// Look up a registered descriptor
    pub fn describe(&self, identity: &str) -> Result<Arc<EntityDescriptor>> {
        self.entities
            .get(identity)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FilterError::unknown_entity(identity))
    }

    /// Look up the descriptor of `E`, building and registering it on first use
    ///
    /// The map shard stays locked while the descriptor is built, so
    /// concurrent first calls build it once. `E::descriptor` must not call
    /// back into this catalog.
    pub fn describe_entity<E: Describe>(&self) -> Result<Arc<EntityDescriptor>> {
        if let Some(entry) = self.entities.get(E::ENTITY) {
            return Ok(Arc::clone(entry.value()));
        }

        match self.entities.entry(E::ENTITY.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let descriptor = E::descriptor()?;
                if descriptor.identity != E::ENTITY {
                    return Err(FilterError::invalid_descriptor(format!(
                        "Descriptor identity '{}' does not match entity '{}'",
                        descriptor.identity,
                        E::ENTITY
                    )));
                }
                let descriptor = Arc::new(descriptor);
                slot.insert(Arc::clone(&descriptor));
                tracing::debug!(entity = E::ENTITY, "Built entity descriptor on first use");
                Ok(descriptor)
            }
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entities.contains_key(identity)
    }

    /// Registered identities, sorted
    pub fn entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
