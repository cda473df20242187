//! In-memory attribute store.

use crate::attribute::{
    AttributeItem, AttributeStoreClient, BatchDeleteAttributesRequest, BatchPutAttributesRequest,
    DeleteAttributesRequest, GetAttributesRequest, PutAttributesRequest, ReplaceableAttribute,
    SelectRequest, SelectResponse, UpdateCondition, COUNT_ATTRIBUTE, COUNT_ITEM_NAME,
    MAX_BATCH_ITEMS,
};
use crate::error::{StorageError, StorageResult};
use crate::select::{Output, SelectExpression};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// Items returned per select page when the statement has no limit.
pub const DEFAULT_SELECT_LIMIT: usize = 100;

type Attributes = BTreeMap<String, Vec<String>>;
type Domain = BTreeMap<String, Attributes>;

/// An attribute store held in memory.
///
/// Suitable for unit tests, integration tests and local development. It
/// evaluates select statements with the same lexicographic semantics as the
/// remote service. `page_size` caps the items returned per select page so
/// continuation tokens can be exercised with small data sets.
///
/// # Example
///
/// ```rust
/// use dualdb_storage::{AttributeStoreClient, InMemoryAttributeStore, SelectRequest};
///
/// let store = InMemoryAttributeStore::new();
/// store.create_domain("people");
/// let page = store
///     .select(&SelectRequest {
///         select_expression: "select * from `people`".to_string(),
///         next_token: None,
///         consistent_read: true,
///     })
///     .unwrap();
/// assert!(page.items.is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryAttributeStore {
    domains: RwLock<BTreeMap<String, Domain>>,
    page_size: usize,
}

impl Default for InMemoryAttributeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAttributeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(usize::MAX)
    }

    /// Creates an empty store returning at most `page_size` items per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            domains: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Creates a domain. Creating an existing domain is a no-op.
    pub fn create_domain(&self, name: impl Into<String>) {
        self.domains.write().entry(name.into()).or_default();
    }

    /// Returns the number of items in a domain.
    #[must_use]
    pub fn item_count(&self, domain: &str) -> usize {
        self.domains.read().get(domain).map_or(0, BTreeMap::len)
    }

    /// Returns a copy of a stored item.
    #[must_use]
    pub fn item(&self, domain: &str, item_name: &str) -> Option<AttributeItem> {
        let domains = self.domains.read();
        let attributes = domains.get(domain)?.get(item_name)?;
        Some(AttributeItem {
            name: item_name.to_string(),
            attributes: attributes.clone(),
        })
    }
}

fn domain_mut<'a>(
    domains: &'a mut BTreeMap<String, Domain>,
    name: &str,
) -> StorageResult<&'a mut Domain> {
    domains
        .get_mut(name)
        .ok_or_else(|| StorageError::NoSuchTable(name.to_string()))
}

fn check_condition(
    domain: &str,
    item_name: &str,
    current: Option<&Attributes>,
    condition: &UpdateCondition,
) -> StorageResult<()> {
    let values = current
        .and_then(|attrs| attrs.get(&condition.name))
        .filter(|values| !values.is_empty());

    let holds = match (condition.exists, values, &condition.value) {
        (false, None, _) => true,
        (false, Some(_), _) => false,
        (true, None, _) => false,
        (true, Some(_), None) => true,
        (true, Some(values), Some(expected)) => values.len() == 1 && &values[0] == expected,
    };

    if holds {
        Ok(())
    } else {
        Err(StorageError::conditional_check_failed(
            domain,
            item_name,
            format!(
                "expected {} {} {:?}",
                condition.name,
                if condition.exists { "=" } else { "absent, found" },
                if condition.exists {
                    condition.value.clone()
                } else {
                    values.and_then(|v| v.first().cloned())
                }
            ),
        ))
    }
}

fn apply(attributes: &mut Attributes, writes: &[ReplaceableAttribute]) {
    let mut replaced = BTreeSet::new();
    for write in writes {
        let values = attributes.entry(write.name.clone()).or_default();
        if write.replace && replaced.insert(write.name.as_str()) {
            values.clear();
        }
        if !values.contains(&write.value) {
            values.push(write.value.clone());
        }
    }
}

fn project(item_name: &str, attributes: &Attributes, output: &Output) -> AttributeItem {
    let attributes = match output {
        Output::All => attributes.clone(),
        Output::ItemName | Output::Count => Attributes::new(),
        Output::Attributes(names) => attributes
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect(),
    };
    AttributeItem {
        name: item_name.to_string(),
        attributes,
    }
}

fn parse_token(token: &str) -> StorageResult<usize> {
    token
        .strip_prefix("offset:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| StorageError::InvalidNextToken(token.to_string()))
}

impl AttributeStoreClient for InMemoryAttributeStore {
    fn put_attributes(&self, request: &PutAttributesRequest) -> StorageResult<()> {
        if request.attributes.is_empty() {
            return Err(StorageError::invalid_request(format!(
                "no attributes to put for item {}",
                request.item_name
            )));
        }

        let mut domains = self.domains.write();
        let domain = domain_mut(&mut domains, &request.domain)?;

        if let Some(condition) = &request.expected {
            check_condition(
                &request.domain,
                &request.item_name,
                domain.get(&request.item_name),
                condition,
            )?;
        }

        let attributes = domain.entry(request.item_name.clone()).or_default();
        apply(attributes, &request.attributes);
        Ok(())
    }

    fn batch_put_attributes(&self, request: &BatchPutAttributesRequest) -> StorageResult<()> {
        if request.items.len() > MAX_BATCH_ITEMS {
            return Err(StorageError::BatchTooLarge {
                limit: MAX_BATCH_ITEMS,
                actual: request.items.len(),
            });
        }
        if let Some(empty) = request.items.iter().find(|item| item.attributes.is_empty()) {
            return Err(StorageError::invalid_request(format!(
                "no attributes to put for item {}",
                empty.name
            )));
        }

        let mut domains = self.domains.write();
        let domain = domain_mut(&mut domains, &request.domain)?;
        for item in &request.items {
            apply(domain.entry(item.name.clone()).or_default(), &item.attributes);
        }
        Ok(())
    }

    fn get_attributes(
        &self,
        request: &GetAttributesRequest,
    ) -> StorageResult<Option<AttributeItem>> {
        let domains = self.domains.read();
        let domain = domains
            .get(&request.domain)
            .ok_or_else(|| StorageError::NoSuchTable(request.domain.clone()))?;

        let Some(attributes) = domain.get(&request.item_name) else {
            return Ok(None);
        };
        let output = if request.attribute_names.is_empty() {
            Output::All
        } else {
            Output::Attributes(request.attribute_names.clone())
        };
        let item = project(&request.item_name, attributes, &output);
        Ok((!item.attributes.is_empty()).then_some(item))
    }

    fn delete_attributes(&self, request: &DeleteAttributesRequest) -> StorageResult<()> {
        let mut domains = self.domains.write();
        let domain = domain_mut(&mut domains, &request.domain)?;

        if let Some(condition) = &request.expected {
            check_condition(
                &request.domain,
                &request.item_name,
                domain.get(&request.item_name),
                condition,
            )?;
        }

        if request.attribute_names.is_empty() {
            domain.remove(&request.item_name);
            return Ok(());
        }

        let now_empty = match domain.get_mut(&request.item_name) {
            Some(attributes) => {
                for name in &request.attribute_names {
                    attributes.remove(name);
                }
                attributes.is_empty()
            }
            None => false,
        };
        if now_empty {
            domain.remove(&request.item_name);
        }
        Ok(())
    }

    fn batch_delete_attributes(
        &self,
        request: &BatchDeleteAttributesRequest,
    ) -> StorageResult<()> {
        if request.item_names.len() > MAX_BATCH_ITEMS {
            return Err(StorageError::BatchTooLarge {
                limit: MAX_BATCH_ITEMS,
                actual: request.item_names.len(),
            });
        }

        let mut domains = self.domains.write();
        let domain = domain_mut(&mut domains, &request.domain)?;
        for name in &request.item_names {
            domain.remove(name);
        }
        Ok(())
    }

    fn select(&self, request: &SelectRequest) -> StorageResult<SelectResponse> {
        let expr = SelectExpression::parse(&request.select_expression)?;
        let domains = self.domains.read();
        let domain = domains
            .get(&expr.domain)
            .ok_or_else(|| StorageError::NoSuchTable(expr.domain.clone()))?;

        let mut matched: Vec<(&String, &Attributes)> = domain
            .iter()
            .filter(|(name, attributes)| expr.matches(name, attributes))
            .collect();

        if expr.output == Output::Count {
            return Ok(SelectResponse {
                items: vec![AttributeItem::new(COUNT_ITEM_NAME)
                    .with(COUNT_ATTRIBUTE, matched.len().to_string())],
                next_token: None,
            });
        }

        if let Some(order) = &expr.order_by {
            matched.sort_by(|a, b| {
                let ordering = expr
                    .sort_value(a.0, a.1)
                    .cmp(&expr.sort_value(b.0, b.1));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let offset = match &request.next_token {
            Some(token) => parse_token(token)?,
            None => 0,
        };
        if offset > matched.len() {
            return Err(StorageError::InvalidNextToken(format!("offset:{offset}")));
        }

        let page = expr
            .limit
            .unwrap_or(DEFAULT_SELECT_LIMIT)
            .min(self.page_size)
            .max(1);
        let end = offset.saturating_add(page).min(matched.len());

        tracing::trace!(
            domain = %expr.domain,
            matched = matched.len(),
            offset,
            end,
            "select page"
        );

        Ok(SelectResponse {
            items: matched[offset..end]
                .iter()
                .map(|(name, attributes)| project(name, attributes, &expr.output))
                .collect(),
            next_token: (end < matched.len()).then(|| format!("offset:{end}")),
        })
    }
}
