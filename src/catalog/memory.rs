use crate::backlog::{EntityMutationListener, EntityRef};
use crate::catalog::{CatalogListing, CatalogSnapshot, CatalogSource};
use crate::error::{AppError, Result};
use crate::models::{FilterableAttribute, PriceList, Product, Template};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

/// In-memory primary store (for tests, demos and the CLI)
pub struct InMemoryCatalog {
    products: Arc<DashMap<i64, Product>>,
    templates: Arc<DashMap<i64, Template>>,
    price_lists: Arc<DashMap<i64, PriceList>>,
    attributes: RwLock<Vec<FilterableAttribute>>,
    listeners: RwLock<Vec<Arc<dyn EntityMutationListener>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: Arc::new(DashMap::new()),
            templates: Arc::new(DashMap::new()),
            price_lists: Arc::new(DashMap::new()),
            attributes: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener notified after every product create, write or delete
    pub fn subscribe(&self, listener: Arc<dyn EntityMutationListener>) {
        self.listeners.write().push(listener);
    }

    async fn notify(&self, entities: Vec<EntityRef>) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in listeners {
            listener.on_entity_mutated(&entities).await?;
        }
        Ok(())
    }

    pub async fn create_template(&self, template: Template) -> Result<()> {
        template.validate()?;
        if self.templates.contains_key(&template.id) {
            return Err(AppError::Validation(format!(
                "Template {} already exists",
                template.id
            )));
        }
        tracing::debug!(template_id = template.id, "Template created");
        self.templates.insert(template.id, template);
        Ok(())
    }

    /// Update a template and every variant built on it.
    ///
    /// All child products are queued for re-indexing since their documents
    /// carry template fields.
    pub async fn write_template(&self, template: Template) -> Result<usize> {
        template.validate()?;
        if !self.templates.contains_key(&template.id) {
            return Err(AppError::NotFound(format!("Template {} not found", template.id)));
        }

        let mut touched = Vec::new();
        for mut product in self.products.iter_mut() {
            if product.template.id == template.id {
                product.template = template.clone();
                touched.push(EntityRef::product(product.id));
            }
        }
        self.templates.insert(template.id, template);

        let count = touched.len();
        tracing::debug!(children = count, "Template written");
        self.notify(touched).await?;
        Ok(count)
    }

    /// Store a new product; its template is registered when not known yet
    pub async fn create_product(&self, product: Product) -> Result<()> {
        product.validate()?;
        product.template.validate()?;
        if self.products.contains_key(&product.id) {
            return Err(AppError::Validation(format!(
                "Product {} already exists",
                product.id
            )));
        }

        self.templates
            .entry(product.template.id)
            .or_insert_with(|| product.template.clone());

        let entity = EntityRef::product(product.id);
        self.products.insert(product.id, product);
        tracing::debug!(product_id = entity.entity_id, "Product created");
        self.notify(vec![entity]).await
    }

    /// Create many products, notifying listeners once for the whole set.
    ///
    /// The batch is all or nothing: nothing is stored unless every product
    /// is valid and new.
    pub async fn create_products(&self, products: Vec<Product>) -> Result<()> {
        let mut ids = HashSet::with_capacity(products.len());
        for product in &products {
            product.validate()?;
            product.template.validate()?;
            if self.products.contains_key(&product.id) || !ids.insert(product.id) {
                return Err(AppError::Validation(format!(
                    "Product {} already exists",
                    product.id
                )));
            }
        }

        let mut created = Vec::with_capacity(products.len());
        for product in products {
            self.templates
                .entry(product.template.id)
                .or_insert_with(|| product.template.clone());
            created.push(EntityRef::product(product.id));
            self.products.insert(product.id, product);
        }
        tracing::debug!(count = created.len(), "Products created");
        self.notify(created).await
    }

    pub async fn write_product(&self, product: Product) -> Result<()> {
        product.validate()?;
        product.template.validate()?;
        if !self.products.contains_key(&product.id) {
            return Err(AppError::NotFound(format!("Product {} not found", product.id)));
        }

        let entity = EntityRef::product(product.id);
        self.products.insert(product.id, product);
        tracing::debug!(product_id = entity.entity_id, "Product updated");
        self.notify(vec![entity]).await
    }

    /// Remove a product; listeners are notified so its document gets dropped
    pub async fn delete_product(&self, id: i64) -> Result<bool> {
        let removed = self.products.remove(&id).is_some();
        if removed {
            tracing::debug!(product_id = id, "Product deleted");
            self.notify(vec![EntityRef::product(id)]).await?;
        }
        Ok(removed)
    }

    pub fn add_price_list(&self, price_list: PriceList) {
        self.price_lists.insert(price_list.id, price_list);
    }

    pub fn set_filterable_attributes(&self, attributes: Vec<FilterableAttribute>) -> Result<()> {
        for attribute in &attributes {
            attribute.validate()?;
        }
        *self.attributes.write() = attributes;
        Ok(())
    }

    /// Load a snapshot; its products are created and reported to listeners
    pub async fn import(&self, snapshot: CatalogSnapshot) -> Result<usize> {
        self.set_filterable_attributes(snapshot.attributes)?;
        for price_list in snapshot.price_lists {
            self.add_price_list(price_list);
        }
        let count = snapshot.products.len();
        self.create_products(snapshot.products).await?;
        tracing::info!(products = count, "Catalog snapshot imported");
        Ok(count)
    }

    pub fn template(&self, id: i64) -> Option<Template> {
        self.templates.get(&id).map(|entry| entry.clone())
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.products.get(&id).map(|entry| entry.clone()))
    }

    async fn products(&self, ids: &[i64]) -> Result<Vec<Product>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.products.get(id).map(|entry| entry.clone()))
            .collect())
    }

    async fn price_lists(&self) -> Result<Vec<PriceList>> {
        let mut lists: Vec<PriceList> = self.price_lists.iter().map(|entry| entry.clone()).collect();
        lists.sort_by_key(|list| list.id);
        Ok(lists)
    }

    async fn filterable_attributes(&self) -> Result<Vec<FilterableAttribute>> {
        Ok(self.attributes.read().clone())
    }

    async fn listing(&self, page: usize, per_page: usize) -> Result<CatalogListing> {
        if page == 0 || per_page == 0 {
            return Err(AppError::Validation(
                "page and per_page must be at least 1".to_string(),
            ));
        }

        let mut visible: Vec<Product> = self
            .products
            .iter()
            .filter(|entry| entry.is_web_visible())
            .map(|entry| entry.clone())
            .collect();
        visible.sort_by_key(|product| product.id);

        let count = visible.len() as u64;
        let items = visible
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Ok(CatalogListing {
            items,
            count,
            page,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlog::{BacklogHook, BacklogStore, InMemoryBacklog};
    use rust_decimal::Decimal;

    fn template(id: i64, name: &str) -> Template {
        Template::new(id, name, Decimal::from(10))
    }

    fn catalog_with_backlog() -> (InMemoryCatalog, Arc<InMemoryBacklog>) {
        let catalog = InMemoryCatalog::new();
        let backlog = Arc::new(InMemoryBacklog::new());
        catalog.subscribe(Arc::new(BacklogHook::new(backlog.clone())));
        (catalog, backlog)
    }

    #[tokio::test]
    async fn test_product_create_and_write_enqueue() {
        let (catalog, backlog) = catalog_with_backlog();
        let product = Product::new(1, template(1, "Shirt"));

        catalog.create_product(product.clone()).await.unwrap();
        assert_eq!(backlog.count().await.unwrap(), 1);

        catalog.write_product(product.with_code("S-1")).await.unwrap();
        assert_eq!(backlog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_template_write_touches_all_children() {
        let (catalog, backlog) = catalog_with_backlog();
        catalog
            .create_products(vec![
                Product::new(1, template(1, "Shirt")),
                Product::new(2, template(1, "Shirt")),
                Product::new(3, template(2, "Hat")),
            ])
            .await
            .unwrap();

        let drained = backlog.drain(10).await.unwrap();
        backlog.confirm(&drained).await.unwrap();

        let touched = catalog.write_template(template(1, "Shirt v2")).await.unwrap();
        assert_eq!(touched, 2);
        assert_eq!(backlog.count().await.unwrap(), 2);
        assert_eq!(catalog.product(2).await.unwrap().unwrap().name(), "Shirt v2");
        assert_eq!(catalog.product(3).await.unwrap().unwrap().name(), "Hat");
    }

    #[tokio::test]
    async fn test_products_preserve_requested_order() {
        let catalog = InMemoryCatalog::new();
        for id in 1..=3 {
            catalog.create_product(Product::new(id, template(1, "Shirt"))).await.unwrap();
        }

        let ids: Vec<i64> = catalog
            .products(&[3, 99, 1])
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_listing_skips_hidden_products() {
        let catalog = InMemoryCatalog::new();
        catalog.create_product(Product::new(1, template(1, "A"))).await.unwrap();
        catalog
            .create_product(Product::new(2, template(1, "A")).with_active(false))
            .await
            .unwrap();
        catalog.create_product(Product::new(3, template(1, "A"))).await.unwrap();

        let listing = catalog.listing(1, 1).await.unwrap();
        assert_eq!(listing.count, 2);
        assert_eq!(listing.pages(), 2);
        assert_eq!(listing.items[0].id, 1);
    }

    #[tokio::test]
    async fn test_import_snapshot() {
        let (catalog, backlog) = catalog_with_backlog();
        let snapshot = CatalogSnapshot::from_json(
            r#"{
                "products": [{
                    "id": 1,
                    "template": {
                        "id": 1, "name": "Shirt", "product_type": "goods",
                        "description": null, "list_price": "12.50",
                        "category": null, "default_uom": { "id": 1, "name": "Unit", "symbol": "u" }
                    },
                    "code": "SH-1", "description": null, "use_template_description": true,
                    "active": true, "displayed_on_eshop": true, "uri": "shirt",
                    "tree_nodes": [], "attributes": { "color": "blue" }
                }],
                "price_lists": [{ "id": 1, "name": "Retail", "lines": [] }],
                "attributes": [{ "name": "color", "multiselect": true }]
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.import(snapshot).await.unwrap(), 1);
        assert_eq!(backlog.count().await.unwrap(), 1);
        assert_eq!(catalog.price_lists().await.unwrap().len(), 1);
        assert!(catalog.filterable_attributes().await.unwrap()[0].multiselect);
    }

    #[tokio::test]
    async fn test_invalid_writes_are_rejected() {
        let catalog = InMemoryCatalog::new();
        assert!(matches!(
            catalog.write_product(Product::new(9, template(1, "A"))).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.create_product(Product::new(1, template(1, ""))).await,
            Err(AppError::Validation(_))
        ));
        assert!(!catalog.delete_product(9).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_batch_stores_nothing() {
        let (catalog, backlog) = catalog_with_backlog();

        let duplicate = catalog
            .create_products(vec![
                Product::new(1, template(1, "A")),
                Product::new(2, template(2, "B")),
                Product::new(1, template(3, "dup")),
            ])
            .await;
        assert!(matches!(duplicate, Err(AppError::Validation(_))));

        let invalid = catalog
            .create_products(vec![
                Product::new(3, template(3, "C")),
                Product::new(4, template(4, "")),
            ])
            .await;
        assert!(matches!(invalid, Err(AppError::Validation(_))));

        assert_eq!(catalog.product_count(), 0);
        assert!(catalog.template(1).is_none());
        assert_eq!(backlog.count().await.unwrap(), 0);

        catalog.create_product(Product::new(5, template(5, "E"))).await.unwrap();
        let existing = catalog
            .create_products(vec![Product::new(6, template(6, "F")), Product::new(5, template(5, "E"))])
            .await;
        assert!(matches!(existing, Err(AppError::Validation(_))));
        assert_eq!(catalog.product_count(), 1);
        assert_eq!(backlog.count().await.unwrap(), 1);
    }
}
