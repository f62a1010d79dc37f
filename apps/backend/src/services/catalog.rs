use botica_core::{
    Client, ClientData, Page, PageRequest, Product, ProductData, StockAdjustment, StockOperation, Supplier, SupplierData,
};
use tracing::info;

use crate::backend::Backend;
use crate::error::ApiResult;

// =============================================================================
// Clients
// =============================================================================

impl Backend {
    pub async fn register_client(&self, data: &ClientData) -> ApiResult<Client> {
        let client = self.db.clients().register(data).await?;
        self.agent.push_client(client.clone());
        Ok(client)
    }

    pub async fn update_client(&self, id: i64, data: &ClientData) -> ApiResult<Client> {
        let client = self.db.clients().update(id, data).await?;
        self.agent.push_client(client.clone());
        Ok(client)
    }

    pub async fn delete_client(&self, id: i64) -> ApiResult<()> {
        Ok(self.db.clients().soft_delete(id).await?)
    }

    pub async fn get_client(&self, id: i64) -> ApiResult<Client> {
        Ok(self.db.clients().get(id).await?)
    }

    pub async fn list_clients(&self, req: &PageRequest) -> ApiResult<Page<Client>> {
        Ok(self.db.clients().paginated(req).await?)
    }
}

// =============================================================================
// Suppliers
// =============================================================================

impl Backend {
    pub async fn register_supplier(&self, data: &SupplierData) -> ApiResult<Supplier> {
        let supplier = self.db.suppliers().register(data).await?;
        self.agent.push_supplier(supplier.clone());
        Ok(supplier)
    }

    pub async fn update_supplier(&self, id: i64, data: &SupplierData) -> ApiResult<Supplier> {
        let supplier = self.db.suppliers().update(id, data).await?;
        self.agent.push_supplier(supplier.clone());
        Ok(supplier)
    }

    pub async fn delete_supplier(&self, id: i64) -> ApiResult<()> {
        Ok(self.db.suppliers().soft_delete(id).await?)
    }

    pub async fn get_supplier(&self, id: i64) -> ApiResult<Supplier> {
        Ok(self.db.suppliers().get(id).await?)
    }

    pub async fn list_suppliers(&self, req: &PageRequest) -> ApiResult<Page<Supplier>> {
        Ok(self.db.suppliers().paginated(req).await?)
    }
}

// =============================================================================
// Products and stock
// =============================================================================

impl Backend {
    /// The initial stock becomes an INITIAL ledger entry.
    pub async fn register_product(&self, data: &ProductData) -> ApiResult<Product> {
        let product = self.db.products().register(data).await?;
        self.agent.push_product(product.clone());
        self.agent.synchronize_ledger();
        Ok(product)
    }

    /// A stock different from the ledger becomes an ADJUST entry by
    /// `seller_id`.
    pub async fn update_product(&self, id: i64, data: &ProductData, seller_id: i64) -> ApiResult<Product> {
        let product = self.db.products().update(id, data, seller_id).await?;
        self.agent.push_product(product.clone());
        self.agent.synchronize_ledger();
        Ok(product)
    }

    pub async fn delete_product(&self, id: i64) -> ApiResult<()> {
        Ok(self.db.products().soft_delete(id).await?)
    }

    pub async fn get_product(&self, id: i64) -> ApiResult<Product> {
        Ok(self.db.products().get(id).await?)
    }

    /// Listed stock is the live ledger fold, not the cached column.
    pub async fn list_products(&self, req: &PageRequest) -> ApiResult<Page<Product>> {
        Ok(self.db.products().paginated(req).await?)
    }

    /// Ledger entries of one product, newest first.
    pub async fn stock_history(&self, product_id: i64) -> ApiResult<Vec<StockOperation>> {
        self.db.products().get(product_id).await?;
        Ok(self.db.ledger().history(product_id).await?)
    }

    /// Applies every adjustment in one transaction, or none.
    pub async fn bulk_adjust_stock(&self, adjustments: &[StockAdjustment], seller_id: i64) -> ApiResult<Vec<StockOperation>> {
        self.db.sellers().get(seller_id).await?;
        let entries = self.db.ledger().bulk_adjust(adjustments, seller_id).await?;
        info!(adjustments = adjustments.len(), entries = entries.len(), "Bulk stock adjustment");
        if !entries.is_empty() {
            self.agent.synchronize_ledger();
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::tests::{new_seller, offline_backend};
    use crate::error::ErrorCode;
    use botica_core::{ClientData, PageRequest, ProductData, SortOrder, StockAdjustment, StockOperationKind, SupplierData};

    fn product(code: &str, stock: i64) -> ProductData {
        ProductData {
            name: format!("Producto {}", code),
            code: code.to_string(),
            sale_price_cents: 1200,
            stock,
        }
    }

    #[tokio::test]
    async fn test_product_lifecycle_moves_stock_through_the_ledger() {
        let backend = offline_backend().await;
        let seller = backend.register_seller(&new_seller("1020", "ana@botica.co")).await.unwrap();

        let created = backend.register_product(&product("A", 5)).await.unwrap();
        assert_eq!(created.stock, 5);

        let updated = backend.update_product(created.id, &product("A", 8), seller.id).await.unwrap();
        assert_eq!(updated.stock, 8);

        let history = backend.stock_history(created.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|e| e.kind == StockOperationKind::Initial && e.quantity_delta == 5));
        assert!(history
            .iter()
            .any(|e| e.kind == StockOperationKind::Adjust && e.quantity_delta == 3 && e.seller_id == seller.id));

        backend.delete_product(created.id).await.unwrap();
        assert_eq!(backend.get_product(created.id).await.unwrap_err().code, ErrorCode::NotFound);
        assert_eq!(backend.delete_product(created.id).await.unwrap_err().code, ErrorCode::NotFound);

        // Registering the same code again restores the row.
        let restored = backend.register_product(&product("A", 8)).await.unwrap();
        assert_eq!(restored.id, created.id);
    }

    #[tokio::test]
    async fn test_bulk_adjust_and_listing() {
        let backend = offline_backend().await;
        let seller = backend.register_seller(&new_seller("1020", "ana@botica.co")).await.unwrap();
        let a = backend.register_product(&product("A", 5)).await.unwrap();
        let b = backend.register_product(&product("B", 0)).await.unwrap();

        let entries = backend
            .bulk_adjust_stock(
                &[
                    StockAdjustment { product_id: a.id, new_stock: 2 },
                    StockAdjustment { product_id: b.id, new_stock: 7 },
                ],
                seller.id,
            )
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);

        let page = backend
            .list_products(&PageRequest::new(1, 10).sort("stock", SortOrder::Desc))
            .await
            .unwrap();
        assert_eq!(page.total_records, 2);
        assert_eq!(page.records[0].code, "B");
        assert_eq!(page.records[0].stock, 7);
        assert_eq!(page.records[1].stock, 2);
    }

    #[tokio::test]
    async fn test_client_and_supplier_duplicates() {
        let backend = offline_backend().await;
        let client = ClientData {
            name: "Luisa".to_string(),
            last_name: "Pardo".to_string(),
            id_type: "CC".to_string(),
            id_number: "100".to_string(),
            ..Default::default()
        };
        backend.register_client(&client).await.unwrap();
        assert_eq!(backend.register_client(&client).await.unwrap_err().code, ErrorCode::DuplicateKey);

        let supplier = SupplierData {
            name: "Medisur".to_string(),
            ..Default::default()
        };
        let created = backend.register_supplier(&supplier).await.unwrap();
        assert_eq!(backend.register_supplier(&supplier).await.unwrap_err().code, ErrorCode::DuplicateKey);
        backend.delete_supplier(created.id).await.unwrap();
        assert_eq!(backend.register_supplier(&supplier).await.unwrap().id, created.id);

        let page = backend.list_clients(&PageRequest::new(0, 0).search("PARD")).await.unwrap();
        assert_eq!(page.total_records, 1);
    }
}
