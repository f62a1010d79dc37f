use botica_core::{
    InvoiceDetail, InvoiceSummary, Page, PageRequest, Purchase, PurchaseDetail, PurchaseRequest, SaleRequest,
};

use crate::backend::Backend;
use crate::error::ApiResult;

impl Backend {
    /// Registers a sale at the configured VAT rate.
    ///
    /// ## Errors
    /// * `STOCK_INSUFFICIENT` - A line asks for more than the product holds;
    ///   nothing is written
    /// * `NOT_FOUND` - Client, seller or product missing
    /// * `VALIDATION` - Empty sale or a bad quantity or price
    pub async fn register_sale(&self, req: &SaleRequest) -> ApiResult<InvoiceDetail> {
        let detail = self.db.sales().register_sale(req, self.config.vat_rate).await?;
        self.agent.push_sale(detail.clone());
        Ok(detail)
    }

    pub async fn invoice(&self, id: i64) -> ApiResult<InvoiceDetail> {
        Ok(self.db.sales().invoice(id).await?)
    }

    /// Newest first unless a sort key is given.
    pub async fn list_invoices(&self, req: &PageRequest) -> ApiResult<Page<InvoiceSummary>> {
        Ok(self.db.sales().paginated_invoices(req).await?)
    }

    pub async fn register_purchase(&self, req: &PurchaseRequest) -> ApiResult<PurchaseDetail> {
        let detail = self.db.purchases().register_purchase(req).await?;
        self.agent.push_purchase(detail.clone());
        Ok(detail)
    }

    pub async fn purchase(&self, id: i64) -> ApiResult<PurchaseDetail> {
        Ok(self.db.purchases().purchase(id).await?)
    }

    pub async fn list_purchases(&self, req: &PageRequest) -> ApiResult<Page<Purchase>> {
        Ok(self.db.purchases().paginated(req).await?)
    }
}
