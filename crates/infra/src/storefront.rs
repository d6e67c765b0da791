//! Customer-facing catalog browsing and cart handling.

use serde::Serialize;
use tracing::{debug, instrument};

use rocktools_core::{DomainError, Money, TenantId};
use rocktools_parties::ClientId;
use rocktools_products::{Department, ProductId};
use rocktools_sales::{Cart, CartId, CartItem};

use crate::store::{DynRetailStore, StockedProduct, StoreError, StoreResult};

/// A department with its in-stock products.
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentPage {
    pub department: Department,
    pub products: Vec<StockedProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub cart_id: CartId,
    pub items: Vec<CartItem>,
    pub total: Money,
}

impl TryFrom<&Cart> for CartView {
    type Error = DomainError;

    fn try_from(cart: &Cart) -> Result<Self, Self::Error> {
        Ok(Self {
            cart_id: cart.id,
            items: cart.items().to_vec(),
            total: cart.total()?,
        })
    }
}

#[derive(Clone)]
pub struct StorefrontService {
    store: DynRetailStore,
}

impl StorefrontService {
    pub fn new(store: DynRetailStore) -> Self {
        Self { store }
    }

    pub async fn departments(&self, tenant_id: TenantId) -> StoreResult<Vec<Department>> {
        self.store.list_departments(tenant_id).await
    }

    pub async fn department_page(&self, tenant_id: TenantId, name: &str) -> StoreResult<DepartmentPage> {
        let department = self
            .store
            .find_department(tenant_id, name)
            .await?
            .ok_or(StoreError::NotFound("department"))?;
        let products = self.store.stocked_products(tenant_id, department.id).await?;
        Ok(DepartmentPage { department, products })
    }

    /// Stage `quantity` units of a product at its current price.
    ///
    /// The requested quantity alone is checked against stock; checkout re-checks
    /// the merged cart line before anything is committed.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn add_to_cart(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
        product_id: ProductId,
        quantity: i64,
    ) -> StoreResult<CartView> {
        if quantity <= 0 {
            return Err(DomainError::validation("Invalid quantity selected.").into());
        }
        let available = self
            .store
            .inventory_for(tenant_id, product_id)
            .await?
            .map(|i| i.quantity())
            .unwrap_or(0);
        if available < quantity {
            return Err(DomainError::invariant("Insufficient stock available.").into());
        }
        let product = self
            .store
            .get_product(tenant_id, product_id)
            .await?
            .ok_or(StoreError::NotFound("product"))?;

        let mut cart = self.store.cart_for(tenant_id, client_id).await?;
        let line = cart.add(product_id, quantity, product.price())?;
        debug!(product_id = %line.product_id, quantity = line.quantity, "cart line staged");
        self.store.save_cart(tenant_id, &cart).await?;
        Ok(CartView::try_from(&cart)?)
    }

    pub async fn view_cart(&self, tenant_id: TenantId, client_id: ClientId) -> StoreResult<CartView> {
        let cart = self.store.cart_for(tenant_id, client_id).await?;
        Ok(CartView::try_from(&cart)?)
    }

    pub async fn remove_from_cart(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
        product_id: ProductId,
    ) -> StoreResult<CartView> {
        let mut cart = self.store.cart_for(tenant_id, client_id).await?;
        cart.remove(product_id)?;
        self.store.save_cart(tenant_id, &cart).await?;
        Ok(CartView::try_from(&cart)?)
    }
}
