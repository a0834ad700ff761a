//! # Order History
//!
//! Orders finalized at this terminal, newest first, plus a reload from the
//! backend's order list.

use std::collections::VecDeque;
use std::sync::Arc;

use agro_core::money::Money;
use agro_core::types::PaymentMethod;
use agro_gateway::{CommerceGateway, Order};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::PosResult;

/// One completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedOrder {
    pub id: String,
    pub display_id: Option<i64>,
    /// Draft the order was converted from; unknown for reloaded orders.
    pub draft_id: Option<String>,
    pub total: Money,
    /// Known only for orders finalized in this session.
    pub payment: Option<PaymentMethod>,
    pub completed_at: DateTime<Utc>,
}

impl FinalizedOrder {
    pub fn from_order(order: &Order) -> Self {
        FinalizedOrder {
            id: order.id.clone(),
            display_id: order.display_id,
            draft_id: None,
            total: order.total,
            payment: None,
            completed_at: order.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Bounded list of recent orders. Cheap to clone.
#[derive(Clone)]
pub struct OrderHistory {
    gateway: Arc<dyn CommerceGateway>,
    orders: Arc<RwLock<VecDeque<FinalizedOrder>>>,
    limit: usize,
}

impl OrderHistory {
    pub fn new(gateway: Arc<dyn CommerceGateway>, limit: usize) -> Self {
        OrderHistory {
            gateway,
            orders: Arc::new(RwLock::new(VecDeque::new())),
            limit: limit.max(1),
        }
    }

    /// Records an order at the front, dropping the oldest past the limit.
    pub async fn record(&self, order: FinalizedOrder) {
        let mut orders = self.orders.write().await;
        orders.retain(|o| o.id != order.id);
        orders.push_front(order);
        orders.truncate(self.limit);
    }

    pub async fn recent_orders(&self) -> Vec<FinalizedOrder> {
        self.orders.read().await.iter().cloned().collect()
    }

    /// Replaces the list with the backend's most recent orders, keeping the
    /// payment method of orders recorded locally.
    pub async fn refresh_history(&self) -> PosResult<Vec<FinalizedOrder>> {
        let limit = u32::try_from(self.limit).unwrap_or(u32::MAX);
        let remote = match self.gateway.list_orders(limit).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "Failed to load order history");
                return Err(e.into());
            }
        };

        let mut orders = self.orders.write().await;
        let refreshed: VecDeque<FinalizedOrder> = remote
            .iter()
            .take(self.limit)
            .map(|order| match orders.iter().find(|o| o.id == order.id) {
                Some(local) => FinalizedOrder {
                    total: order.total,
                    display_id: order.display_id.or(local.display_id),
                    ..local.clone()
                },
                None => FinalizedOrder::from_order(order),
            })
            .collect();
        debug!(orders = refreshed.len(), "Reloaded order history");
        *orders = refreshed;
        Ok(orders.iter().cloned().collect())
    }
}
